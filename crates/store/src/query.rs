use common::UserId;

/// Builder for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,

    /// Maximum number of products to return.
    pub limit: Option<usize>,

    /// Number of products to skip.
    pub offset: Option<usize>,
}

impl ProductQuery {
    /// Creates a query matching every product.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by a title substring. Blank input clears the filter.
    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = if text.trim().is_empty() {
            None
        } else {
            Some(text.trim().to_string())
        };
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips a number of results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn matches_title(&self, title: &str) -> bool {
        match &self.search {
            Some(needle) => title.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// Builder for order listings.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Restrict to orders owned by this user.
    pub owner_id: Option<UserId>,

    /// Project the owner's contact fields into each result.
    pub include_owner: bool,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one owner's orders.
    pub fn for_owner(owner_id: UserId) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Default::default()
        }
    }

    /// Includes owner contact fields in the results.
    pub fn with_owner_contact(mut self) -> Self {
        self.include_owner = true;
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips a number of results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}
