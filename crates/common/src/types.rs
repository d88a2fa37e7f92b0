use serde::{Deserialize, Serialize};

/// Declares an integer-backed identifier newtype.
///
/// Rows are keyed by database sequences, so every identifier wraps an `i64`
/// and is kept distinct at the type level to avoid mixing up a product ID
/// with an order ID.
macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw value.
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a registered user; owns carts and orders.
    UserId
);

id_newtype!(
    /// Identifier of a catalogue product.
    ProductId
);

id_newtype!(
    /// Identifier of a cart row. Changes every time a cart is replaced.
    CartId
);

id_newtype!(
    /// Identifier of an order.
    OrderId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_by_value() {
        assert_eq!(ProductId::new(7), ProductId::from(7));
        assert!(OrderId::new(1) < OrderId::new(2));
    }

    #[test]
    fn id_parses_from_path_segment() {
        let id: UserId = " 42 ".parse().unwrap();
        assert_eq!(id.as_i64(), 42);
        assert!("abc".parse::<UserId>().is_err());
    }

    #[test]
    fn id_serializes_as_bare_integer() {
        let json = serde_json::to_string(&CartId::new(9)).unwrap();
        assert_eq!(json, "9");
        let back: CartId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CartId::new(9));
    }
}
