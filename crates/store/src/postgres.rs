use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::debug;

use crate::{
    Cart, CartId, CartLineItem, CheckoutCommit, Money, NewCart, NewProduct, NewUser, Order,
    OrderDetail, OrderId, OrderLineDetail, OrderLineItem, OrderQuery, OrderStatus, OwnerContact,
    Product, ProductId, ProductPatch, ProductQuery, Result, Role, StockMovement, StoreError, User,
    UserId,
    store::{ShopStore, validate_movements, validate_new_order},
};

const PRODUCT_COLUMNS: &str = "id, title, description, price, quantity, sold, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, owner_id, cart_total, external_payment_id, amount, payment_status, currency, order_status, created_at";
const USER_COLUMNS: &str = "id, email, name, role, enabled, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresShopStore {
    pool: PgPool,
}

impl PostgresShopStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_user(row: &PgRow) -> Result<User> {
        Ok(User {
            id: UserId::new(row.try_get("id")?),
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            role: decode_parsed::<Role>(row, "role")?,
            enabled: row.try_get("enabled")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            price: Money::new(row.try_get::<Decimal, _>("price")?),
            quantity: row.try_get("quantity")?,
            sold: row.try_get("sold")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderLineItem>) -> Result<Order> {
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            owner_id: UserId::new(row.try_get("owner_id")?),
            items,
            cart_total: Money::new(row.try_get::<Decimal, _>("cart_total")?),
            external_payment_id: row.try_get("external_payment_id")?,
            amount: Money::new(row.try_get::<Decimal, _>("amount")?),
            payment_status: row.try_get("payment_status")?,
            currency: row.try_get("currency")?,
            order_status: decode_parsed::<OrderStatus>(row, "order_status")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order_line(row: &PgRow) -> Result<OrderLineItem> {
        Ok(OrderLineItem {
            product_id: ProductId::new(row.try_get("product_id")?),
            count: row.try_get("count")?,
            price: Money::new(row.try_get::<Decimal, _>("price")?),
        })
    }

    /// Applies one stock movement inside a transaction. Sales only touch the
    /// row while enough stock remains.
    async fn apply_movement(
        tx: &mut Transaction<'_, Postgres>,
        movement: &StockMovement,
    ) -> Result<()> {
        match *movement {
            StockMovement::Sale { product_id, count } => {
                let updated = sqlx::query(
                    r#"
                    UPDATE products
                    SET quantity = quantity - $2, sold = sold + $2, updated_at = NOW()
                    WHERE id = $1 AND quantity >= $2
                    "#,
                )
                .bind(product_id.as_i64())
                .bind(count)
                .execute(&mut **tx)
                .await?
                .rows_affected();

                if updated == 0 {
                    let available: Option<i32> =
                        sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
                            .bind(product_id.as_i64())
                            .fetch_optional(&mut **tx)
                            .await?;

                    return Err(match available {
                        Some(available) => StoreError::StockInsufficient {
                            product_id,
                            requested: count,
                            available,
                        },
                        None => StoreError::ProductNotFound(product_id),
                    });
                }
            }
            StockMovement::Restock { product_id, count } => {
                let updated = sqlx::query(
                    "UPDATE products SET quantity = quantity + $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(product_id.as_i64())
                .bind(count)
                .execute(&mut **tx)
                .await?
                .rows_affected();

                if updated == 0 {
                    return Err(StoreError::ProductNotFound(product_id));
                }
            }
        }
        Ok(())
    }

    async fn load_order_lines(&self, order_ids: &[i64]) -> Result<HashMap<i64, Vec<OrderLineItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, count, price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id ASC, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<i64, Vec<OrderLineItem>> = HashMap::new();
        for row in &rows {
            let order_id: i64 = row.try_get("order_id")?;
            lines
                .entry(order_id)
                .or_default()
                .push(Self::row_to_order_line(row)?);
        }
        Ok(lines)
    }
}

/// Decodes a text column through `FromStr`.
fn decode_parsed<T>(row: &PgRow, col: &str) -> std::result::Result<T, sqlx::Error>
where
    T: std::str::FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: String = row.try_get(col)?;
    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: e.into(),
    })
}

/// Returns the name of the violated constraint, if the error carries one.
fn violated_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint().map(str::to_owned),
        _ => None,
    }
}

fn position(index: usize) -> Result<i32> {
    i32::try_from(index)
        .map_err(|e| StoreError::InvalidWrite(format!("Too many lines in one write: {e}")))
}

fn to_sql_limit(value: Option<usize>) -> Option<i64> {
    value.map(|v| i64::try_from(v).unwrap_or(i64::MAX))
}

#[async_trait]
impl ShopStore for PostgresShopStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (email, name, role) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e).as_deref() {
            Some("users_email_key") => StoreError::DuplicateEmail(user.email.clone()),
            _ => StoreError::Database(e),
        })?;

        Self::row_to_user(&row)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (title, description, price, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(product.quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e).as_deref() {
            Some("products_quantity_check") => {
                StoreError::InvalidWrite("Product quantity cannot be negative".to_string())
            }
            _ => StoreError::Database(e),
        })?;

        Self::row_to_product(&row)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<i64> = product_ids.iter().map(ProductId::as_i64).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id ASC"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_product).collect()
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::TEXT IS NULL OR title ILIKE '%' || $1 || '%')
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(query.search.as_deref())
        .bind(to_sql_limit(query.limit))
        .bind(to_sql_limit(query.offset).unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_product).collect()
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                quantity = COALESCE($5, quantity),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id.as_i64())
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.price.map(|p| p.amount()))
        .bind(patch.quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e).as_deref() {
            Some("products_quantity_check") => {
                StoreError::InvalidWrite("Product quantity cannot be negative".to_string())
            }
            _ => StoreError::Database(e),
        })?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn delete_product(&self, product_id: ProductId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let affected: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT cart_id FROM cart_items WHERE product_id = $1",
        )
        .bind(product_id.as_i64())
        .fetch_all(&mut *tx)
        .await?;

        // Cart lines go with the product through ON DELETE CASCADE.
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id.as_i64())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Ok(false);
        }

        if !affected.is_empty() {
            sqlx::query(
                "DELETE FROM carts c WHERE c.id = ANY($1) \
                 AND NOT EXISTS (SELECT 1 FROM cart_items i WHERE i.cart_id = c.id)",
            )
            .bind(&affected)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE carts c SET cart_total = t.total \
                 FROM (SELECT cart_id, SUM(count * price) AS total FROM cart_items \
                       WHERE cart_id = ANY($1) GROUP BY cart_id) t \
                 WHERE c.id = t.cart_id",
            )
            .bind(&affected)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(%product_id, carts = affected.len(), "product deleted, carts refreshed");
        Ok(true)
    }

    async fn adjust_stock(&self, movements: Vec<StockMovement>) -> Result<Vec<Product>> {
        validate_movements(&movements).map_err(StoreError::InvalidWrite)?;

        let mut tx = self.pool.begin().await?;
        for movement in &movements {
            Self::apply_movement(&mut tx, movement).await?;
        }

        let ids: Vec<i64> = movements.iter().map(|m| m.product_id().as_i64()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id ASC"
        ))
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        rows.iter().map(Self::row_to_product).collect()
    }

    async fn replace_cart(&self, cart: NewCart) -> Result<Cart> {
        let owner_id = cart.owner_id;
        let mut tx = self.pool.begin().await?;

        // Lines go with the cart through ON DELETE CASCADE.
        sqlx::query("DELETE FROM carts WHERE owner_id = $1")
            .bind(owner_id.as_i64())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            "INSERT INTO carts (owner_id, cart_total) VALUES ($1, $2) RETURNING id, created_at",
        )
        .bind(owner_id.as_i64())
        .bind(cart.cart_total.amount())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match violated_constraint(&e).as_deref() {
            Some("carts_owner_id_fkey") => StoreError::UserNotFound(owner_id),
            Some("carts_owner_id_key") => StoreError::CartChanged(owner_id),
            _ => StoreError::Database(e),
        })?;
        let cart_id = CartId::new(row.try_get("id")?);

        for (index, line) in cart.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, position, product_id, count, price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(cart_id.as_i64())
            .bind(position(index)?)
            .bind(line.product_id.as_i64())
            .bind(line.count)
            .bind(line.price.amount())
            .execute(&mut *tx)
            .await
            .map_err(|e| match violated_constraint(&e).as_deref() {
                Some("cart_items_product_id_fkey") => StoreError::ProductNotFound(line.product_id),
                _ => StoreError::Database(e),
            })?;
        }

        tx.commit().await?;
        debug!(%owner_id, %cart_id, lines = cart.items.len(), "cart replaced");

        Ok(Cart {
            id: cart_id,
            owner_id,
            items: cart.items,
            cart_total: cart.cart_total,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn get_cart(&self, owner_id: UserId) -> Result<Option<Cart>> {
        // One statement, so the cart and its lines come from the same snapshot.
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.cart_total, c.created_at, i.product_id, i.count, i.price
            FROM carts c
            LEFT JOIN cart_items i ON i.cart_id = c.id
            WHERE c.owner_id = $1
            ORDER BY i.position ASC
            "#,
        )
        .bind(owner_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(product_id) = row.try_get::<Option<i64>, _>("product_id")? {
                items.push(CartLineItem {
                    product_id: ProductId::new(product_id),
                    count: row.try_get("count")?,
                    price: Money::new(row.try_get::<Decimal, _>("price")?),
                });
            }
        }

        Ok(Some(Cart {
            id: CartId::new(first.try_get("id")?),
            owner_id,
            items,
            cart_total: Money::new(first.try_get::<Decimal, _>("cart_total")?),
            created_at: first.try_get("created_at")?,
        }))
    }

    async fn delete_cart(&self, owner_id: UserId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM carts WHERE owner_id = $1")
            .bind(owner_id.as_i64())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<Order> {
        validate_new_order(&commit.order).map_err(StoreError::InvalidWrite)?;
        validate_movements(&commit.movements).map_err(StoreError::InvalidWrite)?;

        let owner_id = commit.order.owner_id;
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM carts WHERE id = $1 AND owner_id = $2")
            .bind(commit.cart_id.as_i64())
            .bind(owner_id.as_i64())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(StoreError::CartChanged(owner_id));
        }

        for movement in &commit.movements {
            Self::apply_movement(&mut tx, movement).await?;
        }

        let new_order = commit.order;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (owner_id, cart_total, external_payment_id, amount, payment_status, currency)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(owner_id.as_i64())
        .bind(new_order.cart_total.amount())
        .bind(&new_order.external_payment_id)
        .bind(new_order.amount.amount())
        .bind(&new_order.payment_status)
        .bind(&new_order.currency)
        .fetch_one(&mut *tx)
        .await?;
        let order_id: i64 = row.try_get("id")?;

        for (index, item) in new_order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, count, price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id)
            .bind(position(index)?)
            .bind(item.product_id.as_i64())
            .bind(item.count)
            .bind(item.price.amount())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(%owner_id, order_id, "checkout committed");
        Self::row_to_order(&row, new_order.items)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut lines = self.load_order_lines(&[order_id.as_i64()]).await?;
        let items = lines.remove(&order_id.as_i64()).unwrap_or_default();
        Self::row_to_order(&row, items).map(Some)
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<OrderDetail>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        if query.owner_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND owner_id = ${param_count}"));
        }
        sql.push_str(" ORDER BY id ASC");
        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(owner_id) = query.owner_id {
            sqlx_query = sqlx_query.bind(owner_id.as_i64());
        }
        if let Some(limit) = to_sql_limit(query.limit) {
            sqlx_query = sqlx_query.bind(limit);
        }
        if let Some(offset) = to_sql_limit(query.offset) {
            sqlx_query = sqlx_query.bind(offset);
        }

        let order_rows = sqlx_query.fetch_all(&self.pool).await?;
        if order_rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids = order_rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut lines = self.load_order_lines(&order_ids).await?;

        let mut product_ids: Vec<ProductId> = lines
            .values()
            .flatten()
            .map(|item| item.product_id)
            .collect();
        product_ids.sort();
        product_ids.dedup();
        let products: BTreeMap<ProductId, Product> = self
            .get_products(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let owners: HashMap<UserId, OwnerContact> = if query.include_owner {
            let owner_ids = order_rows
                .iter()
                .map(|row| row.try_get::<i64, _>("owner_id"))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let rows = sqlx::query(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
            ))
            .bind(&owner_ids)
            .fetch_all(&self.pool)
            .await?;
            rows.iter()
                .map(|row| Self::row_to_user(row).map(|u| (u.id, OwnerContact::from(&u))))
                .collect::<Result<_>>()?
        } else {
            HashMap::new()
        };

        let mut details = Vec::with_capacity(order_rows.len());
        for (row, order_id) in order_rows.iter().zip(order_ids) {
            let items = lines.remove(&order_id).unwrap_or_default();
            let order = Self::row_to_order(row, items)?;
            let lines = order
                .items
                .iter()
                .map(|item| OrderLineDetail {
                    item: item.clone(),
                    product: products.get(&item.product_id).cloned(),
                })
                .collect();
            let owner = owners.get(&order.owner_id).cloned();
            details.push(OrderDetail {
                order,
                lines,
                owner,
            });
        }

        Ok(details)
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET order_status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id.as_i64())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut lines = self.load_order_lines(&[order_id.as_i64()]).await?;
        let items = lines.remove(&order_id.as_i64()).unwrap_or_default();
        Self::row_to_order(&row, items).map(Some)
    }
}
