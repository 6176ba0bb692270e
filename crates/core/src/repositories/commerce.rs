//! Pharmacy shop: product catalog, per-user carts and orders.
//!
//! Checkout converts the caller's cart into an order in a single transaction: the order row,
//! one order item per cart item (price copied at purchase time) and the emptied cart commit
//! together or not at all.

use crate::actor::{Actor, Role, UserId};
use crate::db::Database;
use crate::error::{is_unique_violation, HmsError, HmsResult};
use crate::money::Money;
use crate::validation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub name: String,
    pub description: String,
    #[sqlx(rename = "price_cents")]
    pub price: Money,
    pub stock: i64,
}

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub category_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    #[sqlx(rename = "unit_price_cents")]
    pub unit_price: Money,
    pub quantity: i64,
    #[sqlx(rename = "line_total_cents")]
    pub line_total: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total: Money,
}

impl Cart {
    fn from_items(items: Vec<CartItem>) -> Self {
        let total = items.iter().map(|item| item.line_total).sum();
        Self { items, total }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: Option<UserId>,
    #[sqlx(rename = "total_price_cents")]
    pub total_price: Money,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub quantity: i64,
    #[sqlx(rename = "price_cents")]
    pub price: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

const PRODUCT_SELECT: &str = "SELECT p.id, p.category_id, c.name AS category_name, p.name, \
     p.description, p.price_cents, p.stock \
     FROM products p LEFT JOIN categories c ON c.id = p.category_id";

const CART_ITEMS_SELECT: &str = "SELECT ci.id, ci.product_id, p.name AS product_name, \
     p.price_cents AS unit_price_cents, ci.quantity, \
     ci.quantity * p.price_cents AS line_total_cents \
     FROM cart_items ci \
     JOIN carts c ON c.id = ci.cart_id \
     JOIN products p ON p.id = ci.product_id \
     WHERE c.user_id = ? ORDER BY ci.id";

const ORDER_COLUMNS: &str = "id, user_id, total_price_cents, shipping_address, status, created_at";

/// Reads the user's cart lines without creating a cart.
async fn cart_items(conn: &mut SqliteConnection, user_id: UserId) -> HmsResult<Vec<CartItem>> {
    Ok(sqlx::query_as::<_, CartItem>(CART_ITEMS_SELECT)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?)
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone, Debug)]
pub struct CommerceService {
    db: Database,
}

impl CommerceService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    pub async fn add_category(
        &self,
        actor: &Actor,
        name: &str,
        description: &str,
    ) -> HmsResult<Category> {
        actor.require(Role::Admin, "manage the shop")?;
        let name = validation::required_text(name, "Category name")?;
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, description) VALUES (?, ?) RETURNING id, name, description",
        )
        .bind(name.as_str())
        .bind(description.trim())
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                HmsError::Validation("A category with this name already exists.".into())
            } else {
                HmsError::Database(e)
            }
        })
    }

    pub async fn list_categories(&self) -> HmsResult<Vec<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories ORDER BY name")
                .fetch_all(self.db.pool())
                .await?,
        )
    }

    pub async fn add_product(&self, actor: &Actor, new: NewProduct) -> HmsResult<Product> {
        actor.require(Role::Admin, "manage the shop")?;
        let name = validation::required_text(&new.name, "Product name")?;
        if new.stock < 0 {
            return Err(HmsError::Validation("Stock cannot be negative.".into()));
        }
        if let Some(category_id) = new.category_id {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE id = ?")
                .bind(category_id)
                .fetch_optional(self.db.pool())
                .await?;
            if exists.is_none() {
                return Err(HmsError::NotFound("category".into()));
            }
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO products (category_id, name, description, price_cents, stock) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(new.category_id)
        .bind(name.as_str())
        .bind(new.description.trim())
        .bind(new.price)
        .bind(new.stock)
        .fetch_one(self.db.pool())
        .await?;
        tracing::info!(product_id = id, "product added");
        self.find_product(id).await
    }

    pub async fn find_product(&self, id: i64) -> HmsResult<Product> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = ?");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| HmsError::NotFound("product".into()))
    }

    /// The public shop listing.
    pub async fn list_products(&self) -> HmsResult<Vec<Product>> {
        let sql = format!("{PRODUCT_SELECT} ORDER BY p.name, p.id");
        Ok(sqlx::query_as::<_, Product>(&sql)
            .fetch_all(self.db.pool())
            .await?)
    }

    // ------------------------------------------------------------------------
    // Cart
    // ------------------------------------------------------------------------

    /// Adds one unit of a product to the actor's cart, creating the cart on first use.
    ///
    /// A product already in the cart has its quantity incremented.
    pub async fn add_to_cart(&self, actor: &Actor, product_id: i64) -> HmsResult<Product> {
        let product = self.find_product(product_id).await?;

        let mut tx = self.db.pool().begin().await?;
        sqlx::query("INSERT INTO carts (user_id, created_at) VALUES (?, ?) ON CONFLICT (user_id) DO NOTHING")
            .bind(actor.user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        let cart_id: i64 = sqlx::query_scalar("SELECT id FROM carts WHERE user_id = ?")
            .bind(actor.user_id)
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES (?, ?, 1) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = quantity + 1",
        )
        .bind(cart_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(user_id = actor.user_id, product_id, "added to cart");
        Ok(product)
    }

    /// Removes a line from the actor's own cart.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown item; `NotAuthorized` if the item is in someone else's cart.
    pub async fn remove_from_cart(&self, actor: &Actor, item_id: i64) -> HmsResult<()> {
        let owner: Option<UserId> = sqlx::query_scalar(
            "SELECT c.user_id FROM cart_items ci JOIN carts c ON c.id = ci.cart_id WHERE ci.id = ?",
        )
        .bind(item_id)
        .fetch_optional(self.db.pool())
        .await?;
        match owner {
            None => return Err(HmsError::NotFound("cart item".into())),
            Some(owner) if owner != actor.user_id => {
                return Err(HmsError::NotAuthorized("remove this item".into()))
            }
            Some(_) => {}
        }

        sqlx::query("DELETE FROM cart_items WHERE id = ?")
            .bind(item_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// The actor's cart with its total. A user who never added anything has an empty cart.
    pub async fn cart(&self, actor: &Actor) -> HmsResult<Cart> {
        let mut conn = self.db.pool().acquire().await?;
        Ok(Cart::from_items(cart_items(&mut conn, actor.user_id).await?))
    }

    /// Where an order placed now would ship: the actor's patient profile address.
    ///
    /// # Errors
    ///
    /// `MissingAddress` if there is no patient profile or its address is blank.
    pub async fn shipping_address(&self, actor: &Actor) -> HmsResult<String> {
        let address: Option<String> =
            sqlx::query_scalar("SELECT address FROM patients WHERE user_id = ?")
                .bind(actor.user_id)
                .fetch_optional(self.db.pool())
                .await?;
        address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or(HmsError::MissingAddress)
    }

    /// Converts the actor's cart into an order and empties the cart.
    ///
    /// # Returns
    ///
    /// The new order, in `Processing` state, shipping to the profile address.
    ///
    /// # Errors
    ///
    /// Returns `HmsError` if:
    /// - the cart is empty (`Validation`); nothing is written,
    /// - the actor has no shipping address (`MissingAddress`); nothing is written.
    pub async fn checkout(&self, actor: &Actor) -> HmsResult<Order> {
        let mut tx = self.db.pool().begin().await?;

        let items = cart_items(&mut tx, actor.user_id).await?;
        if items.is_empty() {
            return Err(HmsError::Validation("Your cart is empty.".into()));
        }
        let address: Option<String> =
            sqlx::query_scalar("SELECT address FROM patients WHERE user_id = ?")
                .bind(actor.user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let address = address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or(HmsError::MissingAddress)?;

        let cart = Cart::from_items(items);
        let sql = format!(
            "INSERT INTO orders (user_id, total_price_cents, shipping_address, status, created_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {ORDER_COLUMNS}"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(actor.user_id)
            .bind(cart.total)
            .bind(&address)
            .bind(OrderStatus::Processing)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

        for item in &cart.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, price_cents) VALUES (?, ?, ?, ?)",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = ?)")
            .bind(actor.user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            order_id = order.id,
            user_id = actor.user_id,
            items = cart.items.len(),
            total = %order.total_price,
            "order placed"
        );
        Ok(order)
    }

    // ------------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------------

    /// The actor's orders, newest first, optionally capped at `limit`.
    pub async fn list_orders(&self, actor: &Actor, limit: Option<i64>) -> HmsResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY id DESC LIMIT ?"
        );
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(actor.user_id)
            .bind(limit.unwrap_or(-1))
            .fetch_all(self.db.pool())
            .await?)
    }

    /// One of the actor's orders with its items.
    pub async fn order_details(&self, actor: &Actor, order_id: i64) -> HmsResult<OrderDetails> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| HmsError::NotFound("order".into()))?;
        if order.user_id != Some(actor.user_id) {
            return Err(HmsError::NotAuthorized("view this order".into()));
        }

        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT oi.id, oi.product_id, p.name AS product_name, oi.quantity, oi.price_cents \
             FROM order_items oi LEFT JOIN products p ON p.id = oi.product_id \
             WHERE oi.order_id = ? ORDER BY oi.id",
        )
        .bind(order_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(OrderDetails { order, items })
    }
}
