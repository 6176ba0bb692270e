//! Shop, cart, checkout and orders.

use crate::outcome::{redirect, refuse, refuse_to};
use crate::AppState;
use api_shared::{Notice, NoticeParams};
use axum::extract::{Extension, Path, Query, State};
use axum::response::{Json, Response};
use hms_core::repositories::commerce::{
    Cart, Category, CommerceService, Order, OrderDetails, Product,
};
use hms_core::validation::parse_id;
use hms_core::{Actor, HmsError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ShopView {
    pub notice: Option<Notice>,
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub notice: Option<Notice>,
    pub cart: Cart,
}

/// What placing the order now would do.
///
/// `shipping_address` is `None` when checkout would fail for lack of an address.
#[derive(Debug, Serialize)]
pub struct CheckoutSummary {
    pub notice: Option<Notice>,
    pub cart: Cart,
    pub shipping_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrdersView {
    pub notice: Option<Notice>,
    pub orders: Vec<Order>,
}

#[utoipa::path(
    get,
    path = "/shop",
    params(NoticeParams),
    responses((status = 200, description = "Categories and products"))
)]
#[axum::debug_handler]
pub async fn shop(
    State(state): State<AppState>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<ShopView>, Response> {
    let commerce = CommerceService::new(state.db.clone());
    let categories = commerce.list_categories().await.map_err(refuse_to("/"))?;
    let products = commerce.list_products().await.map_err(refuse_to("/"))?;
    Ok(Json(ShopView {
        notice: params.into_notice(),
        categories,
        products,
    }))
}

#[utoipa::path(
    post,
    path = "/add-to-cart/{id}",
    params(("id" = i64, Path, description = "Product id")),
    responses((status = 303, description = "Redirect to the shop with the outcome"))
)]
/// Add one unit of a product to the caller's cart
#[axum::debug_handler]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<String>,
) -> Response {
    let product_id = match parse_id(&product_id, "Product") {
        Ok(id) => id,
        Err(e) => return refuse("/shop", e),
    };
    match CommerceService::new(state.db.clone())
        .add_to_cart(&actor, product_id)
        .await
    {
        Ok(product) => redirect(
            "/shop",
            Notice::success(format!("{} added to your cart.", product.name)),
        ),
        Err(e) => refuse("/shop", e),
    }
}

#[utoipa::path(
    get,
    path = "/cart",
    params(NoticeParams),
    responses((status = 200, description = "Cart lines and total"))
)]
#[axum::debug_handler]
pub async fn cart(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<CartView>, Response> {
    let cart = CommerceService::new(state.db.clone())
        .cart(&actor)
        .await
        .map_err(refuse_to("/shop"))?;
    Ok(Json(CartView {
        notice: params.into_notice(),
        cart,
    }))
}

#[utoipa::path(
    post,
    path = "/remove-from-cart/{id}",
    params(("id" = i64, Path, description = "Cart item id")),
    responses((status = 303, description = "Redirect to the cart with the outcome"))
)]
#[axum::debug_handler]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(item_id): Path<String>,
) -> Response {
    let item_id = match parse_id(&item_id, "Cart item") {
        Ok(id) => id,
        Err(e) => return refuse("/cart", e),
    };
    match CommerceService::new(state.db.clone())
        .remove_from_cart(&actor, item_id)
        .await
    {
        Ok(()) => redirect("/cart", Notice::success("Item removed from your cart.")),
        Err(e) => refuse("/cart", e),
    }
}

#[utoipa::path(
    get,
    path = "/checkout",
    params(NoticeParams),
    responses((status = 200, description = "Cart and shipping address for confirmation"))
)]
#[axum::debug_handler]
pub async fn checkout_summary(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<CheckoutSummary>, Response> {
    let commerce = CommerceService::new(state.db.clone());
    let cart = commerce.cart(&actor).await.map_err(refuse_to("/cart"))?;
    let shipping_address = match commerce.shipping_address(&actor).await {
        Ok(address) => Some(address),
        Err(HmsError::MissingAddress) => None,
        Err(e) => return Err(refuse("/cart", e)),
    };
    Ok(Json(CheckoutSummary {
        notice: params.into_notice(),
        cart,
        shipping_address,
    }))
}

#[utoipa::path(
    post,
    path = "/checkout",
    responses(
        (status = 303, description = "Order placed and cart emptied; or back to the cart with an error")
    )
)]
/// Place an order from the caller's cart
///
/// Ships to the caller's profile address. Fails without writing anything if the cart is empty
/// or no address is on file.
#[axum::debug_handler]
pub async fn checkout(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> Response {
    match CommerceService::new(state.db.clone()).checkout(&actor).await {
        Ok(order) => redirect(
            &format!("/order-details/{}", order.id),
            Notice::success(format!("Order #{} placed. Total {}.", order.id, order.total_price)),
        ),
        Err(e) => refuse("/cart", e),
    }
}

#[utoipa::path(
    get,
    path = "/my-orders",
    params(NoticeParams),
    responses((status = 200, description = "The caller's orders, newest first"))
)]
#[axum::debug_handler]
pub async fn my_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<OrdersView>, Response> {
    let orders = CommerceService::new(state.db.clone())
        .list_orders(&actor, None)
        .await
        .map_err(refuse_to("/shop"))?;
    Ok(Json(OrdersView {
        notice: params.into_notice(),
        orders,
    }))
}

#[utoipa::path(
    get,
    path = "/order-details/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses((status = 200, description = "Order with its items"))
)]
#[axum::debug_handler]
pub async fn order_details(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetails>, Response> {
    let order_id = parse_id(&order_id, "Order").map_err(refuse_to("/my-orders"))?;
    CommerceService::new(state.db.clone())
        .order_details(&actor, order_id)
        .await
        .map(Json)
        .map_err(refuse_to("/my-orders"))
}
