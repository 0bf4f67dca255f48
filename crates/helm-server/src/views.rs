//! Read-model assembly: paginated, denormalized views built with batched
//! cross-entity joins. One `find_many` per referenced collection per view,
//! never one lookup per row.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use helm_core::catalog::{Brand, Category, Product, ProductImage};
use helm_core::orders::{
    DeliveryAddress, ItemKind, Order, OrderItem, OrderKind, OrderStatus, StatusChange,
};
use helm_core::porter::{PackageSize, PorterRequest, PorterStats, PorterStatus};
use helm_core::users::User;
use helm_core::ConsoleError;
use helm_store::{Clause, Document, DocumentStore, FindOptions, Predicate, Sort};

/// Hard cap on rows returned by the download (bulk export) mode.
pub const EXPORT_ROW_CAP: usize = 10_000;

pub const ORDERS: &str = "orders";
pub const USERS: &str = "users";
pub const PRODUCTS: &str = "products";
pub const CATEGORIES: &str = "categories";
pub const BRANDS: &str = "brands";
pub const PORTER_REQUESTS: &str = "porter_requests";

const UNKNOWN: &str = "Unknown";
const NO_PHONE: &str = "Not provided";

#[derive(Clone, Debug, Serialize)]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderSummary {
    pub id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub delivery_partner_name: Option<String>,
    pub total: f64,
    pub status: OrderStatus,
    pub order_type: OrderKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct OrdersPage {
    pub orders: Vec<OrderSummary>,
    pub pagination: Pagination,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderItemView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub quantity: u32,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub product_image: Vec<ProductImage>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AddressView {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CustomerView {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderDetail {
    pub id: String,
    pub order_type: OrderKind,
    pub status: OrderStatus,
    pub status_history: Vec<StatusChange>,
    pub items: Vec<OrderItemView>,
    pub delivery_address: Option<AddressView>,
    pub total: f64,
    pub promo_code: String,
    pub promo_discount: f64,
    pub tip_amount: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub customer: CustomerView,
}

#[derive(Clone, Debug, Serialize)]
pub struct PartnerContact {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Flattened order row for bulk export.
#[derive(Clone, Debug, Serialize)]
pub struct OrderExportRow {
    pub id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub delivery_partner_name: Option<String>,
    pub total: f64,
    pub status: OrderStatus,
    pub order_type: OrderKind,
    pub payment_method: String,
    pub payment_status: String,
    pub promo_code: String,
    pub promo_discount: f64,
    pub tip_amount: f64,
    pub items: Vec<OrderItemView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<DeliveryAddress>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PorterRequestView {
    pub id: String,
    pub pickup_address: Value,
    pub delivery_address: Value,
    pub phone: String,
    pub description: String,
    pub estimated_distance: Option<f64>,
    pub package_size: PackageSize,
    pub urgent: bool,
    pub status: PorterStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub assigned_partner_id: Option<String>,
    pub assigned_partner_name: Option<String>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub admin_notes: Option<String>,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
}

#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub brands: Vec<Brand>,
}

/// Decode a single required document, mapping malformed data to an internal
/// error rather than a panic.
pub fn decode<T: DeserializeOwned>(doc: Document, what: &str) -> Result<T, ConsoleError> {
    serde_json::from_value(doc)
        .map_err(|e| ConsoleError::Internal(format!("malformed {what} document: {e}")))
}

/// Decode a batch, skipping malformed rows with a warning so one bad
/// document never discards the rest.
fn decode_rows<T: DeserializeOwned>(docs: Vec<Document>, what: &str) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<T>(doc) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::warn!(what, error = %e, "skipping malformed row");
                None
            }
        })
        .collect()
}

/// One batched lookup of users by business id, keyed for join fusion.
async fn load_users_by_id(
    store: &dyn DocumentStore,
    ids: &BTreeSet<String>,
) -> Result<HashMap<String, User>, ConsoleError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let values = ids.iter().map(|id| Value::String(id.clone())).collect();
    let docs = store
        .find_many(
            USERS,
            &Predicate::empty().with(Clause::any_of("id", values)),
            FindOptions::default(),
        )
        .await?;
    Ok(decode_rows::<User>(docs, "user")
        .into_iter()
        .map(|u| (u.id.as_str().to_owned(), u))
        .collect())
}

/// One batched lookup of users by surrogate key.
async fn load_users_by_key(
    store: &dyn DocumentStore,
    keys: &BTreeSet<String>,
) -> Result<HashMap<String, User>, ConsoleError> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }
    let values = keys.iter().map(|k| Value::String(k.clone())).collect();
    let docs = store
        .find_many(
            USERS,
            &Predicate::empty().with(Clause::any_of("_key", values)),
            FindOptions::default(),
        )
        .await?;
    Ok(decode_rows::<User>(docs, "user")
        .into_iter()
        .filter_map(|u| u.key.as_ref().map(|k| (k.to_string(), u.clone())))
        .collect())
}

/// One batched lookup of products by business code.
async fn load_products_by_code(
    store: &dyn DocumentStore,
    codes: &BTreeSet<String>,
) -> Result<HashMap<String, Product>, ConsoleError> {
    if codes.is_empty() {
        return Ok(HashMap::new());
    }
    let values = codes.iter().map(|c| Value::String(c.clone())).collect();
    let docs = store
        .find_many(
            PRODUCTS,
            &Predicate::empty().with(Clause::any_of("code", values)),
            FindOptions::default(),
        )
        .await?;
    Ok(decode_rows::<Product>(docs, "product")
        .into_iter()
        .map(|p| (p.code.clone(), p))
        .collect())
}

fn order_summary(
    order: &Order,
    users: &HashMap<String, User>,
    partners: &HashMap<String, User>,
) -> OrderSummary {
    let user = users.get(order.user.as_str());
    let partner = order
        .delivery_partner
        .as_ref()
        .and_then(|id| partners.get(id.as_str()));
    OrderSummary {
        id: order.code.clone(),
        user_name: user.map(|u| u.name.clone()).unwrap_or_else(|| UNKNOWN.into()),
        user_email: user.map(|u| u.email.clone()).unwrap_or_default(),
        user_phone: user.map(|u| u.phone.clone()).unwrap_or_default(),
        delivery_partner_name: partner.map(|p| p.name.clone()),
        total: order.total_amount,
        status: order.status,
        order_type: order.kind,
        created_at: order.created_at,
    }
}

fn item_views(items: &[OrderItem], products: &HashMap<String, Product>) -> Vec<OrderItemView> {
    items
        .iter()
        .map(|item| {
            let product = item
                .product
                .as_deref()
                .filter(|_| item.kind == ItemKind::Product)
                .and_then(|code| products.get(code));
            OrderItemView {
                product: item.product.clone(),
                kind: item.kind,
                quantity: item.quantity,
                price: item.price,
                product_name: product.map(|p| p.name.clone()),
                product_image: product.map(|p| p.images.clone()).unwrap_or_default(),
            }
        })
        .collect()
}

fn address_view(addr: &DeliveryAddress) -> AddressView {
    AddressView {
        address: addr.street.clone(),
        city: addr.city.clone(),
        state: addr.state.clone(),
        pincode: addr.pincode.clone(),
        phone: addr.mobile_number.clone(),
    }
}

/// Assemble one page of orders. Count and page fetch are two separate store
/// calls; the window between them is an accepted eventual-consistency
/// trade-off.
pub async fn assemble_orders_page(
    store: &dyn DocumentStore,
    predicate: &Predicate,
    page: usize,
    limit: usize,
) -> Result<OrdersPage, ConsoleError> {
    let limit = limit.max(1);
    let total_items = store.count(ORDERS, predicate).await?;
    let total_pages = std::cmp::max(1, (total_items as usize).div_ceil(limit));

    let docs = store
        .find_many(
            ORDERS,
            predicate,
            FindOptions::sorted(Sort::desc("created_at"))
                .skip((page - 1) * limit)
                .limit(limit),
        )
        .await?;
    let orders = decode_rows::<Order>(docs, "order");

    let user_ids: BTreeSet<String> = orders
        .iter()
        .map(|o| o.user.as_str().to_owned())
        .collect();
    let partner_ids: BTreeSet<String> = orders
        .iter()
        .filter_map(|o| o.delivery_partner.as_ref().map(|p| p.as_str().to_owned()))
        .collect();

    let users = load_users_by_id(store, &user_ids).await?;
    let partners = load_users_by_id(store, &partner_ids).await?;

    let summaries = orders
        .iter()
        .map(|o| order_summary(o, &users, &partners))
        .collect();

    Ok(OrdersPage {
        orders: summaries,
        pagination: Pagination {
            current_page: page,
            total_pages,
            total_items,
            has_prev: page > 1,
            has_next: page < total_pages,
        },
    })
}

/// Load one order by business code.
pub async fn load_order(store: &dyn DocumentStore, code: &str) -> Result<Order, ConsoleError> {
    let doc = store
        .find_one(ORDERS, &Predicate::empty().with(Clause::eq("code", code)))
        .await?
        .ok_or_else(|| ConsoleError::not_found("Order"))?;
    decode(doc, "order")
}

/// Load one product by business code.
pub async fn load_product(store: &dyn DocumentStore, code: &str) -> Result<Product, ConsoleError> {
    let doc = store
        .find_one(PRODUCTS, &Predicate::empty().with(Clause::eq("code", code)))
        .await?
        .ok_or_else(|| ConsoleError::not_found("Product"))?;
    decode(doc, "product")
}

pub async fn assemble_order_detail(
    store: &dyn DocumentStore,
    code: &str,
) -> Result<OrderDetail, ConsoleError> {
    let order = load_order(store, code).await?;

    let user = store
        .find_one(
            USERS,
            &Predicate::empty().with(Clause::eq("id", order.user.as_str())),
        )
        .await?
        .and_then(|doc| serde_json::from_value::<User>(doc).ok());

    let product_codes: BTreeSet<String> = order
        .items
        .iter()
        .filter(|i| i.kind == ItemKind::Product)
        .filter_map(|i| i.product.clone())
        .collect();
    let products = load_products_by_code(store, &product_codes).await?;

    Ok(OrderDetail {
        id: order.code.clone(),
        order_type: order.kind,
        status: order.status,
        status_history: order.status_change_history.clone(),
        items: item_views(&order.items, &products),
        delivery_address: order.delivery_address.as_ref().map(address_view),
        total: order.total_amount,
        promo_code: order.promo_code.clone(),
        promo_discount: order.promo_discount,
        tip_amount: order.tip_amount,
        payment_method: order.payment_method.clone(),
        payment_status: order.payment_status.clone(),
        created_at: order.created_at,
        customer: CustomerView {
            name: user.as_ref().map(|u| u.name.clone()),
            email: user.as_ref().map(|u| u.email.clone()),
            phone: user.as_ref().map(|u| u.phone.clone()),
        },
    })
}

/// Unpaged export: same predicate and batched-join discipline as the paged
/// view, capped at [`EXPORT_ROW_CAP`] rows. Per-row failures are skipped so
/// one malformed row never discards the export.
pub async fn assemble_orders_export(
    store: &dyn DocumentStore,
    predicate: &Predicate,
) -> Result<Vec<OrderExportRow>, ConsoleError> {
    let docs = store
        .find_many(
            ORDERS,
            predicate,
            FindOptions::sorted(Sort::desc("created_at")).limit(EXPORT_ROW_CAP),
        )
        .await?;
    let orders = decode_rows::<Order>(docs, "order");

    let user_ids: BTreeSet<String> = orders
        .iter()
        .map(|o| o.user.as_str().to_owned())
        .collect();
    let partner_ids: BTreeSet<String> = orders
        .iter()
        .filter_map(|o| o.delivery_partner.as_ref().map(|p| p.as_str().to_owned()))
        .collect();
    let product_codes: BTreeSet<String> = orders
        .iter()
        .flat_map(|o| o.items.iter())
        .filter(|i| i.kind == ItemKind::Product)
        .filter_map(|i| i.product.clone())
        .collect();

    let users = load_users_by_id(store, &user_ids).await?;
    let partners = load_users_by_id(store, &partner_ids).await?;
    let products = load_products_by_code(store, &product_codes).await?;

    let rows = orders
        .iter()
        .map(|order| {
            let user = users.get(order.user.as_str());
            let partner = order
                .delivery_partner
                .as_ref()
                .and_then(|id| partners.get(id.as_str()));
            OrderExportRow {
                id: order.code.clone(),
                user_name: user.map(|u| u.name.clone()).unwrap_or_else(|| UNKNOWN.into()),
                user_email: user.map(|u| u.email.clone()).unwrap_or_default(),
                user_phone: user.map(|u| u.phone.clone()).unwrap_or_default(),
                delivery_partner_name: partner.map(|p| p.name.clone()),
                total: order.total_amount,
                status: order.status,
                order_type: order.kind,
                payment_method: order.payment_method.clone(),
                payment_status: order.payment_status.clone(),
                promo_code: order.promo_code.clone(),
                promo_discount: order.promo_discount,
                tip_amount: order.tip_amount,
                items: item_views(&order.items, &products),
                delivery_address: order.delivery_address.clone(),
                created_at: order.created_at,
                updated_at: order.updated_at,
            }
        })
        .collect();

    Ok(rows)
}

/// Filtered porter request list with one batched requester lookup.
pub async fn assemble_porter_requests(
    store: &dyn DocumentStore,
    predicate: &Predicate,
) -> Result<Vec<PorterRequestView>, ConsoleError> {
    let docs = store
        .find_many(
            PORTER_REQUESTS,
            predicate,
            FindOptions::sorted(Sort::desc("created_at")),
        )
        .await?;
    let requests = decode_rows::<PorterRequest>(docs, "porter request");

    let user_keys: BTreeSet<String> = requests
        .iter()
        .filter_map(|r| r.user_key.as_ref().map(|k| k.to_string()))
        .collect();
    let users = load_users_by_key(store, &user_keys).await?;

    let views = requests
        .into_iter()
        .filter_map(|request| {
            let key = match &request.key {
                Some(key) => key.to_string(),
                None => {
                    tracing::warn!("porter request without store key, skipping row");
                    return None;
                }
            };
            let user = request
                .user_key
                .as_ref()
                .and_then(|k| users.get(&k.to_string()));
            Some(PorterRequestView {
                id: key,
                pickup_address: request.pickup_address.clone(),
                delivery_address: request.delivery_address.clone(),
                phone: request.phone.clone().unwrap_or_else(|| NO_PHONE.into()),
                description: request.description.clone(),
                estimated_distance: request.estimated_distance,
                package_size: request.package_size,
                urgent: request.urgent,
                status: request.status,
                created_at: request.created_at,
                updated_at: request.updated_at,
                assigned_partner_id: request.assigned_partner_key.as_ref().map(|k| k.to_string()),
                assigned_partner_name: request.assigned_partner_name.clone(),
                estimated_cost: request.estimated_cost,
                actual_cost: request.actual_cost,
                admin_notes: request.admin_notes.clone(),
                user_name: user
                    .map(|u| u.name.clone())
                    .or_else(|| request.user_name.clone())
                    .unwrap_or_else(|| UNKNOWN.into()),
                user_email: user
                    .map(|u| u.email.clone())
                    .or_else(|| request.user_email.clone())
                    .unwrap_or_else(|| UNKNOWN.into()),
                user_phone: user
                    .map(|u| u.phone.clone())
                    .or_else(|| request.user_phone.clone())
                    .unwrap_or_else(|| NO_PHONE.into()),
            })
        })
        .collect();

    Ok(views)
}

pub async fn assemble_porter_stats(store: &dyn DocumentStore) -> Result<PorterStats, ConsoleError> {
    let docs = store
        .find_many(PORTER_REQUESTS, &Predicate::empty(), FindOptions::default())
        .await?;
    let requests = decode_rows::<PorterRequest>(docs, "porter request");

    let today_start = Utc::now()
        .date_naive()
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();

    let mut stats = PorterStats {
        total_requests: requests.len() as u64,
        ..Default::default()
    };
    for request in &requests {
        stats.status_breakdown.record(request.status);
        if request.created_at >= today_start {
            stats.today_requests += 1;
        }
        if request.urgent {
            stats.urgent_requests += 1;
        }
        if request.status == PorterStatus::Delivered {
            stats.total_revenue += request.actual_cost.unwrap_or(0.0);
        }
    }
    Ok(stats)
}

/// Full unfiltered catalog snapshot: all products (newest first) plus all
/// categories and brands.
pub async fn assemble_catalog_snapshot(
    store: &dyn DocumentStore,
) -> Result<CatalogSnapshot, ConsoleError> {
    let product_docs = store
        .find_many(
            PRODUCTS,
            &Predicate::empty(),
            FindOptions::sorted(Sort::desc("created_at")),
        )
        .await?;
    let category_docs = store
        .find_many(CATEGORIES, &Predicate::empty(), FindOptions::default())
        .await?;
    let brand_docs = store
        .find_many(BRANDS, &Predicate::empty(), FindOptions::default())
        .await?;

    Ok(CatalogSnapshot {
        products: decode_rows(product_docs, "product"),
        categories: decode_rows(category_docs, "category"),
        brands: decode_rows(brand_docs, "brand"),
    })
}
