//! Wire protocol: inbound commands and outbound responses, both tagged with
//! a `type` discriminator. Inbound key casing is normalized before parsing
//! so `orderId` and `order_id` address the same field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use helm_core::catalog::{Brand, Category, Product, ProductImage};
use helm_core::porter::PorterStats;

use crate::lifecycle::AssignmentAck;
use crate::views::{
    CatalogSnapshot, OrderDetail, OrderExportRow, OrderSummary, Pagination, PartnerContact,
    PorterRequestView,
};

/// Weakly-typed order list filters as they arrive from the client. Every
/// field is optional; amounts and page/limit may be numbers or strings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderFilters {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
    #[serde(default)]
    pub min_amount: Option<Value>,
    #[serde(default)]
    pub max_amount: Option<Value>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<Value>,
    #[serde(default)]
    pub limit: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PorterFilters {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub urgent: Option<bool>,
    #[serde(default)]
    pub package_size: Option<String>,
}

/// Catalog item fields shared by create and update commands. Numeric fields
/// stay weakly typed until validated; `keywords` accepts a list or a
/// comma-separated string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub actual_price: Option<Value>,
    #[serde(default)]
    pub selling_price: Option<Value>,
    #[serde(default)]
    pub discount: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub stock: Option<Value>,
    #[serde(default)]
    pub keywords: Option<Value>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub allow_user_images: Option<bool>,
    #[serde(default)]
    pub allow_user_description: Option<bool>,
    #[serde(default)]
    pub admin_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    GetOrders {
        #[serde(default)]
        filters: OrderFilters,
    },
    GetOrderDetails {
        #[serde(default)]
        order_id: Option<String>,
    },
    UpdateOrderStatus {
        #[serde(default)]
        order_id: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        admin_name: Option<String>,
    },
    AssignDeliveryPartner {
        #[serde(default)]
        order_id: Option<String>,
        #[serde(default)]
        delivery_partner_id: Option<String>,
        #[serde(default)]
        admin_name: Option<String>,
    },
    GetDeliveryRequests {
        #[serde(default)]
        order_id: Option<String>,
    },
    DownloadOrders {
        #[serde(default)]
        filters: OrderFilters,
    },
    GetPorterRequests {
        #[serde(default)]
        filters: PorterFilters,
    },
    UpdatePorterStatus {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        admin_notes: Option<String>,
        #[serde(default)]
        estimated_cost: Option<Value>,
    },
    AssignPorterPartner {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        partner_id: Option<String>,
        #[serde(default)]
        estimated_cost: Option<Value>,
    },
    GetPorterStats,
    GetProducts,
    CreateProduct {
        #[serde(flatten)]
        payload: ProductPayload,
    },
    UpdateProduct {
        #[serde(default)]
        id: Option<String>,
        #[serde(flatten)]
        payload: ProductPayload,
    },
    DeleteProduct {
        #[serde(default)]
        id: Option<String>,
    },
    AddProductImages {
        #[serde(default)]
        product_id: Option<String>,
        #[serde(default)]
        images: Vec<String>,
    },
}

impl Command {
    /// The action phrase used in generic failure messages
    /// ("Failed to fetch orders").
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetOrders { .. } => "fetch orders",
            Self::GetOrderDetails { .. } => "fetch order details",
            Self::UpdateOrderStatus { .. } => "update order status",
            Self::AssignDeliveryPartner { .. } => "assign delivery partner",
            Self::GetDeliveryRequests { .. } => "get delivery requests",
            Self::DownloadOrders { .. } => "fetch orders for download",
            Self::GetPorterRequests { .. } => "fetch porter requests",
            Self::UpdatePorterStatus { .. } => "update porter request status",
            Self::AssignPorterPartner { .. } => "assign porter partner",
            Self::GetPorterStats => "get porter stats",
            Self::GetProducts => "get products",
            Self::CreateProduct { .. } => "create product",
            Self::UpdateProduct { .. } => "update product",
            Self::DeleteProduct { .. } => "delete product",
            Self::AddProductImages { .. } => "add product images",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    OrdersData {
        orders: Vec<OrderSummary>,
        pagination: Pagination,
    },
    OrderDetails {
        order: Box<OrderDetail>,
    },
    OrderUpdated {
        success: bool,
        order_id: String,
    },
    OrderAssigned {
        success: bool,
        data: AssignmentAck,
    },
    DeliveryRequestsData {
        delivery_requests: Vec<PartnerContact>,
    },
    OrdersDownloadData {
        orders: Vec<OrderExportRow>,
        total_count: usize,
    },
    PorterRequestsData {
        requests: Vec<PorterRequestView>,
        total_count: usize,
    },
    PorterRequestUpdated {
        message: String,
        request_id: String,
    },
    PorterStatsData {
        stats: PorterStats,
    },
    ProductsData {
        products: Vec<Product>,
        categories: Vec<Category>,
        brands: Vec<Brand>,
    },
    ProductCreated {
        product: Box<Product>,
        images_uploaded: usize,
    },
    ProductUpdated {
        product: Box<Product>,
    },
    ProductDeleted {
        product_id: String,
    },
    ImagesAdded {
        product_id: String,
        new_images: Vec<ProductImage>,
        total_images: usize,
    },
    UploadProgress {
        message: String,
        progress: u8,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn products_data(snapshot: CatalogSnapshot) -> Self {
        Self::ProductsData {
            products: snapshot.products,
            categories: snapshot.categories,
            brands: snapshot.brands,
        }
    }

    pub fn stats(stats: PorterStats) -> Self {
        Self::PorterStatsData { stats }
    }
}

/// Parse an inbound frame into a command, normalizing camelCase keys to
/// snake_case first.
pub fn parse_command(raw: &str) -> Result<Command, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    serde_json::from_value(normalize_keys(value))
}

/// Recursively rewrite camelCase object keys as snake_case. An existing
/// snake_case key wins over its camelCase duplicate.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut result = serde_json::Map::with_capacity(map.len());
            // First pass: keys already in canonical form
            let mut pending = Vec::new();
            for (key, val) in map {
                let snake = camel_to_snake(&key);
                if snake == key {
                    result.insert(key, normalize_keys(val));
                } else {
                    pending.push((snake, val));
                }
            }
            for (snake, val) in pending {
                result.entry(snake).or_insert_with(|| normalize_keys(val));
            }
            Value::Object(result)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Weak numeric parse: accepts a JSON number or a numeric string.
pub fn weak_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn weak_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
