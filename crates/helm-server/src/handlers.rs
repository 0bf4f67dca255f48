//! Command handlers organized by domain, plus the dispatch boundary that
//! turns every failure into a single `error` response for the initiator.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use helm_core::catalog::{self, Product, MAX_PRODUCT_IMAGES};
use helm_core::ids::UserId;
use helm_core::orders::OrderStatus;
use helm_core::ConsoleError;
use helm_store::{Clause, CodeGenerator, DocumentStore, FindOptions, MediaStore, Predicate, UpdateSpec};

use crate::broadcast;
use crate::filters;
use crate::lifecycle;
use crate::protocol::{self, weak_f64, weak_i64, Command, OrderFilters, ProductPayload, Response};
use crate::sessions::{SessionId, SessionRegistry};
use crate::uploads::{self, SessionProgress};
use crate::views::{self, CATEGORIES, PRODUCTS, USERS};

const DEFAULT_ADMIN: &str = "Admin";
const DEFAULT_ACTOR: &str = "admin";

/// Shared state available to all command handlers: the three external
/// collaborator contracts.
pub struct HandlerState {
    pub store: Arc<dyn DocumentStore>,
    pub media: Arc<dyn MediaStore>,
    pub codes: Arc<dyn CodeGenerator>,
}

impl HandlerState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        media: Arc<dyn MediaStore>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            store,
            media,
            codes,
        }
    }
}

fn send(registry: &SessionRegistry, session_id: &SessionId, response: &Response) {
    if let Some(json) = broadcast::encode(response) {
        if !registry.send_to(session_id, json) {
            tracing::debug!(session_id = %session_id, "response dropped, session gone");
        }
    }
}

/// Dispatch one inbound frame. Errors never escape: client faults echo
/// their message, everything else is logged with context and collapsed to a
/// generic failure phrase.
pub async fn dispatch(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    raw: &str,
) {
    let command = match protocol::parse_command(raw) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(error = %e, "unparsable command frame");
            send(
                registry,
                session_id,
                &Response::error("Unrecognized or malformed command"),
            );
            return;
        }
    };

    let action = command.action();
    if let Err(err) = route(state, registry, session_id, command).await {
        if err.is_client_fault() {
            tracing::warn!(action, error = %err, "command rejected");
        } else {
            tracing::error!(action, kind = err.error_kind(), error = %err, "command failed");
        }
        send(
            registry,
            session_id,
            &Response::error(err.client_message(action)),
        );
    }
}

async fn route(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    command: Command,
) -> Result<(), ConsoleError> {
    match command {
        Command::GetOrders { filters } => get_orders(state, registry, session_id, &filters).await,
        Command::GetOrderDetails { order_id } => {
            get_order_details(state, registry, session_id, order_id).await
        }
        Command::UpdateOrderStatus {
            order_id,
            status,
            admin_name,
        } => update_order_status(state, registry, session_id, order_id, status, admin_name).await,
        Command::AssignDeliveryPartner {
            order_id,
            delivery_partner_id,
            admin_name,
        } => {
            assign_delivery_partner(
                state,
                registry,
                session_id,
                order_id,
                delivery_partner_id,
                admin_name,
            )
            .await
        }
        Command::GetDeliveryRequests { order_id } => {
            get_delivery_requests(state, registry, session_id, order_id).await
        }
        Command::DownloadOrders { filters } => {
            download_orders(state, registry, session_id, &filters).await
        }
        Command::GetPorterRequests { filters } => {
            let predicate = filters::compile_porter_filters(&filters);
            let requests = views::assemble_porter_requests(state.store.as_ref(), &predicate).await?;
            let total_count = requests.len();
            send(
                registry,
                session_id,
                &Response::PorterRequestsData {
                    requests,
                    total_count,
                },
            );
            Ok(())
        }
        Command::UpdatePorterStatus {
            request_id,
            status,
            admin_notes,
            estimated_cost,
        } => {
            update_porter_status(
                state,
                registry,
                session_id,
                request_id,
                status,
                admin_notes,
                estimated_cost,
            )
            .await
        }
        Command::AssignPorterPartner {
            request_id,
            partner_id,
            estimated_cost,
        } => {
            assign_porter_partner(
                state,
                registry,
                session_id,
                request_id,
                partner_id,
                estimated_cost,
            )
            .await
        }
        Command::GetPorterStats => {
            let stats = views::assemble_porter_stats(state.store.as_ref()).await?;
            send(registry, session_id, &Response::stats(stats));
            Ok(())
        }
        Command::GetProducts => {
            let snapshot = views::assemble_catalog_snapshot(state.store.as_ref()).await?;
            send(registry, session_id, &Response::products_data(snapshot));
            Ok(())
        }
        Command::CreateProduct { payload } => {
            create_product(state, registry, session_id, payload).await
        }
        Command::UpdateProduct { id, payload } => {
            update_product(state, registry, session_id, id, payload).await
        }
        Command::DeleteProduct { id } => delete_product(state, registry, session_id, id).await,
        Command::AddProductImages { product_id, images } => {
            add_product_images(state, registry, session_id, product_id, images).await
        }
    }
}

fn require(value: Option<String>, message: &str) -> Result<String, ConsoleError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConsoleError::validation(message))
}

// ── Order handlers ──

async fn get_orders(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    filters: &OrderFilters,
) -> Result<(), ConsoleError> {
    let predicate = filters::compile_order_filters(filters);
    let (page, limit) = filters::page_params(filters);
    let view = views::assemble_orders_page(state.store.as_ref(), &predicate, page, limit).await?;
    send(
        registry,
        session_id,
        &Response::OrdersData {
            orders: view.orders,
            pagination: view.pagination,
        },
    );
    Ok(())
}

async fn get_order_details(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    order_id: Option<String>,
) -> Result<(), ConsoleError> {
    let order_id = require(order_id, "Order ID is required")?;
    let detail = views::assemble_order_detail(state.store.as_ref(), &order_id).await?;
    send(
        registry,
        session_id,
        &Response::OrderDetails {
            order: Box::new(detail),
        },
    );
    Ok(())
}

async fn update_order_status(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    order_id: Option<String>,
    status: Option<String>,
    admin_name: Option<String>,
) -> Result<(), ConsoleError> {
    let (Some(order_id), Some(status)) = (
        order_id.filter(|v| !v.is_empty()),
        status.filter(|v| !v.is_empty()),
    ) else {
        return Err(ConsoleError::validation("Order ID and status are required"));
    };
    let status: OrderStatus = status
        .parse()
        .map_err(|_| ConsoleError::validation(format!("Invalid status: {status}")))?;

    lifecycle::update_order_status(
        state.store.as_ref(),
        &order_id,
        status,
        admin_name.as_deref(),
    )
    .await?;

    let ack = Response::OrderUpdated {
        success: true,
        order_id,
    };
    send(registry, session_id, &ack);
    broadcast::publish(registry, &ack, Some(session_id));
    Ok(())
}

async fn assign_delivery_partner(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    order_id: Option<String>,
    delivery_partner_id: Option<String>,
    admin_name: Option<String>,
) -> Result<(), ConsoleError> {
    let (Some(order_id), Some(partner_id)) = (
        order_id.filter(|v| !v.is_empty()),
        delivery_partner_id.filter(|v| !v.is_empty()),
    ) else {
        return Err(ConsoleError::validation(
            "Order ID and delivery partner ID are required",
        ));
    };
    let admin_name = admin_name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_ADMIN.to_owned());

    let ack = lifecycle::assign_delivery_partner(
        state.store.as_ref(),
        &order_id,
        &UserId::from_raw(partner_id),
        &admin_name,
    )
    .await?;

    let response = Response::OrderAssigned {
        success: true,
        data: ack,
    };
    send(registry, session_id, &response);
    broadcast::publish(registry, &response, Some(session_id));
    Ok(())
}

async fn get_delivery_requests(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    order_id: Option<String>,
) -> Result<(), ConsoleError> {
    let order_id = require(order_id, "Order ID is required")?;
    let order = views::load_order(state.store.as_ref(), &order_id).await?;

    let mut delivery_requests = Vec::new();
    if !order.accepted_partners.is_empty() {
        let ids: Vec<Value> = order
            .accepted_partners
            .iter()
            .map(|id| Value::String(id.as_str().to_owned()))
            .collect();
        let docs = state
            .store
            .find_many(
                USERS,
                &Predicate::empty().with(Clause::any_of("id", ids)),
                FindOptions::default(),
            )
            .await?;
        for doc in docs {
            match serde_json::from_value::<helm_core::users::User>(doc) {
                Ok(partner) => delivery_requests.push(views::PartnerContact {
                    id: partner.id.as_str().to_owned(),
                    name: partner.name,
                    email: partner.email,
                    phone: partner.phone,
                }),
                Err(e) => tracing::warn!(error = %e, "skipping malformed partner row"),
            }
        }
    }

    send(
        registry,
        session_id,
        &Response::DeliveryRequestsData { delivery_requests },
    );
    Ok(())
}

async fn download_orders(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    filters: &OrderFilters,
) -> Result<(), ConsoleError> {
    let predicate = filters::compile_order_filters(filters);
    let orders = views::assemble_orders_export(state.store.as_ref(), &predicate).await?;
    let total_count = orders.len();
    tracing::info!(total_count, "orders export assembled");
    send(
        registry,
        session_id,
        &Response::OrdersDownloadData {
            orders,
            total_count,
        },
    );
    Ok(())
}

// ── Porter handlers ──

async fn update_porter_status(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    request_id: Option<String>,
    status: Option<String>,
    admin_notes: Option<String>,
    estimated_cost: Option<Value>,
) -> Result<(), ConsoleError> {
    let (Some(request_id), Some(status)) = (
        request_id.filter(|v| !v.is_empty()),
        status.filter(|v| !v.is_empty()),
    ) else {
        return Err(ConsoleError::validation(
            "Request ID and status are required",
        ));
    };
    let estimated_cost = parse_optional_cost(estimated_cost.as_ref())?;

    let status = lifecycle::update_porter_status(
        state.store.as_ref(),
        &request_id,
        &status,
        admin_notes.as_deref(),
        estimated_cost,
    )
    .await?;

    let ack = Response::PorterRequestUpdated {
        message: format!("Porter request status updated to {status}"),
        request_id,
    };
    send(registry, session_id, &ack);
    broadcast::publish(registry, &ack, Some(session_id));
    Ok(())
}

async fn assign_porter_partner(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    request_id: Option<String>,
    partner_id: Option<String>,
    estimated_cost: Option<Value>,
) -> Result<(), ConsoleError> {
    let (Some(request_id), Some(partner_id)) = (
        request_id.filter(|v| !v.is_empty()),
        partner_id.filter(|v| !v.is_empty()),
    ) else {
        return Err(ConsoleError::validation(
            "Request ID and partner ID are required",
        ));
    };
    let estimated_cost = parse_optional_cost(estimated_cost.as_ref())?;

    lifecycle::assign_porter_partner(
        state.store.as_ref(),
        &request_id,
        &partner_id,
        estimated_cost,
    )
    .await?;

    let ack = Response::PorterRequestUpdated {
        message: "Partner assigned successfully".into(),
        request_id,
    };
    send(registry, session_id, &ack);
    broadcast::publish(registry, &ack, Some(session_id));
    Ok(())
}

fn parse_optional_cost(raw: Option<&Value>) -> Result<Option<f64>, ConsoleError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value) => weak_f64(value)
            .map(Some)
            .ok_or_else(|| ConsoleError::validation("Invalid estimated cost")),
    }
}

// ── Catalog handlers ──

fn required_text(payload: &Option<String>, field: &str) -> Result<String, ConsoleError> {
    payload
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            ConsoleError::validation(format!("Missing or empty required field: {field}"))
        })
}

fn required_f64(raw: &Option<Value>, field: &str) -> Result<f64, ConsoleError> {
    let value = raw.as_ref().ok_or_else(|| {
        ConsoleError::validation(format!("Missing or empty required field: {field}"))
    })?;
    weak_f64(value).ok_or_else(|| ConsoleError::validation(format!("Invalid value for field: {field}")))
}

fn required_i64(raw: &Option<Value>, field: &str) -> Result<i64, ConsoleError> {
    let value = raw.as_ref().ok_or_else(|| {
        ConsoleError::validation(format!("Missing or empty required field: {field}"))
    })?;
    weak_i64(value).ok_or_else(|| ConsoleError::validation(format!("Invalid value for field: {field}")))
}

fn actor(payload: &ProductPayload) -> String {
    payload
        .admin_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_ACTOR.to_owned())
}

async fn create_product(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    payload: ProductPayload,
) -> Result<(), ConsoleError> {
    let name = required_text(&payload.name, "name")?;
    let description = required_text(&payload.description, "description")?;
    let category_code = required_text(&payload.category, "category")?;
    let brand = required_text(&payload.brand, "brand")?;
    let actual_price = required_f64(&payload.actual_price, "actual_price")?;
    let selling_price = required_f64(&payload.selling_price, "selling_price")?;
    let stock = required_i64(&payload.stock, "stock")?;
    let discount = match payload.discount.as_ref() {
        Some(value) => weak_f64(value)
            .ok_or_else(|| ConsoleError::validation("Invalid value for field: discount"))?,
        None => 0.0,
    };

    let category_doc = state
        .store
        .find_one(
            CATEGORIES,
            &Predicate::empty().with(Clause::eq("code", category_code.as_str())),
        )
        .await?
        .ok_or_else(|| ConsoleError::not_found("Category"))?;
    let category: helm_core::catalog::Category = views::decode(category_doc, "category")?;

    let code = state.codes.next_product_code(&category.name).await?;
    let status = payload
        .status
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "active".to_owned());
    let keywords = payload
        .keywords
        .as_ref()
        .map(catalog::clean_keywords)
        .unwrap_or_default();
    let now = Utc::now();

    let product = Product {
        key: None,
        code: code.clone(),
        name,
        description,
        actual_price,
        selling_price,
        discount,
        category: category.code.clone(),
        brand,
        stock,
        images: Vec::new(),
        keywords,
        is_active: catalog::is_active_status(&status),
        status,
        allow_user_images: payload.allow_user_images.unwrap_or(false),
        allow_user_description: payload.allow_user_description.unwrap_or(false),
        created_at: now,
        created_by: actor(&payload),
        updated_at: Some(now),
        updated_by: None,
    };

    let doc = serde_json::to_value(&product)
        .map_err(|e| ConsoleError::Internal(format!("encode product: {e}")))?;
    state.store.insert_one(PRODUCTS, doc).await?;
    tracing::info!(product = %code, "product created");

    let payload_images = payload.images.unwrap_or_default();
    let sink = SessionProgress {
        registry: Arc::clone(registry),
        session_id: session_id.clone(),
    };
    let batch = uploads::upload_images(
        state.media.as_ref(),
        &sink,
        &code,
        &payload_images,
        0,
        true,
    )
    .await;

    if !batch.images.is_empty() {
        let images_value = serde_json::to_value(&batch.images)
            .map_err(|e| ConsoleError::Internal(format!("encode images: {e}")))?;
        state
            .store
            .update_one(
                PRODUCTS,
                &Predicate::empty().with(Clause::eq("code", code.as_str())),
                UpdateSpec::default().set("images", images_value),
            )
            .await?;
    }

    let created = views::load_product(state.store.as_ref(), &code).await?;
    send(
        registry,
        session_id,
        &Response::ProductCreated {
            product: Box::new(created),
            images_uploaded: batch.succeeded,
        },
    );
    broadcast::broadcast_catalog(state.store.as_ref(), registry).await;
    Ok(())
}

async fn update_product(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    id: Option<String>,
    payload: ProductPayload,
) -> Result<(), ConsoleError> {
    let id = require(id, "Product ID is required")?;
    let current = views::load_product(state.store.as_ref(), &id).await?;

    let mut update = UpdateSpec::default()
        .set("updated_at", Utc::now().to_rfc3339())
        .set("updated_by", actor(&payload));

    if let Some(name) = payload.name.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        update = update.set("name", name);
    }
    if let Some(description) = payload
        .description
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        update = update.set("description", description);
    }
    if let Some(raw) = payload.actual_price.as_ref() {
        let price = weak_f64(raw)
            .ok_or_else(|| ConsoleError::validation("Invalid value for field: actual_price"))?;
        update = update.set("actual_price", price);
    }
    if let Some(raw) = payload.selling_price.as_ref() {
        let price = weak_f64(raw)
            .ok_or_else(|| ConsoleError::validation("Invalid value for field: selling_price"))?;
        update = update.set("selling_price", price);
    }
    if let Some(raw) = payload.discount.as_ref() {
        let discount = weak_f64(raw)
            .ok_or_else(|| ConsoleError::validation("Invalid value for field: discount"))?;
        update = update.set("discount", discount);
    }
    if let Some(raw) = payload.stock.as_ref() {
        let stock = weak_i64(raw)
            .ok_or_else(|| ConsoleError::validation("Invalid value for field: stock"))?;
        update = update.set("stock", stock);
    }
    if let Some(category) = payload.category.as_deref().filter(|v| !v.is_empty()) {
        update = update.set("category", category);
    }
    if let Some(brand) = payload.brand.as_deref().filter(|v| !v.is_empty()) {
        update = update.set("brand", brand);
    }
    if let Some(keywords) = payload.keywords.as_ref() {
        let cleaned = catalog::clean_keywords(keywords);
        update = update.set("keywords", Value::from(cleaned));
    }
    if let Some(status) = payload.status.as_deref().filter(|v| !v.is_empty()) {
        // status and is_active move together
        update = update
            .set("status", status)
            .set("is_active", catalog::is_active_status(status));
    }
    if let Some(allow) = payload.allow_user_images {
        update = update.set("allow_user_images", allow);
    }
    if let Some(allow) = payload.allow_user_description {
        update = update.set("allow_user_description", allow);
    }

    // Replace images only when the client sent a full set of fresh inline
    // payloads; anything else keeps the stored list.
    let images = payload.images.as_deref().unwrap_or_default();
    if !images.is_empty() && images.iter().all(|img| img.starts_with("data:")) {
        let deleted = uploads::delete_images(state.media.as_ref(), &id, &current.images).await;
        tracing::info!(product = %id, deleted, "replaced product images in object storage");

        let sink = SessionProgress {
            registry: Arc::clone(registry),
            session_id: session_id.clone(),
        };
        let batch =
            uploads::upload_images(state.media.as_ref(), &sink, &id, images, 0, true).await;
        if !batch.images.is_empty() {
            let images_value = serde_json::to_value(&batch.images)
                .map_err(|e| ConsoleError::Internal(format!("encode images: {e}")))?;
            update = update.set("images", images_value);
        }
    }

    let updated = state
        .store
        .update_one(
            PRODUCTS,
            &Predicate::empty().with(Clause::eq("code", id.as_str())),
            update,
        )
        .await?;
    if !updated {
        return Err(ConsoleError::not_found("Product"));
    }

    let product = views::load_product(state.store.as_ref(), &id).await?;
    tracing::info!(product = %id, "product updated");
    send(
        registry,
        session_id,
        &Response::ProductUpdated {
            product: Box::new(product),
        },
    );
    broadcast::broadcast_catalog(state.store.as_ref(), registry).await;
    Ok(())
}

async fn delete_product(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    id: Option<String>,
) -> Result<(), ConsoleError> {
    let id = require(id, "Product ID is required")?;
    let product = views::load_product(state.store.as_ref(), &id).await?;

    let deleted_assets = uploads::delete_images(state.media.as_ref(), &id, &product.images).await;
    tracing::info!(product = %id, deleted_assets, "deleted product images from object storage");

    let deleted = state
        .store
        .delete_one(
            PRODUCTS,
            &Predicate::empty().with(Clause::eq("code", id.as_str())),
        )
        .await?;
    if !deleted {
        return Err(ConsoleError::not_found("Product"));
    }

    tracing::info!(product = %id, "product deleted");
    send(
        registry,
        session_id,
        &Response::ProductDeleted { product_id: id },
    );
    broadcast::broadcast_catalog(state.store.as_ref(), registry).await;
    Ok(())
}

async fn add_product_images(
    state: &Arc<HandlerState>,
    registry: &Arc<SessionRegistry>,
    session_id: &SessionId,
    product_id: Option<String>,
    images: Vec<String>,
) -> Result<(), ConsoleError> {
    let product_id = require(product_id, "Product ID is required")?;
    if images.is_empty() {
        return Err(ConsoleError::validation("No images provided"));
    }

    let product = views::load_product(state.store.as_ref(), &product_id).await?;
    let current = product.images;
    if current.len() + images.len() > MAX_PRODUCT_IMAGES {
        return Err(ConsoleError::validation(format!(
            "Maximum {MAX_PRODUCT_IMAGES} images allowed. Current: {}, Trying to add: {}",
            current.len(),
            images.len()
        )));
    }

    let sink = SessionProgress {
        registry: Arc::clone(registry),
        session_id: session_id.clone(),
    };
    let batch = uploads::upload_images(
        state.media.as_ref(),
        &sink,
        &product_id,
        &images,
        current.len(),
        false,
    )
    .await;

    let mut all_images = current;
    all_images.extend(batch.images.iter().cloned());
    let images_value = serde_json::to_value(&all_images)
        .map_err(|e| ConsoleError::Internal(format!("encode images: {e}")))?;
    state
        .store
        .update_one(
            PRODUCTS,
            &Predicate::empty().with(Clause::eq("code", product_id.as_str())),
            UpdateSpec::default().set("images", images_value),
        )
        .await?;

    send(
        registry,
        session_id,
        &Response::ImagesAdded {
            product_id,
            new_images: batch.images,
            total_images: all_images.len(),
        },
    );
    broadcast::broadcast_catalog(state.store.as_ref(), registry).await;
    Ok(())
}
