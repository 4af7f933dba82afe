use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Form, Path, Query, State,
    },
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use tracing::info;

use crate::api::AppState;
use crate::database::{OrderRecord, OrderStatus};
use crate::error::{AppError, AppErrorKind, AppResult, ValidationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::services::payment_flow::InitiatePaymentRequest;

/// `tran_id`/`val_id` as sent on the browser redirects, by query or form post.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectParams {
    pub tran_id: Option<String>,
    pub val_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderEntry {
    pub tran_id: String,
    pub order: OrderRecord,
}

fn malformed(reason: impl Into<String>, headers: &HeaderMap) -> AppError {
    let error = AppError::new(AppErrorKind::Validation(ValidationError::MalformedBody {
        reason: reason.into(),
    }));
    tag(error, headers)
}

fn tag(error: AppError, headers: &HeaderMap) -> AppError {
    match get_request_id_from_headers(headers) {
        Some(request_id) => error.with_request_id(request_id),
        None => error,
    }
}

/// POST /api/payments/initiate
pub async fn initiate(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<InitiatePaymentRequest>, JsonRejection>,
) -> AppResult<Json<JsonValue>> {
    let Json(request) = payload.map_err(|e| malformed(e.body_text(), &headers))?;

    let initiated = state
        .payments
        .initiate(request)
        .await
        .map_err(|e| tag(e.with_context("initiate"), &headers))?;

    Ok(Json(json!({
        "success": true,
        "tran_id": initiated.tran_id,
        "paymentUrl": initiated.payment_url,
    })))
}

/// POST /api/payments/ipn (form-encoded, sent by the gateway)
pub async fn ipn(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Form<HashMap<String, String>>, FormRejection>,
) -> AppResult<Json<JsonValue>> {
    let Form(payload) = payload.map_err(|e| malformed(e.body_text(), &headers))?;

    let outcome = state
        .payments
        .handle_ipn(payload)
        .await
        .map_err(|e| tag(e.with_context("ipn"), &headers))?;

    Ok(Json(json!({
        "success": true,
        "message": if outcome.paid { "Payment successful" } else { "Payment failed" },
        "status_from_ipn": outcome.status_from_ipn,
        "validated_status": outcome.validated_status,
    })))
}

async fn success(
    state: &AppState,
    headers: &HeaderMap,
    params: RedirectParams,
) -> AppResult<Json<JsonValue>> {
    let paid = state
        .payments
        .confirm_success_redirect(params.tran_id.as_deref(), params.val_id.as_deref())
        .await
        .map_err(|e| tag(e.with_context("success redirect"), headers))?;

    info!(
        tran_id = params.tran_id.as_deref().unwrap_or("<none>"),
        revalidated = paid.is_some(),
        "success redirect captured"
    );
    Ok(Json(json!({
        "success": true,
        "message": "Success redirect captured",
        "tran_id": params.tran_id,
        "val_id": params.val_id,
    })))
}

async fn terminal(
    state: &AppState,
    headers: &HeaderMap,
    params: RedirectParams,
    status: OrderStatus,
) -> AppResult<Json<JsonValue>> {
    state
        .payments
        .record_redirect_outcome(params.tran_id.as_deref(), status)
        .await
        .map_err(|e| tag(e, headers))?;

    let message = match status {
        OrderStatus::Cancelled => "Payment cancelled",
        _ => "Payment failed",
    };
    Ok(Json(json!({
        "success": false,
        "message": message,
        "tran_id": params.tran_id,
    })))
}

/// GET /api/payments/success
pub async fn success_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RedirectParams>,
) -> AppResult<Json<JsonValue>> {
    success(&state, &headers, params).await
}

/// POST /api/payments/success
pub async fn success_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Form<RedirectParams>, FormRejection>,
) -> AppResult<Json<JsonValue>> {
    let Form(params) = params.map_err(|e| malformed(e.body_text(), &headers))?;
    success(&state, &headers, params).await
}

/// GET /api/payments/fail
pub async fn fail_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RedirectParams>,
) -> AppResult<Json<JsonValue>> {
    terminal(&state, &headers, params, OrderStatus::Failed).await
}

/// POST /api/payments/fail
pub async fn fail_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Form<RedirectParams>, FormRejection>,
) -> AppResult<Json<JsonValue>> {
    let Form(params) = params.map_err(|e| malformed(e.body_text(), &headers))?;
    terminal(&state, &headers, params, OrderStatus::Failed).await
}

/// GET /api/payments/cancel
pub async fn cancel_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RedirectParams>,
) -> AppResult<Json<JsonValue>> {
    terminal(&state, &headers, params, OrderStatus::Cancelled).await
}

/// POST /api/payments/cancel
pub async fn cancel_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Form<RedirectParams>, FormRejection>,
) -> AppResult<Json<JsonValue>> {
    let Form(params) = params.map_err(|e| malformed(e.body_text(), &headers))?;
    terminal(&state, &headers, params, OrderStatus::Cancelled).await
}

/// GET /api/payments/order/{tran_id}
pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tran_id): Path<String>,
) -> AppResult<Json<JsonValue>> {
    let order = state
        .payments
        .get_order(&tran_id)
        .await
        .map_err(|e| tag(e, &headers))?;

    Ok(Json(json!({ "success": true, "order": order })))
}

/// GET /api/payments/orders
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<JsonValue>> {
    let orders: Vec<OrderEntry> = state
        .payments
        .list_orders()
        .await
        .map_err(|e| tag(e, &headers))?
        .into_iter()
        .map(|(tran_id, order)| OrderEntry { tran_id, order })
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": orders.len(),
        "orders": orders,
    })))
}
