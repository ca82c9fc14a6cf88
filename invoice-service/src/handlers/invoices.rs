use crate::dtos::{
    parse_date, CreateInvoiceRequest, InvoiceDetailResponse, InvoiceListParams,
    InvoiceListResponse, InvoiceResponse, Pagination, ProfileResponse, UpdateInvoiceRequest,
    UpdateStatusRequest,
};
use crate::middleware::UserId;
use crate::models::{Invoice, InvoiceDraft, InvoiceStatus, LineItem};
use crate::services::{
    compute_totals, parse_numeric, price_line_items, InvoiceFilter, PageRequest, RawLineItem,
};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

fn bad_request(message: &str) -> AppError {
    AppError::BadRequest(anyhow::anyhow!(message.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn parse_status(raw: &str) -> Result<InvoiceStatus, AppError> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| bad_request("Invalid status value"))
}

fn parse_required_date(raw: &str, field: &str) -> Result<NaiveDate, AppError> {
    parse_date(raw).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Invalid {}: expected YYYY-MM-DD", field))
    })
}

/// Non-numeric input counts as zero; negative or oversized amounts are refused.
fn parse_amount(value: Option<&Value>, field: &str) -> Result<Decimal, AppError> {
    let amount = parse_numeric(value)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("{} is out of range", field)))?
        .unwrap_or(Decimal::ZERO);
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} cannot be negative",
            field
        )));
    }
    Ok(amount)
}

fn priced_items(raw: &[RawLineItem]) -> Result<Vec<LineItem>, AppError> {
    for (index, item) in raw.iter().enumerate() {
        for (field, value) in [("quantity", &item.quantity), ("price", &item.unit_price)] {
            if parse_numeric(value.as_ref()).is_err() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Item {}: {} is out of range",
                    index + 1,
                    field
                )));
            }
        }
    }

    let items = price_line_items(raw);
    for (index, item) in items.iter().enumerate() {
        if item.quantity < Decimal::ONE {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Item {}: quantity must be at least 1",
                index + 1
            )));
        }
        if item.unit_price.is_sign_negative() && !item.unit_price.is_zero() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Item {}: price cannot be negative",
                index + 1
            )));
        }
    }
    Ok(items)
}

fn page_request(params: &InvoiceListParams) -> PageRequest {
    PageRequest {
        page: params.page.unwrap_or(1).max(1),
        limit: params
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE),
    }
}

/// Fetch a live invoice and check that `user_id` owns it.
async fn load_owned(state: &AppState, id: &str, user_id: &UserId) -> Result<Invoice, AppError> {
    let invoice = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    if !invoice.is_owned_by(&user_id.0) {
        tracing::warn!(invoice_id = %id, "Invoice access denied for non-owner");
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not authorized to access this invoice"
        )));
    }

    Ok(invoice)
}

async fn list(
    state: &AppState,
    owner_id: Option<String>,
    params: InvoiceListParams,
) -> Result<Json<InvoiceListResponse>, AppError> {
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let page = page_request(&params);

    let result = state
        .store
        .list(&InvoiceFilter { owner_id, status }, page)
        .await?;

    Ok(Json(InvoiceListResponse {
        invoices: result
            .invoices
            .into_iter()
            .map(InvoiceResponse::from)
            .collect(),
        pagination: Pagination::new(page.page, page.limit, result.total),
    }))
}

#[tracing::instrument(skip(state, user_id, request), fields(user_id = %user_id.0))]
pub async fn create_invoice(
    State(state): State<AppState>,
    user_id: UserId,
    Json(mut request): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.client_name = non_empty(request.client_name);
    request.client_email = non_empty(request.client_email).map(|e| normalize_email(&e));

    let (Some(client_name), Some(client_email)) =
        (request.client_name.clone(), request.client_email.clone())
    else {
        return Err(bad_request("Please provide all required fields"));
    };
    if request.items.is_empty() {
        return Err(bad_request("Please provide all required fields"));
    }

    let (Some(issue_date), Some(due_date)) = (
        non_empty(request.issue_date.take()),
        non_empty(request.due_date.take()),
    ) else {
        return Err(bad_request("Please provide issue date and due date"));
    };
    let issue_date = parse_required_date(&issue_date, "issue date")?;
    let due_date = parse_required_date(&due_date, "due date")?;

    request.validate()?;

    let status = match non_empty(request.status.take()) {
        Some(raw) => parse_status(&raw)?,
        None => InvoiceStatus::default(),
    };

    let items = priced_items(&request.items)?;
    let tax = parse_amount(request.tax.as_ref(), "Tax")?;
    let discount = parse_amount(request.discount.as_ref(), "Discount")?;
    let totals = compute_totals(&items, tax, discount);

    let draft = InvoiceDraft {
        owner_id: user_id.0,
        client_name,
        client_email,
        client_address: request.client_address.unwrap_or_default(),
        items,
        totals,
        status,
        issue_date,
        due_date,
        notes: request.notes.unwrap_or_default(),
    };

    let invoice = state
        .allocator
        .create_invoice(draft, Utc::now().year())
        .await?;

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(invoice))))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    _user_id: UserId,
    Query(params): Query<InvoiceListParams>,
) -> Result<Json<InvoiceListResponse>, AppError> {
    list(&state, None, params).await
}

pub async fn list_user_invoices(
    State(state): State<AppState>,
    user_id: UserId,
    Query(params): Query<InvoiceListParams>,
) -> Result<Json<InvoiceListResponse>, AppError> {
    list(&state, Some(user_id.0), params).await
}

pub async fn get_invoice(
    State(state): State<AppState>,
    user_id: UserId,
    Path(id): Path<String>,
) -> Result<Json<InvoiceDetailResponse>, AppError> {
    let invoice = load_owned(&state, &id, &user_id).await?;
    let owner = state.profiles.find_profile(&invoice.owner_id).await?;

    Ok(Json(InvoiceDetailResponse {
        invoice: InvoiceResponse::from(invoice),
        owner: owner.map(ProfileResponse::from),
    }))
}

#[tracing::instrument(skip(state, user_id, request), fields(user_id = %user_id.0))]
pub async fn update_invoice(
    State(state): State<AppState>,
    user_id: UserId,
    Path(id): Path<String>,
    Json(mut request): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let mut invoice = load_owned(&state, &id, &user_id).await?;

    request.client_email = non_empty(request.client_email).map(|e| normalize_email(&e));
    request.validate()?;

    if let Some(name) = non_empty(request.client_name) {
        invoice.client_name = name;
    }
    if let Some(email) = request.client_email {
        invoice.client_email = email;
    }
    if let Some(address) = request.client_address {
        invoice.client_address = address;
    }
    if let Some(notes) = request.notes {
        invoice.notes = notes;
    }
    if let Some(raw) = non_empty(request.issue_date) {
        invoice.issue_date = parse_required_date(&raw, "issue date")?;
    }
    if let Some(raw) = non_empty(request.due_date) {
        invoice.due_date = parse_required_date(&raw, "due date")?;
    }
    if let Some(raw) = non_empty(request.status) {
        invoice.status = parse_status(&raw)?;
    }

    if let Some(raw_items) = request.items.filter(|items| !items.is_empty()) {
        invoice.items = priced_items(&raw_items)?;
    }
    let tax = match request.tax {
        Some(value) => parse_amount(Some(&value), "Tax")?,
        None => invoice.totals.tax,
    };
    let discount = match request.discount {
        Some(value) => parse_amount(Some(&value), "Discount")?,
        None => invoice.totals.discount,
    };
    invoice.totals = compute_totals(&invoice.items, tax, discount);
    invoice.updated_at = Utc::now();

    if !state.store.update(&invoice).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    tracing::info!(
        invoice_id = %invoice.id,
        invoice_number = %invoice.invoice_number,
        "Invoice updated"
    );

    Ok(Json(InvoiceResponse::from(invoice)))
}

#[tracing::instrument(skip(state, user_id), fields(user_id = %user_id.0))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    user_id: UserId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = load_owned(&state, &id, &user_id).await?;

    if !state.store.delete(&invoice.id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    tracing::info!(
        invoice_id = %invoice.id,
        invoice_number = %invoice.invoice_number,
        "Invoice deleted"
    );

    Ok(Json(json!({ "message": "Invoice deleted successfully" })))
}

#[tracing::instrument(skip(state, user_id, request), fields(user_id = %user_id.0))]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    user_id: UserId,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let raw = non_empty(request.status).ok_or_else(|| bad_request("Please provide status"))?;
    let status = parse_status(&raw)?;

    load_owned(&state, &id, &user_id).await?;

    let invoice = state
        .store
        .update_status(&id, status, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    tracing::info!(invoice_id = %invoice.id, status = %status, "Invoice status updated");

    Ok(Json(InvoiceResponse::from(invoice)))
}
