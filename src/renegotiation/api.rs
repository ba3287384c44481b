use std::sync::Arc;

use axum::{body::Bytes, extract::Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::billing::dates::{format_date, normalize_date};
use crate::billing::BillingError;
use crate::error::{AppError, AppResult};

use super::engine::{
    BatchResult, BatchSummary, RenegotiatedInvoice, RenegotiationEngine, RenegotiationOutcome,
};

pub async fn process_renegotiations(
    Extension(engine): Extension<Arc<RenegotiationEngine>>,
    body: Bytes,
) -> AppResult<Json<ProcessResponse>> {
    let requested = parse_process_request(&body)?
        .date
        .filter(|date| !date.trim().is_empty());
    let date = match requested {
        Some(date) => normalize_date(&date)?,
        None => format_date(chrono::Local::now().date_naive()),
    };

    let results = engine.process_paid_invoices(&date).await?;
    let summary = BatchSummary::from_results(&results);

    let mut renegotiated = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            BatchResult::Renegotiated(entry) => renegotiated.push(entry),
            failed @ BatchResult::Failed(_) => errors.push(failed),
        }
    }

    Ok(Json(ProcessResponse {
        success: true,
        date,
        summary,
        renegotiated,
        errors: (!errors.is_empty()).then_some(errors),
    }))
}

pub async fn list_contract_invoices(
    Extension(engine): Extension<Arc<RenegotiationEngine>>,
    Json(payload): Json<ContractInvoicesRequest>,
) -> AppResult<Json<ContractInvoicesResponse>> {
    let contract_id = non_blank(payload.contract_id);
    let loose_contract_id = non_blank(payload.loose_contract_id);
    if contract_id.is_none() && loose_contract_id.is_none() {
        return Err(AppError::BadRequest(
            "contract_id or loose_contract_id is required".to_string(),
        ));
    }

    let invoices = engine
        .gateway()
        .find_open_invoices_for_contract(contract_id.as_deref(), loose_contract_id.as_deref())
        .await?;

    let invoices = invoices
        .into_iter()
        .map(|invoice| ContractInvoiceSummary {
            id: invoice.id,
            due_date: invoice.due_date,
            amount: invoice.amount,
            status: invoice.status.code().to_string(),
        })
        .collect::<Vec<_>>();

    Ok(Json(ContractInvoicesResponse {
        success: true,
        total: invoices.len(),
        invoices,
    }))
}

pub async fn renegotiate_invoice(
    Extension(engine): Extension<Arc<RenegotiationEngine>>,
    Json(payload): Json<RenegotiateInvoiceRequest>,
) -> AppResult<Json<RenegotiateInvoiceResponse>> {
    let (Some(invoice_id), Some(new_due_date)) = (
        non_blank(payload.invoice_id),
        non_blank(payload.new_due_date),
    ) else {
        return Err(AppError::BadRequest(
            "invoice_id and new_due_date are required".to_string(),
        ));
    };
    let new_due_date = normalize_date(&new_due_date)?;

    let invoice = engine
        .gateway()
        .find_invoice(&invoice_id)
        .await?
        .ok_or_else(|| BillingError::InvoiceNotFound(invoice_id.clone()))?;

    info!(%invoice_id, %new_due_date, "manual renegotiation requested");
    let outcome = engine.execute_renegotiation(&invoice, &new_due_date).await?;

    Ok(Json(RenegotiateInvoiceResponse {
        success: true,
        outcome,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn describe() -> Json<Value> {
    Json(json!({
        "name": "invoice renegotiation service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /api/renegotiations/process": {
                "description": "renegotiates every mis-applied payment made on a date",
                "body": { "date": "DD/MM/YYYY (optional, defaults to today)" }
            },
            "POST /api/contracts/open-invoices": {
                "description": "lists the open invoices of a contract",
                "body": { "contract_id": "123", "loose_contract_id": "456" }
            },
            "POST /api/invoices/renegotiate": {
                "description": "renegotiates one invoice to a new due date",
                "body": { "invoice_id": "123456", "new_due_date": "31/01/2026" }
            },
            "GET /health": { "description": "liveness probe" },
            "GET /metrics": { "description": "prometheus metrics" }
        }
    }))
}

/// An empty body means "today"; anything else has to be a valid request.
fn parse_process_request(body: &[u8]) -> AppResult<ProcessRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ProcessRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::BadRequest(format!("invalid request body: {err}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub date: String,
    pub summary: BatchSummary,
    pub renegotiated: Vec<RenegotiatedInvoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<BatchResult>>,
}

#[derive(Debug, Deserialize)]
pub struct ContractInvoicesRequest {
    #[serde(default)]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub loose_contract_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContractInvoiceSummary {
    pub id: String,
    pub due_date: String,
    pub amount: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ContractInvoicesResponse {
    pub success: bool,
    pub total: usize,
    pub invoices: Vec<ContractInvoiceSummary>,
}

#[derive(Debug, Deserialize)]
pub struct RenegotiateInvoiceRequest {
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub new_due_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RenegotiateInvoiceResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: RenegotiationOutcome,
}
