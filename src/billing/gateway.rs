use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{Invoice, InterestAndPenalty, RenegotiationFields};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("empty date")]
    EmptyDate,
    #[error("invalid date format: {0}")]
    InvalidDateFormat(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("{operation} failed: {cause}")]
    RemoteCallFailed {
        operation: &'static str,
        cause: String,
    },
    #[error(
        "replacement invoice for renegotiation {renegotiation_id} not found after {attempts} attempts"
    )]
    ReplacementNotFound {
        renegotiation_id: i64,
        attempts: u32,
    },
    #[error("no open invoice found on the contract after renegotiation")]
    NoReplacementInvoice,
    #[error("a contract or loose contract id is required")]
    MissingContract,
    #[error("invoice {0} not found")]
    InvoiceNotFound(String),
}

impl BillingError {
    pub fn remote(operation: &'static str, cause: impl ToString) -> Self {
        BillingError::RemoteCallFailed {
            operation,
            cause: cause.to_string(),
        }
    }
}

/// Bounded polling budget for the asynchronously created replacement invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplacementPolling {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ReplacementPolling {
    fn default() -> Self {
        Self {
            attempts: 8,
            delay: Duration::from_millis(2000),
        }
    }
}

// key: billing-gateway -> remote billing operations

#[async_trait]
pub trait BillingGateway: Send + Sync {
    async fn find_invoices_paid_on(&self, date: &str) -> Result<Vec<Invoice>, BillingError>;

    /// Open invoices of a contract, oldest due date first.
    async fn find_open_invoices_for_contract(
        &self,
        contract_id: Option<&str>,
        loose_contract_id: Option<&str>,
    ) -> Result<Vec<Invoice>, BillingError>;

    async fn find_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, BillingError>;

    async fn begin_renegotiation(&self, invoice_ids: &[String]) -> Result<i64, BillingError>;

    /// Intermediate save; always sent with `finalizar = N`.
    async fn update_renegotiation(
        &self,
        renegotiation_id: i64,
        fields: &RenegotiationFields,
    ) -> Result<(), BillingError>;

    async fn compute_interest_and_penalty(
        &self,
        collection_portfolio_id: &str,
        payment_condition_id: &str,
        renegotiation_id: i64,
    ) -> Result<InterestAndPenalty, BillingError>;

    /// Resends the full field set with `finalizar = S` and `finalized_on`.
    async fn finalize_renegotiation(
        &self,
        renegotiation_id: i64,
        fields: &RenegotiationFields,
        finalized_on: NaiveDate,
    ) -> Result<(), BillingError>;

    async fn find_replacement_invoice(
        &self,
        renegotiation_id: i64,
        polling: ReplacementPolling,
    ) -> Result<Invoice, BillingError>;

    async fn correct_due_date(
        &self,
        invoice_id: &str,
        reference: &Invoice,
        new_due_date: &str,
    ) -> Result<(), BillingError>;

    async fn generate_document(&self, invoice_id: &str) -> Result<Value, BillingError>;
}

/// Polls `fetch` until it lists an open invoice or the budget runs out.
///
/// A failed fetch is retried after `delay` unless it was the last attempt, in
/// which case its error is returned as is.
pub async fn poll_replacement<F, Fut>(
    renegotiation_id: i64,
    polling: ReplacementPolling,
    mut fetch: F,
) -> Result<Invoice, BillingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Invoice>, BillingError>>,
{
    for attempt in 1..=polling.attempts {
        match fetch().await {
            Ok(invoices) => {
                if let Some(found) = invoices.into_iter().find(Invoice::is_open) {
                    info!(
                        renegotiation_id,
                        invoice_id = %found.id,
                        attempt,
                        attempts = polling.attempts,
                        "replacement invoice found"
                    );
                    return Ok(found);
                }
                debug!(
                    renegotiation_id,
                    attempt,
                    attempts = polling.attempts,
                    "replacement invoice not created yet"
                );
            }
            Err(err) => {
                if attempt == polling.attempts {
                    return Err(err);
                }
                warn!(?err, renegotiation_id, attempt, "replacement lookup failed");
            }
        }

        if attempt < polling.attempts {
            tokio::time::sleep(polling.delay).await;
        }
    }

    Err(BillingError::ReplacementNotFound {
        renegotiation_id,
        attempts: polling.attempts,
    })
}
