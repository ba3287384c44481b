use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::billing::amount::{add_amounts, is_charged, ZERO_AMOUNT};
use crate::billing::dates::format_date;
use crate::billing::{BillingError, BillingGateway, Invoice, RenegotiationFields, ReplacementPolling};

use super::scenario::{identify_scenario, Scenario, ScenarioKind};

/// What a completed correction sequence produced.
#[derive(Debug, Clone, Serialize)]
pub struct RenegotiationOutcome {
    pub renegotiation_id: i64,
    pub replacement_invoice_id: String,
    pub interest_and_penalty: String,
    pub document: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenegotiatedInvoice {
    pub scenario: ScenarioKind,
    pub paid_invoice_id: String,
    pub renegotiated_invoice_id: String,
    pub new_due_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loose_contract_id: Option<String>,
    #[serde(flatten)]
    pub outcome: RenegotiationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedInvoice {
    pub original_invoice_id: String,
    pub error: String,
}

/// One entry per paid invoice that needed, or failed while checking for, a
/// correction.
#[derive(Debug, Clone)]
pub enum BatchResult {
    Renegotiated(RenegotiatedInvoice),
    Failed(FailedInvoice),
}

impl Serialize for BatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a, T> {
            success: bool,
            #[serde(flatten)]
            entry: &'a T,
        }

        match self {
            BatchResult::Renegotiated(entry) => Tagged {
                success: true,
                entry,
            }
            .serialize(serializer),
            BatchResult::Failed(entry) => Tagged {
                success: false,
                entry,
            }
            .serialize(serializer),
        }
    }
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchResult::Renegotiated(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total_processed: usize,
    pub total_renegotiated: usize,
    pub total_errors: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[BatchResult]) -> Self {
        let total_renegotiated = results.iter().filter(|r| r.is_success()).count();
        Self {
            total_processed: results.len(),
            total_renegotiated,
            total_errors: results.len() - total_renegotiated,
        }
    }
}

// key: renegotiation-engine -> classify, decide, drive the remote wizard

/// Corrections run strictly one after another; each one mutates a remote
/// renegotiation record that must not interleave with another.
pub struct RenegotiationEngine {
    gateway: Arc<dyn BillingGateway>,
    polling: ReplacementPolling,
}

impl RenegotiationEngine {
    pub fn new(gateway: Arc<dyn BillingGateway>, polling: ReplacementPolling) -> Self {
        Self { gateway, polling }
    }

    pub fn gateway(&self) -> &Arc<dyn BillingGateway> {
        &self.gateway
    }

    pub fn identify_scenario(
        &self,
        paid: &Invoice,
        contract_invoices: &[Invoice],
    ) -> Result<Scenario, BillingError> {
        identify_scenario(paid, contract_invoices, today())
    }

    pub async fn process_paid_invoices(&self, date: &str) -> Result<Vec<BatchResult>, BillingError> {
        self.process_paid_invoices_at(date, today()).await
    }

    /// Fails only when the paid-invoice listing itself fails; per-invoice
    /// errors become [`BatchResult::Failed`] entries.
    pub async fn process_paid_invoices_at(
        &self,
        date: &str,
        today: NaiveDate,
    ) -> Result<Vec<BatchResult>, BillingError> {
        info!(%date, "processing invoices paid on date");
        let paid_invoices = self.gateway.find_invoices_paid_on(date).await?;
        info!(%date, count = paid_invoices.len(), "paid invoices found");

        let mut results = Vec::new();
        for paid in &paid_invoices {
            info!(
                invoice_id = %paid.id,
                due_date = %paid.due_date,
                amount = %paid.amount,
                "analyzing paid invoice"
            );
            match self.analyze_and_correct_at(paid, today).await {
                Ok(Some(renegotiated)) => results.push(BatchResult::Renegotiated(renegotiated)),
                Ok(None) => {}
                Err(err) => {
                    error!(?err, invoice_id = %paid.id, "failed to process paid invoice");
                    results.push(BatchResult::Failed(FailedInvoice {
                        original_invoice_id: paid.id.clone(),
                        error: err.to_string(),
                    }));
                }
            }
        }

        let summary = BatchSummary::from_results(&results);
        info!(
            %date,
            processed = summary.total_processed,
            renegotiated = summary.total_renegotiated,
            errors = summary.total_errors,
            "paid invoice batch finished"
        );
        Ok(results)
    }

    pub async fn analyze_and_correct(
        &self,
        paid: &Invoice,
    ) -> Result<Option<RenegotiatedInvoice>, BillingError> {
        self.analyze_and_correct_at(paid, today()).await
    }

    pub async fn analyze_and_correct_at(
        &self,
        paid: &Invoice,
        today: NaiveDate,
    ) -> Result<Option<RenegotiatedInvoice>, BillingError> {
        if !paid.has_contract() {
            warn!(invoice_id = %paid.id, "paid invoice has no contract");
            return Ok(None);
        }

        let contract_invoices = self
            .gateway
            .find_open_invoices_for_contract(
                paid.contract_id.as_deref(),
                paid.loose_contract_id.as_deref(),
            )
            .await?;
        if contract_invoices.is_empty() {
            info!(invoice_id = %paid.id, "no open invoices on the contract");
            return Ok(None);
        }

        let (kind, target, new_due_date) =
            match identify_scenario(paid, &contract_invoices, today)? {
                Scenario::NotRequired { reason } => {
                    info!(invoice_id = %paid.id, %reason, "no renegotiation needed");
                    return Ok(None);
                }
                Scenario::Required {
                    kind,
                    target,
                    new_due_date,
                    description,
                } => {
                    info!(
                        invoice_id = %paid.id,
                        scenario = kind.as_str(),
                        target_invoice = %target.id,
                        %new_due_date,
                        %description,
                        "renegotiation required"
                    );
                    (kind, target, new_due_date)
                }
            };

        let outcome = self
            .execute_renegotiation_at(&target, &new_due_date, today)
            .await?;

        Ok(Some(RenegotiatedInvoice {
            scenario: kind,
            paid_invoice_id: paid.id.clone(),
            renegotiated_invoice_id: target.id.clone(),
            new_due_date,
            contract_id: paid.contract_id.clone(),
            loose_contract_id: paid.loose_contract_id.clone(),
            outcome,
        }))
    }

    pub async fn execute_renegotiation(
        &self,
        target: &Invoice,
        new_due_date: &str,
    ) -> Result<RenegotiationOutcome, BillingError> {
        self.execute_renegotiation_at(target, new_due_date, today()).await
    }

    /// Runs the seven wizard steps against `target`, in order.
    pub async fn execute_renegotiation_at(
        &self,
        target: &Invoice,
        new_due_date: &str,
        today: NaiveDate,
    ) -> Result<RenegotiationOutcome, BillingError> {
        info!(invoice_id = %target.id, step = 1, "starting renegotiation");
        let renegotiation_id = self
            .gateway
            .begin_renegotiation(&[target.id.clone()])
            .await?;

        info!(renegotiation_id, step = 2, "saving renegotiation draft");
        let mut fields = RenegotiationFields::draft(target, format_date(today), new_due_date);
        self.gateway
            .update_renegotiation(renegotiation_id, &fields)
            .await?;

        info!(renegotiation_id, step = 3, "computing interest and penalty");
        let computed = self
            .gateway
            .compute_interest_and_penalty(
                &target.collection_portfolio_id,
                &target.payment_condition_id,
                renegotiation_id,
            )
            .await?;

        let interest_and_penalty = if is_charged(&computed.total_fine_and_fees) {
            let charge = computed.total_fine_and_fees.trim();
            let charged_total = add_amounts(&target.amount, charge)?;
            info!(
                renegotiation_id,
                step = 4,
                charge,
                total = %charged_total,
                "interest and penalty applied"
            );
            fields.apply_charge(charge, charged_total);
            charge.to_string()
        } else {
            info!(renegotiation_id, step = 4, "no interest or penalty to apply");
            ZERO_AMOUNT.to_string()
        };

        info!(renegotiation_id, step = 5, "finalizing renegotiation");
        self.gateway
            .finalize_renegotiation(renegotiation_id, &fields, today)
            .await?;

        info!(renegotiation_id, step = 6, "resolving replacement invoice");
        let replacement = self.resolve_replacement(renegotiation_id, target).await?;

        info!(
            renegotiation_id,
            step = 7,
            replacement_invoice = %replacement.id,
            "correcting due date and generating document"
        );
        self.gateway
            .correct_due_date(&replacement.id, target, new_due_date)
            .await?;
        let document = self.gateway.generate_document(&replacement.id).await?;

        info!(
            renegotiation_id,
            original_invoice = %target.id,
            replacement_invoice = %replacement.id,
            new_due_date,
            total_payable = %fields.total_payable,
            "renegotiation completed"
        );

        Ok(RenegotiationOutcome {
            renegotiation_id,
            replacement_invoice_id: replacement.id,
            interest_and_penalty,
            document,
        })
    }

    /// Polls for the wizard's replacement, falling back to the newest open
    /// invoice on the target's contract.
    async fn resolve_replacement(
        &self,
        renegotiation_id: i64,
        target: &Invoice,
    ) -> Result<Invoice, BillingError> {
        let err = match self
            .gateway
            .find_replacement_invoice(renegotiation_id, self.polling)
            .await
        {
            Ok(found) => return Ok(found),
            Err(err) => err,
        };

        warn!(
            ?err,
            renegotiation_id,
            "replacement lookup failed; falling back to the newest open contract invoice"
        );
        if !target.has_contract() {
            return Err(BillingError::NoReplacementInvoice);
        }

        let mut contract_invoices = self
            .gateway
            .find_open_invoices_for_contract(
                target.contract_id.as_deref(),
                target.loose_contract_id.as_deref(),
            )
            .await?;
        contract_invoices.sort_by_key(|invoice| std::cmp::Reverse(invoice.numeric_id()));

        let replacement = contract_invoices
            .into_iter()
            .next()
            .ok_or(BillingError::NoReplacementInvoice)?;
        info!(
            renegotiation_id,
            replacement_invoice = %replacement.id,
            "replacement invoice found via contract fallback"
        );
        Ok(replacement)
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
