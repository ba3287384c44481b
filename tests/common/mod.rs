#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use renegotiator::billing::{
    BillingError, BillingGateway, InterestAndPenalty, Invoice, RenegotiationFields,
    ReplacementPolling,
};
use serde_json::{json, Value};

// key: fake-billing-gateway -> scripted in-memory billing API for engine and route tests

pub fn invoice(id: &str, contract: Option<&str>, due: &str, status: &str, amount: &str) -> Invoice {
    serde_json::from_value(json!({
        "id": id,
        "id_cliente": "77",
        "id_contrato": contract.unwrap_or(""),
        "id_contrato_avulso": "",
        "id_filial": "1",
        "id_conta": "286",
        "id_carteira_cobranca": "3",
        "id_condicao_pagamento": "1",
        "data_vencimento": due,
        "data_emissao": "13/12/2025",
        "valor": amount,
        "status": status
    }))
    .unwrap()
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
}

#[derive(Default)]
pub struct FakeGateway {
    pub paid: Vec<Invoice>,
    pub contracts: HashMap<String, Vec<Invoice>>,
    pub fine: String,
    pub replacement: Option<Invoice>,
    pub fail_contract: Option<String>,
    pub fail_listing: bool,
    pub calls: Mutex<Vec<String>>,
    pub drafts: Mutex<Vec<RenegotiationFields>>,
    pub finalized: Mutex<Vec<(RenegotiationFields, NaiveDate)>>,
    pub corrections: Mutex<Vec<(String, String, String)>>,
    next_id: AtomicI64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(643),
            ..Default::default()
        }
    }

    pub fn with_contract(mut self, contract: &str, invoices: Vec<Invoice>) -> Self {
        self.contracts.insert(contract.to_string(), invoices);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BillingGateway for FakeGateway {
    async fn find_invoices_paid_on(&self, date: &str) -> Result<Vec<Invoice>, BillingError> {
        self.record(format!("find_invoices_paid_on:{date}"));
        if self.fail_listing {
            return Err(BillingError::remote("find_invoices_paid_on", "HTTP 502: gateway"));
        }
        Ok(self.paid.clone())
    }

    async fn find_open_invoices_for_contract(
        &self,
        contract_id: Option<&str>,
        loose_contract_id: Option<&str>,
    ) -> Result<Vec<Invoice>, BillingError> {
        let key = contract_id
            .or(loose_contract_id)
            .ok_or(BillingError::MissingContract)?;
        self.record(format!("find_open_invoices_for_contract:{key}"));
        if self.fail_contract.as_deref() == Some(key) {
            return Err(BillingError::remote(
                "find_open_invoices_for_contract",
                "HTTP 500: boom",
            ));
        }
        Ok(self.contracts.get(key).cloned().unwrap_or_default())
    }

    async fn find_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, BillingError> {
        self.record(format!("find_invoice:{invoice_id}"));
        Ok(self
            .contracts
            .values()
            .flatten()
            .find(|invoice| invoice.id == invoice_id)
            .cloned())
    }

    async fn begin_renegotiation(&self, invoice_ids: &[String]) -> Result<i64, BillingError> {
        self.record(format!("begin_renegotiation:{}", invoice_ids.join(",")));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn update_renegotiation(
        &self,
        renegotiation_id: i64,
        fields: &RenegotiationFields,
    ) -> Result<(), BillingError> {
        self.record(format!("update_renegotiation:{renegotiation_id}"));
        self.drafts.lock().unwrap().push(fields.clone());
        Ok(())
    }

    async fn compute_interest_and_penalty(
        &self,
        collection_portfolio_id: &str,
        payment_condition_id: &str,
        renegotiation_id: i64,
    ) -> Result<InterestAndPenalty, BillingError> {
        self.record(format!(
            "compute_interest_and_penalty:{collection_portfolio_id}:{payment_condition_id}:{renegotiation_id}"
        ));
        Ok(serde_json::from_value(json!({
            "totalFineAndFess": self.fine,
            "type": "success"
        }))
        .unwrap())
    }

    async fn finalize_renegotiation(
        &self,
        renegotiation_id: i64,
        fields: &RenegotiationFields,
        finalized_on: NaiveDate,
    ) -> Result<(), BillingError> {
        self.record(format!("finalize_renegotiation:{renegotiation_id}"));
        self.finalized
            .lock()
            .unwrap()
            .push((fields.clone(), finalized_on));
        Ok(())
    }

    async fn find_replacement_invoice(
        &self,
        renegotiation_id: i64,
        polling: ReplacementPolling,
    ) -> Result<Invoice, BillingError> {
        self.record(format!("find_replacement_invoice:{renegotiation_id}"));
        self.replacement
            .clone()
            .ok_or(BillingError::ReplacementNotFound {
                renegotiation_id,
                attempts: polling.attempts,
            })
    }

    async fn correct_due_date(
        &self,
        invoice_id: &str,
        reference: &Invoice,
        new_due_date: &str,
    ) -> Result<(), BillingError> {
        self.record(format!("correct_due_date:{invoice_id}"));
        self.corrections.lock().unwrap().push((
            invoice_id.to_string(),
            reference.id.clone(),
            new_due_date.to_string(),
        ));
        Ok(())
    }

    async fn generate_document(&self, invoice_id: &str) -> Result<Value, BillingError> {
        self.record(format!("generate_document:{invoice_id}"));
        Ok(json!({ "boleto": format!("pdf-{invoice_id}") }))
    }
}
