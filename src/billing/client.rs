use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::dates::{format_date, normalize_date};
use super::gateway::{poll_replacement, BillingError, BillingGateway, ReplacementPolling};
use super::models::{
    DueDateCorrection, Flag, GridFilter, InterestAndPenalty, Invoice, InvoicePage, InvoiceStatus,
    RemoteAck, RenegotiationFields, RenegotiationStarted,
};

const LIST_HEADER: &str = "ixcsoft";
const LIST_HEADER_VALUE: &str = "listar";
const PAGE_SIZE: &str = "1000";
const REPLACEMENT_PAGE_SIZE: &str = "20";

/// Query body shared by every invoice listing.
#[derive(Debug, Serialize)]
struct ListQuery {
    qtype: &'static str,
    query: &'static str,
    oper: &'static str,
    page: &'static str,
    rp: &'static str,
    sortname: &'static str,
    sortorder: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    grid_param: Option<String>,
}

impl ListQuery {
    fn all(sortname: &'static str, sortorder: &'static str) -> Self {
        Self {
            qtype: "fn_areceber.id",
            query: "0",
            oper: ">",
            page: "1",
            rp: PAGE_SIZE,
            sortname,
            sortorder,
            grid_param: None,
        }
    }

    fn filtered(mut self, filters: &[GridFilter]) -> Result<Self, BillingError> {
        let encoded = serde_json::to_string(filters)
            .map_err(|err| BillingError::remote("encode_grid_filter", err))?;
        self.grid_param = Some(encoded);
        Ok(self)
    }
}

pub struct IxcBillingGateway {
    client: Client,
    base_url: String,
}

impl IxcBillingGateway {
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, BillingError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut credential = HeaderValue::from_str(token)
            .map_err(|err| BillingError::remote("build_client", err))?;
        credential.set_sensitive(true);
        headers.insert(AUTHORIZATION, credential);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| BillingError::remote("build_client", err))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<String, BillingError> {
        let response = request.send().await.map_err(|err| {
            error!(?err, operation, "billing service unreachable");
            BillingError::remote(operation, err)
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| BillingError::remote(operation, err))?;
        if !status.is_success() {
            error!(operation, %status, body = %body, "billing service rejected request");
            return Err(BillingError::remote(operation, format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, BillingError> {
        let body = self.send(operation, request).await?;
        decode(operation, &body)
    }

    async fn send_ack(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<(), BillingError> {
        let body = self.send(operation, request).await?;
        check_ack(operation, &body)
    }

    /// Error envelopes carry none of the payload fields; check them first.
    async fn send_acked_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, BillingError> {
        let body = self.send(operation, request).await?;
        check_ack(operation, &body)?;
        decode(operation, &body)
    }

    async fn list_invoices(
        &self,
        operation: &'static str,
        query: &ListQuery,
    ) -> Result<Vec<Invoice>, BillingError> {
        let request = self
            .client
            .post(self.endpoint("fn_areceber"))
            .header(LIST_HEADER, LIST_HEADER_VALUE)
            .json(query);
        let page: InvoicePage = self.send_json(operation, request).await?;
        Ok(page.records)
    }

    async fn write_renegotiation(
        &self,
        operation: &'static str,
        renegotiation_id: i64,
        fields: &RenegotiationFields,
    ) -> Result<(), BillingError> {
        let request = self
            .client
            .put(self.endpoint(&format!("fn_renegociacao_wiz/{renegotiation_id}")))
            .json(fields);
        self.send_ack(operation, request).await
    }
}

fn decode<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T, BillingError> {
    serde_json::from_str(body).map_err(|err| {
        error!(?err, operation, body = %body, "unexpected billing service response");
        BillingError::remote(operation, format!("unexpected response: {err}"))
    })
}

fn check_ack(operation: &'static str, body: &str) -> Result<(), BillingError> {
    let ack: RemoteAck = serde_json::from_str(body).unwrap_or_default();
    if ack.is_error() {
        error!(operation, message = %ack.message, "billing service reported an error");
        return Err(BillingError::remote(operation, &ack.message));
    }
    Ok(())
}

/// Stamps the write mode onto a copy of the field set with normalized dates.
fn stamped(
    fields: &RenegotiationFields,
    finalize: Flag,
    finalized_on: String,
) -> Result<RenegotiationFields, BillingError> {
    let mut payload = fields.clone();
    payload.issue_date = normalize_date(&fields.issue_date)?;
    payload.due_date = normalize_date(&fields.due_date)?;
    payload.status = InvoiceStatus::Open;
    payload.finalize = finalize;
    payload.finalized_on = finalized_on;
    Ok(payload)
}

#[async_trait]
impl BillingGateway for IxcBillingGateway {
    async fn find_invoices_paid_on(&self, date: &str) -> Result<Vec<Invoice>, BillingError> {
        let filters = [GridFilter::equals(
            "fn_areceber.pagamento_data",
            normalize_date(date)?,
        )];
        let query = ListQuery::all("fn_areceber.id", "desc").filtered(&filters)?;
        self.list_invoices("find_invoices_paid_on", &query).await
    }

    async fn find_open_invoices_for_contract(
        &self,
        contract_id: Option<&str>,
        loose_contract_id: Option<&str>,
    ) -> Result<Vec<Invoice>, BillingError> {
        let mut filters = Vec::with_capacity(3);
        if let Some(id) = contract_id.filter(|id| !id.trim().is_empty()) {
            filters.push(GridFilter::equals("fn_areceber.id_contrato", id));
        }
        if let Some(id) = loose_contract_id.filter(|id| !id.trim().is_empty()) {
            filters.push(GridFilter::equals("fn_areceber.id_contrato_avulso", id));
        }
        if filters.is_empty() {
            return Err(BillingError::MissingContract);
        }
        filters.push(GridFilter::equals(
            "fn_areceber.status",
            InvoiceStatus::Open.code(),
        ));

        let query = ListQuery::all("fn_areceber.data_vencimento", "asc").filtered(&filters)?;
        self.list_invoices("find_open_invoices_for_contract", &query)
            .await
    }

    async fn find_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, BillingError> {
        let filters = [GridFilter::equals("fn_areceber.id", invoice_id)];
        let query = ListQuery::all("fn_areceber.id", "desc").filtered(&filters)?;
        let invoices = self.list_invoices("find_invoice", &query).await?;
        Ok(invoices.into_iter().find(|invoice| invoice.id == invoice_id))
    }

    async fn begin_renegotiation(&self, invoice_ids: &[String]) -> Result<i64, BillingError> {
        let request = self
            .client
            .post(self.endpoint("renegociar_selecionados"))
            .json(&json!({ "get_id": invoice_ids.join(",") }));
        let started: RenegotiationStarted = self
            .send_acked_json("begin_renegotiation", request)
            .await?;
        info!(
            renegotiation_id = started.renegotiation_id,
            invoices = %invoice_ids.join(","),
            "renegotiation started"
        );
        Ok(started.renegotiation_id)
    }

    async fn update_renegotiation(
        &self,
        renegotiation_id: i64,
        fields: &RenegotiationFields,
    ) -> Result<(), BillingError> {
        let payload = stamped(fields, Flag::No, String::new())?;
        self.write_renegotiation("update_renegotiation", renegotiation_id, &payload)
            .await?;
        info!(renegotiation_id, due_date = %payload.due_date, "renegotiation draft saved");
        Ok(())
    }

    async fn compute_interest_and_penalty(
        &self,
        collection_portfolio_id: &str,
        payment_condition_id: &str,
        renegotiation_id: i64,
    ) -> Result<InterestAndPenalty, BillingError> {
        let request = self
            .client
            .post(self.endpoint("calcula_juros_multa"))
            .json(&json!({
                "id_carteira_cobranca": collection_portfolio_id,
                "id_condicao_pagamento": payment_condition_id,
                "id": renegotiation_id.to_string(),
            }));
        let computed: InterestAndPenalty = self
            .send_acked_json("compute_interest_and_penalty", request)
            .await?;
        info!(
            renegotiation_id,
            total = %computed.total_fine_and_fees,
            "interest and penalty computed"
        );
        Ok(computed)
    }

    async fn finalize_renegotiation(
        &self,
        renegotiation_id: i64,
        fields: &RenegotiationFields,
        finalized_on: NaiveDate,
    ) -> Result<(), BillingError> {
        let payload = stamped(fields, Flag::Yes, format_date(finalized_on))?;
        self.write_renegotiation("finalize_renegotiation", renegotiation_id, &payload)
            .await?;
        info!(
            renegotiation_id,
            finalized_on = %payload.finalized_on,
            due_date = %payload.due_date,
            "renegotiation finalized"
        );
        Ok(())
    }

    async fn find_replacement_invoice(
        &self,
        renegotiation_id: i64,
        polling: ReplacementPolling,
    ) -> Result<Invoice, BillingError> {
        let query = ListQuery {
            qtype: "fn_areceber.status",
            query: "A",
            oper: "=",
            page: "1",
            rp: REPLACEMENT_PAGE_SIZE,
            sortname: "fn_areceber.id",
            sortorder: "desc",
            grid_param: None,
        };
        poll_replacement(renegotiation_id, polling, || {
            self.list_invoices("find_replacement_invoice", &query)
        })
        .await
    }

    async fn correct_due_date(
        &self,
        invoice_id: &str,
        reference: &Invoice,
        new_due_date: &str,
    ) -> Result<(), BillingError> {
        let due_date = normalize_date(new_due_date)?;
        let original_due_date = normalize_date(&reference.due_date)?;
        let body = DueDateCorrection {
            document: String::new(),
            issue_date: normalize_date(&reference.issue_date)?,
            due_date: due_date.clone(),
            collection_portfolio_id: reference.collection_portfolio_id.clone(),
            note: format!("Boleto de vencimento original {original_due_date}"),
            receipt_method: "Gateway".to_string(),
            status: InvoiceStatus::Open,
            awaiting_payment_confirmation: String::new(),
            bank_slip_number: String::new(),
            pix_transaction_id: String::new(),
            release_period: Flag::Yes,
            released: Flag::Yes,
            protested: String::new(),
            batch_change_id: String::new(),
            change_reason: String::new(),
        };
        let request = self
            .client
            .put(self.endpoint(&format!("fn_areceber_altera/{invoice_id}")))
            .json(&body);
        self.send_ack("correct_due_date", request).await?;
        info!(invoice_id, due_date = %due_date, "replacement due date corrected");
        Ok(())
    }

    async fn generate_document(&self, invoice_id: &str) -> Result<Value, BillingError> {
        let request = self
            .client
            .post(self.endpoint("get_boleto"))
            .json(&json!({
                "boletos": invoice_id,
                "juro": "",
                "multa": "",
                "atualiza_boleto": "",
                "tipo_boleto": "arquivo",
                "base64": "S",
                "layout_impressao": "",
            }));
        let body = self.send("generate_document", request).await?;
        let document = serde_json::from_str(&body).unwrap_or(Value::String(body));
        if let Value::Object(map) = &document {
            if map.get("type").and_then(Value::as_str) == Some("error") {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                return Err(BillingError::remote("generate_document", message));
            }
        }
        info!(invoice_id, "invoice document generated");
        Ok(document)
    }
}
