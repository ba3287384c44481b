use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Field names follow the remote billing API; the Rust names describe them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(rename = "id_cliente", default)]
    pub customer_id: String,
    #[serde(
        rename = "id_contrato",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub contract_id: Option<String>,
    #[serde(
        rename = "id_contrato_avulso",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub loose_contract_id: Option<String>,
    #[serde(rename = "id_filial", default)]
    pub branch_id: String,
    #[serde(rename = "id_conta", default)]
    pub account_id: String,
    #[serde(rename = "id_carteira_cobranca", default)]
    pub collection_portfolio_id: String,
    #[serde(rename = "id_condicao_pagamento", default)]
    pub payment_condition_id: String,
    #[serde(rename = "data_vencimento")]
    pub due_date: String,
    #[serde(rename = "data_emissao")]
    pub issue_date: String,
    #[serde(rename = "valor")]
    pub amount: String,
    pub status: InvoiceStatus,
    #[serde(
        rename = "pagamento_data",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_date: Option<String>,
}

impl Invoice {
    pub fn has_contract(&self) -> bool {
        self.contract_id.is_some() || self.loose_contract_id.is_some()
    }

    /// Contract reference sent to the wizard; the regular contract wins.
    pub fn contract_reference(&self) -> String {
        self.contract_id
            .clone()
            .or_else(|| self.loose_contract_id.clone())
            .unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        self.status == InvoiceStatus::Open
    }

    /// Remote ids are numeric strings; anything else sorts last.
    pub fn numeric_id(&self) -> i64 {
        self.id.trim().parse().unwrap_or(i64::MIN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvoiceStatus {
    Open,
    Paid,
    PartiallyPaid,
    Cancelled,
    Other(String),
}

impl InvoiceStatus {
    pub fn code(&self) -> &str {
        match self {
            InvoiceStatus::Open => "A",
            InvoiceStatus::Paid => "R",
            InvoiceStatus::PartiallyPaid => "P",
            InvoiceStatus::Cancelled => "C",
            InvoiceStatus::Other(code) => code,
        }
    }
}

impl From<String> for InvoiceStatus {
    fn from(code: String) -> Self {
        match code.trim() {
            "A" => InvoiceStatus::Open,
            "R" => InvoiceStatus::Paid,
            "P" => InvoiceStatus::PartiallyPaid,
            "C" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Other(code),
        }
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        status.code().to_string()
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePage {
    #[serde(rename = "registros", default)]
    pub records: Vec<Invoice>,
}

/// One entry of the `grid_param` filter list.
#[derive(Debug, Clone, Serialize)]
pub struct GridFilter {
    #[serde(rename = "TB")]
    pub field: &'static str,
    #[serde(rename = "OP")]
    pub operator: &'static str,
    #[serde(rename = "P")]
    pub value: String,
}

impl GridFilter {
    pub fn equals(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            operator: "=",
            value: value.into(),
        }
    }
}

/// Envelope every wizard call answers with; `type = "error"` is a rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteAck {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

impl RemoteAck {
    pub fn is_error(&self) -> bool {
        self.kind.eq_ignore_ascii_case("error")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenegotiationStarted {
    #[serde(rename = "id_renegociacao", deserialize_with = "number_or_string")]
    pub renegotiation_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterestAndPenalty {
    #[serde(rename = "totalFineAndFess", default)]
    pub total_fine_and_fees: String,
    #[serde(rename = "dateExpiration", default)]
    pub expiration_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Flag {
    #[serde(rename = "S")]
    Yes,
    #[serde(rename = "N")]
    No,
}

/// The full renegotiation record. The wizard does not merge partial updates,
/// so every write sends this struct whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenegotiationFields {
    #[serde(rename = "id_filial")]
    pub branch_id: String,
    #[serde(rename = "id_conta")]
    pub account_id: String,
    #[serde(rename = "id_cliente")]
    pub customer_id: String,
    #[serde(rename = "data_emissao")]
    pub issue_date: String,
    #[serde(rename = "previsao")]
    pub forecast: Flag,
    #[serde(rename = "id_carteira_cobranca")]
    pub collection_portfolio_id: String,
    #[serde(rename = "id_condicao_pagamento")]
    pub payment_condition_id: String,
    #[serde(rename = "vendedor_renegociacao")]
    pub seller: String,
    #[serde(rename = "contrato_renegociacao")]
    pub contract: String,
    #[serde(rename = "data_vencimento")]
    pub due_date: String,
    #[serde(rename = "valor_parcelas")]
    pub parcel_amount: String,
    #[serde(rename = "valor_acrescimos")]
    pub additions_amount: String,
    #[serde(rename = "valor_descontos")]
    pub discounts_amount: String,
    #[serde(rename = "valor_total")]
    pub total_amount: String,
    #[serde(rename = "valor_renegociado")]
    pub renegotiated_amount: String,
    #[serde(rename = "acre_juros_multa")]
    pub interest_and_penalty: String,
    #[serde(rename = "valor_total_pagar")]
    pub total_payable: String,
    pub status: InvoiceStatus,
    #[serde(rename = "data_finalizada")]
    pub finalized_on: String,
    #[serde(rename = "finalizar")]
    pub finalize: Flag,
}

impl RenegotiationFields {
    /// Draft for one invoice: its own amount as parcel and total, no charges yet.
    pub fn draft(target: &Invoice, issue_date: String, new_due_date: &str) -> Self {
        Self {
            branch_id: target.branch_id.clone(),
            account_id: target.account_id.clone(),
            customer_id: target.customer_id.clone(),
            issue_date,
            forecast: Flag::Yes,
            collection_portfolio_id: target.collection_portfolio_id.clone(),
            payment_condition_id: target.payment_condition_id.clone(),
            seller: String::new(),
            contract: target.contract_reference(),
            due_date: new_due_date.to_string(),
            parcel_amount: target.amount.clone(),
            additions_amount: super::amount::ZERO_AMOUNT.to_string(),
            discounts_amount: super::amount::ZERO_AMOUNT.to_string(),
            total_amount: target.amount.clone(),
            renegotiated_amount: target.amount.clone(),
            interest_and_penalty: String::new(),
            total_payable: target.amount.clone(),
            status: InvoiceStatus::Open,
            finalized_on: String::new(),
            finalize: Flag::No,
        }
    }

    /// Folds a calculated fine into every amount the wizard checks.
    pub fn apply_charge(&mut self, charge: &str, charged_total: String) {
        self.interest_and_penalty = charge.to_string();
        self.parcel_amount = charged_total.clone();
        self.total_amount = charged_total.clone();
        self.renegotiated_amount = charged_total.clone();
        self.total_payable = charged_total;
    }
}

/// Body of the invoice alteration call used to patch the replacement due date.
#[derive(Debug, Clone, Serialize)]
pub struct DueDateCorrection {
    #[serde(rename = "documento")]
    pub document: String,
    #[serde(rename = "data_emissao")]
    pub issue_date: String,
    #[serde(rename = "data_vencimento")]
    pub due_date: String,
    #[serde(rename = "id_carteira_cobranca")]
    pub collection_portfolio_id: String,
    #[serde(rename = "obs")]
    pub note: String,
    #[serde(rename = "tipo_recebimento")]
    pub receipt_method: String,
    pub status: InvoiceStatus,
    #[serde(rename = "aguardando_confirmacao_pagamento")]
    pub awaiting_payment_confirmation: String,
    #[serde(rename = "nn_boleto")]
    pub bank_slip_number: String,
    #[serde(rename = "pix_txid")]
    pub pix_transaction_id: String,
    #[serde(rename = "libera_periodo")]
    pub release_period: Flag,
    #[serde(rename = "liberado")]
    pub released: Flag,
    #[serde(rename = "titulo_protestado")]
    pub protested: String,
    #[serde(rename = "id_remessa_alteracao")]
    pub batch_change_id: String,
    #[serde(rename = "motivo_alteracao")]
    pub change_reason: String,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty()))
}

fn number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
