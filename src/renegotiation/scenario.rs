use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::billing::dates::{end_of_month, format_date, parse_date, same_month};
use crate::billing::{BillingError, Invoice};

pub const NO_OTHER_OPEN_INVOICE: &str = "no other open invoice on the contract";
pub const PAYMENT_IN_ORDER: &str = "payment correct, no renegotiation needed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioKind {
    /// Paid an invoice due this month while an earlier one is still open.
    PaidCurrentMonth,
    /// Paid an invoice due after the oldest open one.
    PaidLaterInvoice,
}

impl ScenarioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::PaidCurrentMonth => "PAID_CURRENT_MONTH",
            ScenarioKind::PaidLaterInvoice => "PAID_LATER_INVOICE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scenario {
    Required {
        kind: ScenarioKind,
        target: Invoice,
        new_due_date: String,
        description: String,
    },
    NotRequired {
        reason: String,
    },
}

impl Scenario {
    pub fn is_required(&self) -> bool {
        matches!(self, Scenario::Required { .. })
    }

    fn not_required(reason: &str) -> Self {
        Scenario::NotRequired {
            reason: reason.to_string(),
        }
    }
}

/// The current-month rule is checked first and wins whenever it selects an
/// invoice; the later-invoice rule only runs once it has not.
pub fn identify_scenario(
    paid: &Invoice,
    contract_invoices: &[Invoice],
    today: NaiveDate,
) -> Result<Scenario, BillingError> {
    let paid_due = parse_date(&paid.due_date)?;

    let mut open = Vec::with_capacity(contract_invoices.len());
    for invoice in contract_invoices {
        if invoice.is_open() && invoice.id != paid.id {
            open.push((parse_date(&invoice.due_date)?, invoice));
        }
    }
    open.sort_by_key(|(due, _)| *due);

    let Some((earliest_due, earliest)) = open.first().copied() else {
        return Ok(Scenario::not_required(NO_OTHER_OPEN_INVOICE));
    };

    for (due, invoice) in &open {
        debug!(
            paid_invoice = %paid.id,
            open_invoice = %invoice.id,
            open_due = %format_date(*due),
            paid_due = %format_date(paid_due),
            "comparing due dates"
        );
    }

    if same_month(paid_due, today) {
        if let Some((overdue_due, overdue)) = open.iter().find(|(due, _)| *due < paid_due) {
            let new_due_date = format_date(end_of_month(paid_due));
            info!(
                paid_invoice = %paid.id,
                target_invoice = %overdue.id,
                new_due_date = %new_due_date,
                "paid current month invoice with an earlier one still open"
            );
            return Ok(Scenario::Required {
                kind: ScenarioKind::PaidCurrentMonth,
                target: (*overdue).clone(),
                description: format!(
                    "customer paid the invoice due {} while the invoice due {} was still open; moving it to {}",
                    paid.due_date,
                    format_date(*overdue_due),
                    new_due_date
                ),
                new_due_date,
            });
        }
    }

    if paid_due > earliest_due {
        info!(
            paid_invoice = %paid.id,
            target_invoice = %earliest.id,
            new_due_date = %paid.due_date,
            "paid a later invoice while an older one is open"
        );
        return Ok(Scenario::Required {
            kind: ScenarioKind::PaidLaterInvoice,
            target: earliest.clone(),
            new_due_date: paid.due_date.clone(),
            description: format!(
                "customer paid the invoice due {} while the invoice due {} was still open",
                paid.due_date, earliest.due_date
            ),
        });
    }

    Ok(Scenario::not_required(PAYMENT_IN_ORDER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::InvoiceStatus;
    use serde_json::json;

    fn invoice(id: &str, due: &str, status: &str) -> Invoice {
        serde_json::from_value(json!({
            "id": id,
            "id_cliente": "1",
            "id_contrato": "10",
            "data_vencimento": due,
            "data_emissao": "01/12/2025",
            "valor": "100.00",
            "status": status,
        }))
        .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        day(2026, 1, 15)
    }

    fn expect_required(scenario: Scenario) -> (ScenarioKind, Invoice, String) {
        match scenario {
            Scenario::Required {
                kind,
                target,
                new_due_date,
                ..
            } => (kind, target, new_due_date),
            other => panic!("expected a required scenario, got {other:?}"),
        }
    }

    #[test]
    fn paying_a_later_invoice_targets_the_oldest_open_one() {
        let paid = invoice("100", "13/02/2026", "R");
        let open = [invoice("101", "13/01/2026", "A")];

        let scenario = identify_scenario(&paid, &open, today()).unwrap();
        let (kind, target, new_due_date) = expect_required(scenario);
        assert_eq!(kind, ScenarioKind::PaidLaterInvoice);
        assert_eq!(target.id, "101");
        assert_eq!(new_due_date, "13/02/2026");
    }

    #[test]
    fn current_month_payment_with_overdue_moves_to_end_of_paid_month() {
        let paid = invoice("100", "20/01/2026", "R");
        let open = [invoice("101", "10/12/2025", "A")];

        let scenario = identify_scenario(&paid, &open, today()).unwrap();
        let (kind, target, new_due_date) = expect_required(scenario);
        assert_eq!(kind, ScenarioKind::PaidCurrentMonth);
        assert_eq!(target.id, "101");
        assert_eq!(new_due_date, "31/01/2026");
    }

    #[test]
    fn current_month_rule_uses_paid_month_not_today() {
        let paid = invoice("100", "05/02/2026", "R");
        let open = [invoice("101", "05/01/2026", "A")];

        let scenario = identify_scenario(&paid, &open, day(2026, 2, 10)).unwrap();
        let (kind, _, new_due_date) = expect_required(scenario);
        assert_eq!(kind, ScenarioKind::PaidCurrentMonth);
        assert_eq!(new_due_date, "28/02/2026");
    }

    #[test]
    fn current_month_rule_picks_the_oldest_overdue_invoice() {
        let paid = invoice("100", "20/01/2026", "R");
        let open = [
            invoice("103", "25/01/2026", "A"),
            invoice("102", "10/12/2025", "A"),
            invoice("101", "10/11/2025", "A"),
        ];

        let scenario = identify_scenario(&paid, &open, today()).unwrap();
        let (kind, target, _) = expect_required(scenario);
        assert_eq!(kind, ScenarioKind::PaidCurrentMonth);
        assert_eq!(target.id, "101");
    }

    #[test]
    fn future_open_invoice_needs_nothing() {
        let paid = invoice("100", "13/01/2026", "R");
        let open = [invoice("101", "13/02/2026", "A")];

        let scenario = identify_scenario(&paid, &open, today()).unwrap();
        assert_eq!(
            scenario,
            Scenario::NotRequired {
                reason: PAYMENT_IN_ORDER.to_string()
            }
        );
    }

    #[test]
    fn no_open_invoices_needs_nothing() {
        let paid = invoice("100", "13/01/2026", "R");

        let scenario = identify_scenario(&paid, &[], today()).unwrap();
        match scenario {
            Scenario::NotRequired { reason } => assert!(reason.contains("no other open invoice")),
            other => panic!("unexpected scenario {other:?}"),
        }
    }

    #[test]
    fn closed_invoices_and_the_paid_one_are_ignored() {
        let paid = invoice("100", "13/02/2026", "R");
        let mut same_id = invoice("100", "13/01/2026", "A");
        same_id.status = InvoiceStatus::Open;
        let open = [invoice("101", "13/01/2026", "P"), same_id];

        let scenario = identify_scenario(&paid, &open, today()).unwrap();
        assert!(!scenario.is_required());
    }

    #[test]
    fn mixed_date_shapes_compare_by_calendar_day() {
        let paid = invoice("100", "2026-02-13 00:00:00", "R");
        let open = [invoice("101", "2026-01-13", "A")];

        let scenario = identify_scenario(&paid, &open, today()).unwrap();
        let (kind, _, new_due_date) = expect_required(scenario);
        assert_eq!(kind, ScenarioKind::PaidLaterInvoice);
        assert_eq!(new_due_date, "2026-02-13 00:00:00");
    }

    #[test]
    fn malformed_due_date_is_an_error() {
        let paid = invoice("100", "13-02-2026", "R");
        let open = [invoice("101", "13/01/2026", "A")];

        let err = identify_scenario(&paid, &open, today()).unwrap_err();
        assert!(matches!(err, BillingError::InvalidDateFormat(_)));
    }
}
