pub mod amount;
pub mod client;
pub mod dates;
pub mod gateway;
pub mod models;

pub use client::IxcBillingGateway;
pub use dates::{format_date, normalize_date, parse_date};
pub use gateway::{poll_replacement, BillingError, BillingGateway, ReplacementPolling};
pub use models::{
    Flag, InterestAndPenalty, Invoice, InvoiceStatus, RenegotiationFields,
};
