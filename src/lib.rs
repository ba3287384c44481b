pub mod billing;
pub mod error;
pub mod renegotiation;
pub mod routes;

mod config;

pub use config::{
    BILLING_API_BASE_URL, BILLING_API_TIMEOUT, BILLING_API_TOKEN, BIND_ADDRESS, BIND_PORT,
    REPLACEMENT_POLLING,
};
