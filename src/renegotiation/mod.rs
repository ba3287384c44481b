pub mod api;
pub mod engine;
pub mod scenario;

pub use engine::{
    BatchResult, BatchSummary, FailedInvoice, RenegotiatedInvoice, RenegotiationEngine,
    RenegotiationOutcome,
};
pub use scenario::{identify_scenario, Scenario, ScenarioKind};
