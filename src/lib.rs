pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Cli;

pub use adapters::{JsonFileStore, MemoryStore};
pub use config::QuotaConfig;
pub use core::{
    Admission, AdmissionGate, AdmissionRequest, AdmitTicket, DemoIdentity, Gated, LeadCapture,
    LeadOutcome, LeadTrigger, LimitInfo, PlanPolicy, QuotaEngine, UsageLedger, Work,
};
pub use domain::model::{
    Limit, LeadRecord, LeadSource, LeadStatus, Period, Plan, Tool, UsageCheck, UserProfile,
};
pub use utils::error::{QuotaError, Result};
