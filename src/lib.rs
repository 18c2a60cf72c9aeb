// Access Engine - content access resolution for class and subject subscriptions
// Core library

pub mod config;
pub mod error;
pub mod grants;
pub mod metrics;
pub mod observability;
pub mod service;

pub use access_core as core;

pub use config::AccessConfig;
pub use error::{AccessError, AccessResult, GrantSource};
pub use service::{
    AccessService, AccessSummary, ClassAccessReport, Clock, SubjectAccessReport,
    SubjectTopicsReport,
};
