//! churn_elt: hourly load of the telecom churn customer file into staging,
//! dbt transform into the reporting mart, and raw-vs-mart reconciliation.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod types;

pub use config::Config;
pub use error::{PipelineError, Result};
