// Hourly ELT: read artifact, normalize, stage, transform, reconcile

pub mod normalize;
pub mod orchestrator;
pub mod reconcile;
pub mod source;
pub mod staging;
pub mod transform;
pub mod warehouse;

pub use orchestrator::{PipelineOrchestrator, RunFailure, RunOutcome, RunState};
pub use reconcile::{FlowStats, ReconciliationReporter};
pub use staging::{LoadOutcome, StagingLoader};
pub use transform::{DbtCommandEngine, TransformEngine};
pub use warehouse::Warehouse;
