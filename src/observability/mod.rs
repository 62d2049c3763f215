pub mod metrics;
pub mod push;
