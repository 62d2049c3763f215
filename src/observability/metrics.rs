//! Metrics for the churn ELT job
//!
//! Every metric name lives in [`MetricName`]; each pipeline phase gets a small
//! module of recording helpers so call sites never spell names by hand.

use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Load
    LoadSkipped,
    LoadArtifactBytes,
    LoadRowsAppended,
    LoadArchived,
    LoadDuration,

    // Normalize
    NormalizeBatches,
    NormalizeRows,

    // Transform
    TransformSuccess,
    TransformFailure,
    TransformDuration,

    // Report
    ReportRawRecords,
    ReportMartRecords,

    // Pipeline
    PipelineRuns,
    PipelineFinished,
    PipelineFailures,
    PipelineDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::LoadSkipped => "churn_elt_load_skipped_total",
            MetricName::LoadArtifactBytes => "churn_elt_load_artifact_bytes",
            MetricName::LoadRowsAppended => "churn_elt_load_rows_appended_total",
            MetricName::LoadArchived => "churn_elt_load_archived_total",
            MetricName::LoadDuration => "churn_elt_load_duration_seconds",

            MetricName::NormalizeBatches => "churn_elt_normalize_batches_total",
            MetricName::NormalizeRows => "churn_elt_normalize_rows_total",

            MetricName::TransformSuccess => "churn_elt_transform_success_total",
            MetricName::TransformFailure => "churn_elt_transform_failure_total",
            MetricName::TransformDuration => "churn_elt_transform_duration_seconds",

            MetricName::ReportRawRecords => "churn_elt_report_raw_records",
            MetricName::ReportMartRecords => "churn_elt_report_mart_records",

            MetricName::PipelineRuns => "churn_elt_pipeline_runs_total",
            MetricName::PipelineFinished => "churn_elt_pipeline_finished_total",
            MetricName::PipelineFailures => "churn_elt_pipeline_failures_total",
            MetricName::PipelineDuration => "churn_elt_pipeline_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder, serving scrapes on `addr` when set.
///
/// Idempotent. Must be called from within a tokio runtime when `addr` is
/// set. Without a call to this the `metrics` macros are no-ops.
pub fn init_metrics(addr: Option<&str>) {
    if HANDLE.get().is_some() {
        return;
    }
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    let listen = addr.and_then(|a| match a.parse::<std::net::SocketAddr>() {
        Ok(sock) => Some(sock),
        Err(e) => {
            warn!("Invalid metrics address '{}': {}; exporter disabled", a, e);
            None
        }
    });

    let handle = match listen {
        Some(sock) => {
            let (recorder, exporter) = match builder.with_http_listener(sock).build() {
                Ok(parts) => parts,
                Err(e) => {
                    warn!("Failed to build Prometheus exporter: {}", e);
                    return;
                }
            };
            let handle = recorder.handle();
            if let Err(e) = ::metrics::set_global_recorder(recorder) {
                warn!("Metrics recorder already installed: {}", e);
                return;
            }
            tokio::spawn(exporter);
            info!("Prometheus exporter listening on http://{}/metrics", sock);
            handle
        }
        None => match builder.install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                return;
            }
        },
    };
    let _ = HANDLE.set(handle);
}

pub mod load {
    use super::MetricName;

    pub fn skipped() {
        ::metrics::counter!(MetricName::LoadSkipped.as_str()).increment(1);
    }

    pub fn artifact_read(bytes: usize) {
        ::metrics::histogram!(MetricName::LoadArtifactBytes.as_str()).record(bytes as f64);
    }

    pub fn rows_appended(rows: usize) {
        ::metrics::counter!(MetricName::LoadRowsAppended.as_str()).increment(rows as u64);
    }

    pub fn archived() {
        ::metrics::counter!(MetricName::LoadArchived.as_str()).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::LoadDuration.as_str()).record(secs);
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn batch_normalized(rows: usize) {
        ::metrics::counter!(MetricName::NormalizeBatches.as_str()).increment(1);
        ::metrics::counter!(MetricName::NormalizeRows.as_str()).increment(rows as u64);
    }
}

pub mod transform {
    use super::MetricName;

    pub fn succeeded(secs: f64) {
        ::metrics::counter!(MetricName::TransformSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::TransformDuration.as_str()).record(secs);
    }

    pub fn failed() {
        ::metrics::counter!(MetricName::TransformFailure.as_str()).increment(1);
    }
}

pub mod report {
    use super::MetricName;

    pub fn recorded(raw: i64, mart: i64) {
        ::metrics::gauge!(MetricName::ReportRawRecords.as_str()).set(raw as f64);
        ::metrics::gauge!(MetricName::ReportMartRecords.as_str()).set(mart as f64);
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn started() {
        ::metrics::counter!(MetricName::PipelineRuns.as_str()).increment(1);
    }

    pub fn finished(state: &'static str, secs: f64) {
        ::metrics::counter!(MetricName::PipelineFinished.as_str(), "state" => state).increment(1);
        ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(secs);
    }

    pub fn failed(stage: &'static str, kind: &'static str) {
        ::metrics::counter!(
            MetricName::PipelineFailures.as_str(),
            "stage" => stage,
            "kind" => kind
        )
        .increment(1);
    }
}
