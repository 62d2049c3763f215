use tracing::{info, warn};

use crate::pipeline::orchestrator::RunState;
use crate::pipeline::reconcile::{DataLossPercentage, FlowStats};

fn parse_percent(s: &str) -> Option<f64> {
    s.trim_end_matches('%').parse().ok()
}

/// Prometheus text body describing one finished run.
pub fn render_run_metrics(state: RunState, stats: Option<&FlowStats>, timestamp_secs: i64) -> String {
    let mut body = format!(
        "# TYPE churn_elt_last_run_timestamp_seconds gauge\n\
         churn_elt_last_run_timestamp_seconds {timestamp_secs}\n\
         # TYPE churn_elt_last_run_state gauge\n\
         churn_elt_last_run_state{{state=\"{state}\"}} 1\n"
    );

    if let Some(stats) = stats {
        let loss = match &stats.data_loss_percentage {
            DataLossPercentage::NoRawRecords => Some(0.0),
            DataLossPercentage::Percent(p) => parse_percent(p),
        };
        body.push_str(&format!(
            "# TYPE churn_elt_raw_record_count gauge\n\
             churn_elt_raw_record_count {}\n\
             # TYPE churn_elt_transformed_record_count gauge\n\
             churn_elt_transformed_record_count {}\n",
            stats.raw_record_count, stats.transformed_record_count
        ));
        if let Some(loss) = loss {
            body.push_str(&format!(
                "# TYPE churn_elt_data_loss_percent gauge\nchurn_elt_data_loss_percent {loss}\n"
            ));
        }
        if let Some(churn) = parse_percent(&stats.calculated_churn_rate) {
            body.push_str(&format!(
                "# TYPE churn_elt_churn_rate_percent gauge\nchurn_elt_churn_rate_percent {churn}\n"
            ));
        }
    }
    body
}

/// Push the run result to a Pushgateway. Failures are logged, never raised:
/// a monitoring outage must not fail the ELT run.
pub async fn push_run_result(base_url: &str, job: &str, state: RunState, stats: Option<&FlowStats>) {
    let push_url = format!("{}/metrics/job/{}", base_url.trim_end_matches('/'), job);
    let body = render_run_metrics(state, stats, chrono::Utc::now().timestamp());

    let client = reqwest::Client::new();
    let res = client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await;

    match res {
        Ok(r) if r.status().is_success() => info!("Pushed run metrics to Pushgateway at {}", push_url),
        Ok(r) => warn!("Pushgateway responded with status {}", r.status().as_u16()),
        Err(e) => warn!("Failed to push metrics to Pushgateway: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_stats_as_gauges() {
        let stats = FlowStats::compute(1000, 950, 0.25);
        let body = render_run_metrics(RunState::Done, Some(&stats), 1_700_000_000);
        assert!(body.contains("churn_elt_last_run_state{state=\"done\"} 1"));
        assert!(body.contains("churn_elt_raw_record_count 1000"));
        assert!(body.contains("churn_elt_data_loss_percent 5"));
        assert!(body.contains("churn_elt_churn_rate_percent 25"));
    }

    #[test]
    fn skipped_run_only_reports_state() {
        let body = render_run_metrics(RunState::Skipped, None, 1);
        assert!(body.contains("state=\"skipped\""));
        assert!(!body.contains("raw_record_count"));
    }
}
