use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::config::TransformConfig;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;

/// The external engine that turns staging rows into the reporting mart.
///
/// Opaque pass/fail: any error ends the run.
#[async_trait]
pub trait TransformEngine: Send + Sync {
    async fn run(&self) -> Result<()>;

    fn name(&self) -> &str;
}

/// Runs dbt subcommands (`dbt test`, then `dbt run` by default) against the
/// configured project.
pub struct DbtCommandEngine {
    program: String,
    project_dir: PathBuf,
    profiles_dir: PathBuf,
    profile: String,
    commands: Vec<String>,
}

impl DbtCommandEngine {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            program: config.program.clone(),
            project_dir: config.project_dir.clone(),
            profiles_dir: config.profiles_dir.clone(),
            profile: config.profile.clone(),
            commands: config.commands.clone(),
        }
    }

    fn args_for(&self, subcommand: &str) -> Vec<String> {
        let mut args: Vec<String> = subcommand.split_whitespace().map(str::to_string).collect();
        args.extend([
            "--project-dir".to_string(),
            self.project_dir.to_string_lossy().into_owned(),
            "--profiles-dir".to_string(),
            self.profiles_dir.to_string_lossy().into_owned(),
            "--profile".to_string(),
            self.profile.clone(),
        ]);
        args
    }

    async fn run_one(&self, subcommand: &str) -> Result<()> {
        let args = self.args_for(subcommand);
        info!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.project_dir)
            .output()
            .await
            .map_err(|e| PipelineError::Transform {
                message: format!("failed to start '{}': {}", self.program, e),
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(target: "churn_elt::dbt", "{}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            return Err(PipelineError::Transform {
                message: format!(
                    "'{} {}' exited with {}: {}",
                    self.program,
                    subcommand,
                    output.status,
                    tail.join("\n")
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TransformEngine for DbtCommandEngine {
    #[instrument(skip(self), fields(engine = %self.program))]
    async fn run(&self) -> Result<()> {
        let started = Instant::now();
        for subcommand in &self.commands {
            if let Err(e) = self.run_one(subcommand).await {
                metrics::transform::failed();
                return Err(e);
            }
        }
        metrics::transform::succeeded(started.elapsed().as_secs_f64());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(program: &str, commands: &[&str]) -> DbtCommandEngine {
        DbtCommandEngine::new(&TransformConfig {
            program: program.to_string(),
            project_dir: std::env::temp_dir(),
            profiles_dir: PathBuf::from("profiles"),
            profile: "elt_pipeline".to_string(),
            commands: commands.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn builds_dbt_arguments() {
        let e = engine("dbt", &["run"]);
        let args = e.args_for("run --select fact_customer_telcome");
        assert_eq!(&args[..3], &["run", "--select", "fact_customer_telcome"]);
        assert!(args.windows(2).any(|w| w == ["--profile", "elt_pipeline"]));
        assert!(args.windows(2).any(|w| w == ["--profiles-dir", "profiles"]));
    }

    #[tokio::test]
    async fn missing_program_is_a_transform_failure() {
        let e = engine("definitely-not-an-installed-dbt-binary", &["run"]);
        let err = e.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_a_transform_failure() {
        // `false` ignores its arguments and exits 1
        let e = engine("false", &["run"]);
        assert!(e.run().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_succeeds() {
        let e = engine("true", &["test", "run"]);
        assert!(e.run().await.is_ok());
    }
}
