//! Test harness utilities.

use std::path::PathBuf;

use ringi_approval::ApprovalFlow;
use ringi_policy::Policy;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Set up test logging with a specific filter. Safe to call repeatedly.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging at warn level.
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}

/// Policy and flow catalogs written to a temporary directory.
#[derive(Debug)]
pub struct TestCatalog {
    /// Directory holding the files; removed on drop.
    pub dir: TempDir,
    /// Path of `policies.json`.
    pub policies: PathBuf,
    /// Path of `flows.json`.
    pub flows: PathBuf,
}

impl TestCatalog {
    /// Write `policies` and `flows` as JSON arrays.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory or files cannot be created.
    #[must_use]
    pub fn write(policies: &[Policy], flows: &[ApprovalFlow]) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let policies_path = dir.path().join("policies.json");
        let flows_path = dir.path().join("flows.json");
        std::fs::write(
            &policies_path,
            serde_json::to_vec_pretty(policies).expect("policies serialize"),
        )
        .expect("failed to write policies.json");
        std::fs::write(
            &flows_path,
            serde_json::to_vec_pretty(flows).expect("flows serialize"),
        )
        .expect("failed to write flows.json");
        Self {
            dir,
            policies: policies_path,
            flows: flows_path,
        }
    }

    /// Write a `ringi.toml` pointing at both catalogs and return its path.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn config_file(&self, extra: &str) -> PathBuf {
        let path = self.dir.path().join("ringi.toml");
        let body = format!(
            "[catalog]\npolicies = {:?}\nflows = {:?}\n\n{extra}",
            self.policies.display().to_string(),
            self.flows.display().to_string(),
        );
        std::fs::write(&path, body).expect("failed to write ringi.toml");
        path
    }
}
