//! Prometheus exposition for a batch run.
//!
//! There is no scrape endpoint: at the end of the run the rendered text is written
//! to a file for the node-exporter textfile collector.

use anyhow::{Context, Result};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct Metrics {
    pub handle: PrometheusHandle,
    path: PathBuf,
}

impl Metrics {
    /// Install the global recorder. Only one recorder can exist per process.
    pub fn init(path: impl Into<PathBuf>) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self {
            handle,
            path: path.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp the run end and write the exposition text atomically.
    pub fn write_textfile(&self, unix_ts: i64) -> Result<()> {
        gauge!("last_run_timestamp_seconds").set(unix_ts as f64);
        write_atomic(&self.path, &self.handle.render())
    }
}

fn write_atomic(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("prom.tmp");
    let mut f = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    f.write_all(body.as_bytes())?;
    f.sync_all()?;
    fs::rename(&tmp, path).with_context(|| format!("rename to {}", path.display()))?;
    Ok(())
}
