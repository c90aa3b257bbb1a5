use std::path::Path;

use anyhow::Context;
use archiver_core::RunModes;
use archiver_engine::{AtomicFileWriter, RunReport};
use serde::Serialize;

/// JSON summary written by `--report`.
#[derive(Debug, Serialize)]
pub struct ReportFile<'a> {
    pub started_at: String,
    pub finished_at: String,
    pub modes: Vec<&'static str>,
    #[serde(flatten)]
    pub run: &'a RunReport,
}

impl<'a> ReportFile<'a> {
    pub fn new(started_at: String, modes: RunModes, run: &'a RunReport) -> Self {
        Self {
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            modes: mode_names(modes),
            run,
        }
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(self).context("serializing run report")?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        let filename = path
            .file_name()
            .with_context(|| format!("report path {} has no file name", path.display()))?
            .to_string_lossy()
            .into_owned();
        AtomicFileWriter::new(dir)
            .write(&filename, &json)
            .with_context(|| format!("writing report to {}", path.display()))?;
        Ok(())
    }
}

fn mode_names(modes: RunModes) -> Vec<&'static str> {
    [
        (modes.source, "source"),
        (modes.html, "html"),
        (modes.clean, "clean"),
        (modes.attachments, "att"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect()
}
