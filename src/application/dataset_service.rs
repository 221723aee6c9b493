// Dataset service - Use case for cleaning a recorded potentiostat CSV
use crate::domain::autoscale::ChartAxes;
use crate::domain::dataset::{clean, DatasetError};
use crate::domain::series::Channel;
use crate::domain::session::ChartSnapshot;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub rows: usize,
    pub valid_rows: usize,
    pub anomalies: usize,
    pub charts: Vec<ChartSnapshot>,
}

#[derive(Clone)]
pub struct DatasetService {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl DatasetService {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input_dir,
            output_dir,
        }
    }

    /// `<output_dir>/<stem>_cleaned.csv`
    pub fn default_output(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        self.output_dir.join(format!("{}_cleaned.csv", stem))
    }

    /// Clean `input` (relative to the input directory) into `output`
    /// (relative to the output directory, or the default name there).
    pub async fn clean(
        &self,
        input: &Path,
        output: Option<&Path>,
    ) -> Result<DatasetReport, DatasetError> {
        let input = confine(&self.input_dir, input)?;
        let output = match output {
            Some(output) => confine(&self.output_dir, output)?,
            None => self.default_output(&input),
        };

        let raw = tokio::fs::read_to_string(&input).await?;
        let dataset = clean(&raw)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&output, dataset.to_csv()).await?;

        tracing::info!(
            "Cleaned {} rows from {} into {}",
            dataset.rows.len(),
            input.display(),
            output.display()
        );

        let charts = Channel::ALL
            .iter()
            .map(|&channel| {
                let series = dataset.series(channel);
                ChartSnapshot::new(channel, &series, ChartAxes::fitted(&series))
            })
            .collect();

        Ok(DatasetReport {
            input,
            rows: dataset.rows.len(),
            valid_rows: dataset.valid_rows(),
            anomalies: dataset.anomalies(),
            output,
            charts,
        })
    }
}

/// Join a relative request path onto `base`. Absolute paths and `..`
/// components are refused.
fn confine(base: &Path, requested: &Path) -> Result<PathBuf, DatasetError> {
    let mut components = requested.components().peekable();
    let plain = components.peek().is_some()
        && components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !plain {
        return Err(DatasetError::UnsafePath(requested.to_path_buf()));
    }
    Ok(base.join(requested))
}
