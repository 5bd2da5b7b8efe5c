//! Reference dataset
//!
//! The labelled soil/climate table the classifier was trained on. It backs the
//! nearest-neighbor fallback classifier and the z-score surrogate explanation,
//! so its column statistics are computed once at load time.

use agrisage_core::{Error, Feature, Result, FEATURE_COUNT};
use polars::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const LABEL_COLUMN: &str = "label";

/// Per-column mean and sample standard deviation.
///
/// A zero or undefined standard deviation is stored as 1.0 so it can always be
/// divided by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub means: [f64; FEATURE_COUNT],
    pub stds: [f64; FEATURE_COUNT],
}

impl ColumnStats {
    fn compute(rows: &[[f64; FEATURE_COUNT]]) -> Self {
        let n = rows.len() as f64;
        let mut means = [0.0; FEATURE_COUNT];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut stds = [0.0; FEATURE_COUNT];
        for row in rows {
            for (j, v) in row.iter().enumerate() {
                stds[j] += (v - means[j]).powi(2);
            }
        }
        for s in &mut stds {
            let std = (*s / (n - 1.0)).sqrt();
            *s = if std.is_finite() && std > 0.0 { std } else { 1.0 };
        }

        Self { means, stds }
    }

    /// Standardized distance of `value` from the column mean
    pub fn z_score(&self, feature: Feature, value: f64) -> f64 {
        let j = feature.index();
        (value - self.means[j]) / self.stds[j]
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    rows: Vec<[f64; FEATURE_COUNT]>,
    labels: Vec<String>,
    stats: ColumnStats,
}

impl ReferenceDataset {
    pub fn new(rows: Vec<[f64; FEATURE_COUNT]>, labels: Vec<String>) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::Artifact("reference dataset is empty".to_string()));
        }
        if rows.len() != labels.len() {
            return Err(Error::Artifact(format!(
                "reference dataset has {} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::Artifact("reference dataset contains non-finite values".to_string()));
        }
        let stats = ColumnStats::compute(&rows);
        Ok(Self { rows, labels, stats })
    }

    /// Load a CSV with the seven feature columns and a `label` column.
    ///
    /// Extra columns are ignored; rows with a missing value are skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let context = |e: PolarsError| Error::Artifact(format!("{}: {}", path.display(), e));

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(context)?
            .finish()
            .map_err(context)?;

        let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(FEATURE_COUNT);
        for feature in Feature::ALL {
            let column = df
                .column(feature.name())
                .map_err(context)?
                .cast(&DataType::Float64)
                .map_err(context)?;
            columns.push(column.f64().map_err(context)?.into_iter().collect());
        }

        let label_column = df
            .column(LABEL_COLUMN)
            .map_err(context)?
            .cast(&DataType::String)
            .map_err(context)?;
        let labels: Vec<Option<String>> = label_column
            .str()
            .map_err(context)?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();

        let mut rows = Vec::with_capacity(df.height());
        let mut kept_labels = Vec::with_capacity(df.height());
        let mut skipped = 0usize;
        for (i, label) in labels.into_iter().enumerate() {
            let mut row = [0.0; FEATURE_COUNT];
            let mut complete = label.is_some();
            for (j, column) in columns.iter().enumerate() {
                match column[i] {
                    Some(v) if v.is_finite() => row[j] = v,
                    _ => complete = false,
                }
            }
            match (complete, label) {
                (true, Some(label)) => {
                    rows.push(row);
                    kept_labels.push(label);
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(path = %path.display(), skipped, "Skipped incomplete reference rows");
        }

        Self::new(rows, kept_labels)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[[f64; FEATURE_COUNT]] {
        &self.rows
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn stats(&self) -> &ColumnStats {
        &self.stats
    }
}

/// Load the reference dataset, logging and returning `None` when it is unusable
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Option<Arc<ReferenceDataset>> {
    let path = path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "Reference dataset not found");
        return None;
    }
    match ReferenceDataset::load(path) {
        Ok(dataset) => {
            info!(path = %path.display(), rows = dataset.len(), "Loaded reference dataset");
            Some(Arc::new(dataset))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Reference dataset unavailable");
            None
        }
    }
}
