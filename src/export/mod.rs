//! Plan export in CSV and JSON

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::error::ExportError;
use crate::report::PlanReport;

pub mod csv;
pub mod json;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Guess the format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::Serialization(format!(
                "unsupported export format: {}",
                s
            ))),
        }
    }
}

/// Write a plan in the requested format
pub fn export_plan<P: AsRef<Path>>(
    report: &PlanReport,
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    if report.is_empty() {
        return Err(ExportError::EmptyPlan(
            "the rollout produced no training days".to_string(),
        ));
    }

    let output_path = output_path.as_ref();
    match format {
        ExportFormat::Csv => {
            csv::export_plan_days(&report.days, output_path)?;
            csv::export_phase_distribution(
                &report.phase_distribution(),
                phases_path(output_path),
            )?;
        }
        ExportFormat::Json => json::export_plan_report(report, output_path)?,
    }

    info!(
        path = %output_path.display(),
        format = ?format,
        days = report.days.len(),
        "Exported training plan"
    );
    Ok(())
}

/// Sibling file for the per-phase counts of a CSV export: `plan.csv` -> `plan_phases.csv`
pub fn phases_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("plan");
    output_path.with_file_name(format!("{}_phases.csv", stem))
}
