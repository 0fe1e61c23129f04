use super::ExportError;
use crate::action::TrainingType;
use crate::report::{PlanReport, TrainingPhase};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Plan report with its per-phase type counts alongside
#[derive(Serialize)]
struct PlanExport<'a> {
    #[serde(flatten)]
    report: &'a PlanReport,
    phase_distribution: BTreeMap<TrainingPhase, BTreeMap<TrainingType, usize>>,
}

/// Export a plan report to JSON format
pub fn export_plan_report<P: AsRef<Path>>(
    report: &PlanReport,
    output_path: P,
) -> Result<(), ExportError> {
    export_json(
        &PlanExport {
            report,
            phase_distribution: report.phase_distribution(),
        },
        output_path,
    )
}

/// Export any serializable data structure to JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let json_data = serde_json::to_string_pretty(data)
        .map_err(|e| ExportError::Serialization(e.to_string()))?;

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{DayRecord, PlanSummary};
    use chrono::{NaiveDate, Utc};
    use tempfile::NamedTempFile;

    #[test]
    fn test_export_plan_report() {
        let report = PlanReport {
            generated_at: Utc::now(),
            horizon_days: 1,
            race_date: NaiveDate::from_ymd_opt(2024, 10, 13),
            days: vec![DayRecord {
                day: 1,
                date: NaiveDate::from_ymd_opt(2024, 10, 12),
                training_type: TrainingType::Rest,
                duration_minutes: 0,
                zone: 1,
                intensity: 0.0,
                fitness: 0.0,
                fatigue: 0.0,
                performance: 0.0,
                form: 0.0,
                reward: 1.0,
                days_remaining: 0,
            }],
            summary: PlanSummary {
                total_days: 1,
                training_days: 0,
                total_volume_minutes: 0,
                long_runs: 0,
                total_reward: 1.0,
                final_fitness: 0.0,
                final_fatigue: 0.0,
                final_performance: 0.0,
                unsafe_termination: false,
            },
        };

        let temp_file = NamedTempFile::new().unwrap();
        export_plan_report(&report, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("\"race_date\": \"2024-10-13\""));
        assert!(content.contains("\"training_type\": \"rest\""));
        assert!(content.contains("\"total_days\": 1"));
        assert!(content.contains("\"phase_distribution\""));
    }

    #[test]
    fn test_export_json_generic() {
        let temp_file = NamedTempFile::new().unwrap();
        let data = vec![("endurance", 3), ("rest", 2)];

        export_json(&data, temp_file.path()).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(temp_file.path()).unwrap()).unwrap();
        assert_eq!(parsed[0][0], "endurance");
        assert_eq!(parsed[1][1], 2);
    }
}
