use super::ExportError;
use crate::action::TrainingType;
use crate::report::{DayRecord, TrainingPhase};
use std::collections::BTreeMap;
use std::path::Path;

/// Export per-day plan records to CSV (one row per day, suitable for plotting)
pub fn export_plan_days<P: AsRef<Path>>(
    days: &[DayRecord],
    output_path: P,
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(output_path)?;
    for day in days {
        writer.serialize(day)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export per-phase training-type counts to CSV
pub fn export_phase_distribution<P: AsRef<Path>>(
    distribution: &BTreeMap<TrainingPhase, BTreeMap<TrainingType, usize>>,
    output_path: P,
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(output_path)?;
    writer.write_record(["phase", "training_type", "sessions"])?;

    for (phase, counts) in distribution {
        for (training_type, count) in counts {
            writer.write_record([
                phase.as_str(),
                training_type.as_str(),
                count.to_string().as_str(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    fn day(day: u32, training_type: TrainingType) -> DayRecord {
        DayRecord {
            day,
            date: NaiveDate::from_ymd_opt(2024, 9, day),
            training_type,
            duration_minutes: 90,
            zone: 2,
            intensity: 0.7,
            fitness: 0.25,
            fatigue: 0.5,
            performance: -0.125,
            form: -0.75,
            reward: 3.5,
            days_remaining: 30 - day,
        }
    }

    #[test]
    fn test_export_plan_days() {
        let temp_file = NamedTempFile::new().unwrap();
        let days = vec![day(1, TrainingType::LongRun), day(2, TrainingType::Endurance)];

        export_plan_days(&days, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("day,date,training_type,duration_minutes,zone,intensity,fitness,fatigue,performance,form,reward,days_remaining")
        );
        assert_eq!(
            lines.next(),
            Some("1,2024-09-01,long-run,90,2,0.7,0.25,0.5,-0.125,-0.75,3.5,29")
        );
        assert!(lines.next().unwrap().contains("endurance"));
    }

    #[test]
    fn test_export_phase_distribution() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut distribution = BTreeMap::new();
        distribution
            .entry(TrainingPhase::Taper)
            .or_insert_with(BTreeMap::new)
            .insert(TrainingType::Rest, 4);

        export_phase_distribution(&distribution, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.starts_with("phase,training_type,sessions"));
        assert!(content.contains("taper,rest,4"));
    }
}
