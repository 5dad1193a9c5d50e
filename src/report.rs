//! CSV model output.
//!
//! A report is a serializable row type registered with [`define_report!`]. Each report type gets
//! one CSV file, named `{file_prefix}{short_name}.csv` inside the configured output directory.
//! The built-in [`DailySummary`] report writes one row per completed day.
use std::any::TypeId;
use std::cell::RefCell;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::characters::{ContextCharacterExt, HealthCondition};
use crate::context::Context;
use crate::define_data_plugin;
use crate::economy::ContextEconomyExt;
use crate::error::OutbreakError;
use crate::hashing::HashMap;
use crate::log::{debug, error};
use crate::statistics::ContextStatisticsExt;

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), csv::Error>;
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(&self, writer: &mut $crate::csv::Writer<std::fs::File>) -> Result<(), $crate::csv::Error> {
                writer.serialize(self)
            }
        }
    };
}
pub use define_report;

/// Where report files go and whether existing files may be replaced
#[derive(Clone, Debug)]
pub struct ReportOptions {
    file_prefix: String,
    directory: PathBuf,
    overwrite: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            file_prefix: String::new(),
            directory: PathBuf::from("."),
            overwrite: false,
        }
    }
}

impl ReportOptions {
    /// Sets the file prefix option (e.g., "run1_")
    pub fn file_prefix(&mut self, file_prefix: String) -> &mut ReportOptions {
        self.file_prefix = file_prefix;
        self
    }

    /// Sets the directory where reports will be output
    pub fn directory(&mut self, directory: PathBuf) -> &mut ReportOptions {
        self.directory = directory;
        self
    }

    /// Sets whether to overwrite existing reports of the same name if they exist
    pub fn overwrite(&mut self, overwrite: bool) -> &mut ReportOptions {
        self.overwrite = overwrite;
        self
    }

    fn path_for(&self, short_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{short_name}.csv", self.file_prefix))
    }
}

struct ReportData {
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
    options: ReportOptions,
}

// Registers a data container that stores
// * file_writers: Maps report type to file writer
// * options: the customizable file name options the user supplies
define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        file_writers: RefCell::new(HashMap::default()),
        options: ReportOptions::default(),
    }
);

// Creates the file and all parent directories if they do not exist. Refuses to replace an
// existing file unless `overwrite` is set.
fn create_report_file(path: &Path, overwrite: bool) -> Result<File, OutbreakError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    if path.exists() && !overwrite {
        return Err(OutbreakError::ReportError(format!(
            "{} already exists, refusing to overwrite it",
            path.display()
        )));
    }
    Ok(File::create(path)?)
}

/// One row per completed day
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub day: u32,
    pub healthy: usize,
    pub sick: usize,
    pub dead: usize,
    pub infected: u32,
    pub healed: u32,
    pub died: u32,
    pub vaccinated: u32,
    pub money: i64,
    pub income: i64,
    pub expenses: i64,
}

define_report!(DailySummary);

fn send_daily_summary(context: &mut Context) {
    let day = context.current_day().saturating_sub(1);
    let tally = context.daily_tally(day);
    let ledger = context.ledger_last_day();
    let summary = DailySummary {
        day,
        healthy: context.count_by_health(HealthCondition::Healthy),
        sick: context.count_by_health(HealthCondition::Sick),
        dead: context.count_by_health(HealthCondition::Dead),
        infected: tally.infected,
        healed: tally.healed,
        died: tally.died,
        vaccinated: tally.vaccinated,
        money: context.money(),
        income: ledger.income,
        expenses: ledger.expenses,
    };
    if let Err(e) = context.send_report(summary) {
        error!("could not write the daily summary for day {day}: {e}");
    }
}

pub trait ContextReportExt {
    /// Output options shared by every report added afterwards
    fn report_options(&mut self) -> &mut ReportOptions;

    /// Open the file for report type `T`, named after `short_name`
    ///
    /// # Errors
    ///
    /// `IoError` if the file or its directory cannot be created; `ReportError` if the file
    /// exists and overwriting is off.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), OutbreakError>;

    /// Write a new row with columns following items in the report struct
    /// to the report file associated with the report type struct.
    ///
    /// # Errors
    ///
    /// `ReportError` if no file was added for the report type; `CSVError` if the row cannot be
    /// written.
    fn send_report<T: Report>(&self, report: T) -> Result<(), OutbreakError>;

    /// Write a [`DailySummary`] row at the end of every day. The summary reads the treasury's
    /// ledger, so add it after the economy is initialized.
    ///
    /// # Errors
    ///
    /// As [`ContextReportExt::add_report`].
    fn add_daily_summary_report(&mut self, short_name: &str) -> Result<(), OutbreakError>;
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ReportOptions {
        &mut self.get_data_mut(ReportPlugin).options
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), OutbreakError> {
        let data = self.get_data_mut(ReportPlugin);
        let path = data.options.path_for(short_name);
        let file = create_report_file(&path, data.options.overwrite)?;
        data.file_writers
            .borrow_mut()
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        debug!("writing report {short_name} to {}", path.display());
        Ok(())
    }

    fn send_report<T: Report>(&self, report: T) -> Result<(), OutbreakError> {
        // No data container will exist if no reports have been added
        let missing = || OutbreakError::ReportError("No writer found for the report type".to_string());
        let data = self.get_data(ReportPlugin).ok_or_else(missing)?;
        let mut writers = data.file_writers.borrow_mut();
        let writer = writers.get_mut(&report.type_id()).ok_or_else(missing)?;
        report.serialize(writer)?;
        writer.flush()?;
        Ok(())
    }

    fn add_daily_summary_report(&mut self, short_name: &str) -> Result<(), OutbreakError> {
        self.add_report::<DailySummary>(short_name)?;
        self.subscribe_end_of_day(send_daily_summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::ContextHealthExt;
    use crate::clock::VirtualClock;
    use crate::disease::{ContextDiseaseExt, DiseaseDefinition};
    use crate::economy::EconomyParams;
    use crate::random::ContextRandomExt;
    use tempfile::tempdir;

    #[derive(Serialize, Deserialize)]
    struct SampleReport {
        id: u32,
        value: String,
    }

    define_report!(SampleReport);

    #[test]
    fn add_and_send_report() {
        let mut context = Context::new();
        let temp_dir = tempdir().unwrap();
        context
            .report_options()
            .directory(temp_dir.path().to_path_buf())
            .file_prefix("run1_".to_string());
        context.add_report::<SampleReport>("sample").unwrap();
        context
            .send_report(SampleReport {
                id: 1,
                value: "Value,1".to_string(),
            })
            .unwrap();
        context
            .send_report(SampleReport {
                id: 2,
                value: "Value\n2".to_string(),
            })
            .unwrap();

        let file_path = temp_dir.path().join("run1_sample.csv");
        let mut reader = csv::Reader::from_path(file_path).unwrap();
        let records: Vec<SampleReport> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, "Value,1");
        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].value, "Value\n2");
    }

    #[test]
    fn creates_missing_directories() {
        let mut context = Context::new();
        let temp_dir = tempdir().unwrap();
        context
            .report_options()
            .directory(temp_dir.path().join("nested").join("out"));
        context.add_report::<SampleReport>("sample").unwrap();
        assert!(temp_dir.path().join("nested/out/sample.csv").exists());
    }

    #[test]
    fn refuses_to_overwrite_unless_asked() {
        let mut context = Context::new();
        let temp_dir = tempdir().unwrap();
        context.report_options().directory(temp_dir.path().to_path_buf());
        context.add_report::<SampleReport>("sample").unwrap();

        let mut other = Context::new();
        other.report_options().directory(temp_dir.path().to_path_buf());
        assert!(matches!(
            other.add_report::<SampleReport>("sample"),
            Err(OutbreakError::ReportError(_))
        ));
        other.report_options().overwrite(true);
        other.add_report::<SampleReport>("sample").unwrap();
    }

    #[test]
    fn send_report_without_adding_report() {
        let context = Context::new();
        let result = context.send_report(SampleReport {
            id: 1,
            value: "Test Value".to_string(),
        });
        assert!(matches!(result, Err(OutbreakError::ReportError(_))));
    }

    #[test]
    fn daily_summary_has_one_row_per_day() {
        let mut context = Context::with_clock(VirtualClock::starting_at(10, 1, 5).unwrap());
        context.init_random(1);
        context.init_economy(EconomyParams::default());
        let temp_dir = tempdir().unwrap();
        context.report_options().directory(temp_dir.path().to_path_buf());
        context.add_daily_summary_report("daily").unwrap();

        let flu = context
            .add_disease(DiseaseDefinition {
                name: "Flu".to_string(),
                transmissibility: 50,
                lethality: 0,
                symptoms: vec![],
            })
            .unwrap();
        let sick = context.add_character("A", 20, 50).unwrap();
        context.add_character("B", 20, 50).unwrap();
        context.infect(sick, flu).unwrap();
        // Keeps the character sick without daily lethality rolls.
        context.suspend_for_treatment(sick).unwrap();
        context.execute_until(3, 0);

        let mut reader = csv::Reader::from_path(temp_dir.path().join("daily.csv")).unwrap();
        let rows: Vec<DailySummary> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            DailySummary {
                day: 1,
                healthy: 1,
                sick: 1,
                dead: 0,
                infected: 1,
                healed: 0,
                died: 0,
                vaccinated: 0,
                money: 410,
                income: 10,
                expenses: 0,
            }
        );
        assert_eq!(rows[1].day, 2);
        assert_eq!(rows[1].infected, 0);
        assert_eq!(rows[1].money, 420);
    }
}
