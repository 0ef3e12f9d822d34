/*!
 * Dataset API for billing records
 *
 * Provides a builder for loading billing data and a dataset type that hands
 * out analytics engines and ranking sessions.
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::info;

use crate::{Result, MedrankError};
use crate::analytics::{BillingAnalytics, DatasetStats};
use crate::config::MedrankConfig;
use crate::data_types::*;
use crate::reader::{BillingReader, DataFormat};
use crate::ranking::AggregationOptions;
use crate::selection::Selection;
use crate::session::RankingSession;

/// Builder for loading a billing dataset
///
/// # Example
/// ```no_run
/// # use medrank::dataset::BillingDatasetBuilder;
/// let dataset = BillingDatasetBuilder::new()
///     .data_file("data/cms_data.json")
///     .skip_invalid_records(true)
///     .build()?;
/// # Ok::<(), medrank::MedrankError>(())
/// ```
pub struct BillingDatasetBuilder {
    data_path: Option<PathBuf>,
    skip_invalid_records: bool,
    validate_headers: bool,
    #[cfg(feature = "progress")]
    show_progress: bool,
}

impl Default for BillingDatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BillingDatasetBuilder {
    /// Create a new dataset builder
    pub fn new() -> Self {
        Self {
            data_path: None,
            skip_invalid_records: false,
            validate_headers: true,
            #[cfg(feature = "progress")]
            show_progress: false,
        }
    }

    /// Builder seeded from a configuration
    pub fn from_config(config: &MedrankConfig) -> Self {
        let builder = Self::new().skip_invalid_records(config.skip_invalid_records);
        #[cfg(feature = "progress")]
        let builder = builder.show_progress(config.enable_progress_bar);
        match &config.data_path {
            Some(path) => builder.data_file(path),
            None => builder,
        }
    }

    /// Set the path to the billing data file
    pub fn data_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enable or disable skipping invalid records
    pub fn skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    /// Enable or disable CSV header validation
    pub fn validate_headers(mut self, validate: bool) -> Self {
        self.validate_headers = validate;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable progress bars
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Load the dataset
    pub fn build(self) -> Result<BillingDataset> {
        let path = self.data_path.ok_or_else(|| MedrankError::Custom {
            message: "Billing data file path not specified".to_string(),
            suggestion: Some("Use .data_file() or pass --data to point at a CMS JSON or CSV file".to_string()),
        })?;

        let reader = BillingReader::new()
            .with_skip_invalid_records(self.skip_invalid_records)
            .with_header_validation(self.validate_headers);

        #[cfg(feature = "progress")]
        let reader = reader.with_progress_bar(self.show_progress);

        let path = if path.is_dir() { find_data_file(&path)? } else { path };
        let records = reader.load(&path)?;
        Ok(BillingDataset::new(records))
    }

    /// Builder pointed at the first data file found in `dir`.
    ///
    /// Files are tried in name order; anything the reader cannot parse by
    /// extension is ignored.
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Ok(Self::new().data_file(find_data_file(dir.as_ref())?))
    }
}

fn find_data_file(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(MedrankError::Custom {
            message: format!("'{}' is not a directory", dir.display()),
            suggestion: Some("Provide a directory containing a CMS data file".to_string()),
        });
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && DataFormat::from_path(&path).is_ok() {
            candidates.push(path);
        }
    }
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| MedrankError::FileNotFound {
        path: dir.to_path_buf(),
        suggestion: "The directory contains no .json, .jsonl, .csv or .js data file".to_string(),
    })
}

/// Loaded billing records
#[derive(Debug, Clone, Default)]
pub struct BillingDataset {
    records: Vec<BillingRecord>,
}

impl BillingDataset {
    /// Wrap already-parsed records
    pub fn new(records: Vec<BillingRecord>) -> Self {
        Self { records }
    }

    /// Load a dataset from a file or a directory holding one
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        BillingDatasetBuilder::new().data_file(path).build()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[BillingRecord] {
        &self.records
    }

    /// Procedure codes present with their record counts
    pub fn procedures(&self) -> BTreeMap<ProcedureCode, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(ProcedureCode::new(record.procedure_code.as_str())).or_insert(0) += 1;
        }
        counts
    }

    /// Create an analytics engine for this dataset
    pub fn analytics(&self) -> BillingAnalytics<'_> {
        BillingAnalytics::new(&self.records)
    }

    /// Get dataset statistics
    pub fn statistics(&self) -> Result<DatasetStats> {
        self.analytics().dataset_stats()
    }

    /// Hand the dataset to a ranking session
    pub fn into_session(self, selection: Selection, options: AggregationOptions) -> Result<RankingSession> {
        info!(
            "Starting ranking session for procedure {} by {}",
            selection.procedure,
            selection.metric.as_str()
        );
        RankingSession::new(self, selection, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r#"{"CMS_Data":[
        {"HCPCS_Cd":"27447","Rndrng_Prvdr_First_Name":"Jane","Rndrng_Prvdr_Last_Org_Name":"Doe","State":"CA","Tot_Srvcs":10,"rvu":1,"Avg_Sbmtd_Chrg":1,"Avg_Mdcr_Alowd_Amt":1,"Avg_Mdcr_Pymt_Amt":1,"Avg_Mdcr_Stdzd_Amt":1},
        {"HCPCS_Cd":"27130","Rndrng_Prvdr_First_Name":"Bob","Rndrng_Prvdr_Last_Org_Name":"Roe","State":"NY","Tot_Srvcs":3,"rvu":1,"Avg_Sbmtd_Chrg":1,"Avg_Mdcr_Alowd_Amt":1,"Avg_Mdcr_Pymt_Amt":1,"Avg_Mdcr_Stdzd_Amt":1}
    ]}"#;

    #[test]
    fn test_builder_requires_path() {
        assert!(BillingDatasetBuilder::new().build().is_err());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        let mut file = std::fs::File::create(dir.path().join("cms_data.json")).unwrap();
        file.write_all(DOC.as_bytes()).unwrap();

        let dataset = BillingDatasetBuilder::from_directory(dir.path()).unwrap().build().unwrap();
        assert_eq!(dataset.len(), 2);

        let procedures = dataset.procedures();
        assert_eq!(procedures.get(&ProcedureCode::knee()), Some(&1));
        assert_eq!(procedures.get(&ProcedureCode::hip()), Some(&1));
    }

    #[test]
    fn test_missing_file_reports_not_found() {
        let err = BillingDataset::load("/definitely/not/here/cms.json").unwrap_err();
        assert!(matches!(err, MedrankError::FileNotFound { .. }));
    }
}
