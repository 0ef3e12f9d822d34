/*!
 * Reader for CMS billing data files
 *
 * Loads `BillingRecord`s from JSON (a bare array or the `{"CMS_Data": [...]}`
 * wrapper), JSON Lines, CSV, or a `window.CMS_DATA = {...};` script as
 * embedded in the web front end. Malformed records fail loudly unless
 * `skip_invalid_records` is set, in which case they are logged and dropped.
 */

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::Instant;

use csv::ReaderBuilder;
use log::{debug, info, warn};
use serde_json::Value;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    Result, MedrankError, ErrorContext,
    data_types::BillingRecord,
    schema::BillingSchema,
};

/// Key under which the CMS extract wraps its record array
pub const CMS_DATA_KEY: &str = "CMS_Data";

/// Maximum number of skipped-record warnings logged individually
const MAX_LOGGED_SKIPS: usize = 10;

/// Supported input layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    JsonLines,
    Csv,
    /// JavaScript file assigning the JSON document to a global
    Script,
}

impl DataFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "json" => Ok(DataFormat::Json),
            "jsonl" | "ndjson" => Ok(DataFormat::JsonLines),
            "csv" => Ok(DataFormat::Csv),
            "js" => Ok(DataFormat::Script),
            _ => Err(MedrankError::UnsupportedFormat {
                path: path.to_path_buf(),
                suggestion: "Use a .json, .jsonl, .csv or .js (window.CMS_DATA = ...) file".to_string(),
            }),
        }
    }
}

/// Summary of a load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub records_loaded: usize,
    pub records_skipped: usize,
}

/// Billing data reader
pub struct BillingReader {
    /// Whether to validate CSV headers against the expected schema
    validate_headers: bool,
    /// Whether to skip invalid records (true) or fail on first error (false)
    skip_invalid_records: bool,
    /// Whether to show a progress bar
    #[cfg(feature = "progress")]
    show_progress_bar: bool,
}

impl Default for BillingReader {
    fn default() -> Self {
        Self::new()
    }
}

impl BillingReader {
    /// Create a new reader with default settings
    pub fn new() -> Self {
        Self {
            validate_headers: true,
            skip_invalid_records: false,
            #[cfg(feature = "progress")]
            show_progress_bar: false,
        }
    }

    /// Enable or disable header validation
    pub fn with_header_validation(mut self, validate: bool) -> Self {
        self.validate_headers = validate;
        self
    }

    /// Enable or disable skipping invalid records
    pub fn with_skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable the progress bar
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    /// Load records from a file, picking the parser by extension
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<BillingRecord>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MedrankError::file_not_found_with_suggestion(path.to_path_buf()));
        }

        let start = Instant::now();
        let format = DataFormat::from_path(path)?;
        debug!("Reading {} as {:?}", path.display(), format);

        let result = match format {
            DataFormat::Json => {
                let contents = std::fs::read_to_string(path)?;
                self.parse_json_str(&contents)
            }
            DataFormat::Script => {
                let contents = std::fs::read_to_string(path)?;
                self.parse_json_str(strip_script_assignment(&contents))
            }
            DataFormat::JsonLines => self.parse_json_lines(BufReader::new(File::open(path)?)),
            DataFormat::Csv => self.parse_csv(File::open(path)?),
        };

        let (records, summary) = result.map_err(|e| e.with_path(path.to_path_buf()))?;

        info!(
            "Loaded {} billing records from {} in {:.2}s",
            summary.records_loaded,
            path.display(),
            start.elapsed().as_secs_f64()
        );
        if summary.records_skipped > 0 {
            warn!("Skipped {} invalid records", summary.records_skipped);
        }

        Ok(records)
    }

    /// Parse a JSON document: either a bare array or an object with a `CMS_Data` array
    pub fn parse_json_str(&self, contents: &str) -> Result<(Vec<BillingRecord>, LoadSummary)> {
        let document: Value = serde_json::from_str(contents)?;

        let values = match document {
            Value::Array(values) => values,
            Value::Object(mut map) => match map.remove(CMS_DATA_KEY) {
                Some(Value::Array(values)) => values,
                _ => {
                    return Err(MedrankError::JsonParse {
                        message: format!("expected an array under '{}'", CMS_DATA_KEY),
                        context: ErrorContext::default(),
                    })
                }
            },
            _ => {
                return Err(MedrankError::JsonParse {
                    message: "expected an array of records or an object".to_string(),
                    context: ErrorContext::default(),
                })
            }
        };

        self.collect_records(values.into_iter().map(Ok))
    }

    /// Parse one JSON object per line; blank lines are ignored
    pub fn parse_json_lines<R: BufRead>(&self, reader: R) -> Result<(Vec<BillingRecord>, LoadSummary)> {
        let mut values = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            values.push(serde_json::from_str::<Value>(&line).map_err(|e| MedrankError::JsonParse {
                message: e.to_string(),
                context: ErrorContext {
                    line_number: Some(idx + 1),
                    ..Default::default()
                },
            }));
        }
        self.collect_records(values.into_iter())
    }

    /// Parse CSV with a header row
    pub fn parse_csv<R: Read>(&self, input: R) -> Result<(Vec<BillingRecord>, LoadSummary)> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(input);

        if self.validate_headers {
            let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
            BillingSchema::validate_headers(&headers)?;
        }

        let mut records = Vec::new();
        let mut summary = LoadSummary::default();

        for (idx, result) in reader.deserialize::<BillingRecord>().enumerate() {
            let parsed = result
                .map_err(|e| {
                    let line = e.position().map(|p| p.line() as usize);
                    MedrankError::CsvParse {
                        message: e.to_string(),
                        line,
                        context: ErrorContext {
                            line_number: line,
                            record_index: Some(idx),
                            ..Default::default()
                        },
                    }
                })
                .and_then(|record| record.validate(Some(idx)).map(|_| record));

            self.accept(parsed, idx, &mut records, &mut summary)?;
        }

        Ok((records, summary))
    }

    fn collect_records<I>(&self, values: I) -> Result<(Vec<BillingRecord>, LoadSummary)>
    where
        I: ExactSizeIterator<Item = Result<Value>>,
    {
        #[cfg(feature = "progress")]
        let progress_bar = if self.show_progress_bar {
            let pb = ProgressBar::new(values.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        let mut records = Vec::with_capacity(values.len());
        let mut summary = LoadSummary::default();

        for (idx, value) in values.enumerate() {
            let parsed = value.and_then(|value| {
                serde_json::from_value::<BillingRecord>(value)
                    .map_err(|e| MedrankError::DataValidation {
                        message: format!("record {}: {}", idx, e),
                        field: None,
                        value: None,
                        context: ErrorContext {
                            record_index: Some(idx),
                            ..Default::default()
                        },
                    })
                    .and_then(|record| record.validate(Some(idx)).map(|_| record))
            });

            self.accept(parsed, idx, &mut records, &mut summary)?;

            #[cfg(feature = "progress")]
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
        }

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }

        Ok((records, summary))
    }

    fn accept(
        &self,
        parsed: Result<BillingRecord>,
        idx: usize,
        records: &mut Vec<BillingRecord>,
        summary: &mut LoadSummary,
    ) -> Result<()> {
        match parsed {
            Ok(record) => {
                records.push(record);
                summary.records_loaded += 1;
                Ok(())
            }
            Err(e) if self.skip_invalid_records => {
                summary.records_skipped += 1;
                if summary.records_skipped <= MAX_LOGGED_SKIPS {
                    warn!("Skipping invalid record {}: {}", idx, e);
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Strip a `window.CMS_DATA = ... ;` wrapper, leaving the JSON document.
///
/// Text without an assignment is returned trimmed but otherwise unchanged.
pub fn strip_script_assignment(contents: &str) -> &str {
    let trimmed = contents.trim();
    let body = match (trimmed.find('='), trimmed.find(|c: char| c == '{' || c == '[')) {
        (Some(eq), Some(open)) if eq < open => &trimmed[eq + 1..],
        _ => trimmed,
    };
    body.trim().trim_end_matches(';').trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{"HCPCS_Cd":"27447","Rndrng_Prvdr_First_Name":"Jane","Rndrng_Prvdr_Last_Org_Name":"Doe","Credentials":"MD","State":"CA","Tot_Srvcs":10,"rvu":20.0,"Avg_Sbmtd_Chrg":5000,"Avg_Mdcr_Alowd_Amt":1400,"Avg_Mdcr_Pymt_Amt":1100,"Avg_Mdcr_Stdzd_Amt":1050}"#;
    const MISSING_SERVICES: &str = r#"{"HCPCS_Cd":"27447","Rndrng_Prvdr_First_Name":"Bob","Rndrng_Prvdr_Last_Org_Name":"Roe","State":"NY","rvu":1.0,"Avg_Sbmtd_Chrg":1,"Avg_Mdcr_Alowd_Amt":1,"Avg_Mdcr_Pymt_Amt":1,"Avg_Mdcr_Stdzd_Amt":1}"#;

    #[test]
    fn test_parse_wrapped_and_bare_json() {
        let reader = BillingReader::new();
        let wrapped = format!(r#"{{"CMS_Data":[{}]}}"#, RECORD);
        let (records, summary) = reader.parse_json_str(&wrapped).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(summary.records_loaded, 1);

        let bare = format!("[{},{}]", RECORD, RECORD);
        let (records, _) = reader.parse_json_str(&bare).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_missing_field_fails_loudly() {
        let reader = BillingReader::new();
        let doc = format!("[{},{}]", RECORD, MISSING_SERVICES);
        let err = reader.parse_json_str(&doc).unwrap_err();
        match err {
            MedrankError::DataValidation { context, message, .. } => {
                assert_eq!(context.record_index, Some(1));
                assert!(message.contains("Tot_Srvcs"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_invalid_records() {
        let reader = BillingReader::new().with_skip_invalid_records(true);
        let doc = format!("[{},{}]", MISSING_SERVICES, RECORD);
        let (records, summary) = reader.parse_json_str(&doc).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].first_name, "Jane");
        assert_eq!(summary, LoadSummary { records_loaded: 1, records_skipped: 1 });
    }

    #[test]
    fn test_wrong_document_shape() {
        let reader = BillingReader::new();
        assert!(reader.parse_json_str(r#"{"data": []}"#).is_err());
        assert!(reader.parse_json_str("42").is_err());
    }

    #[test]
    fn test_json_lines_skips_blank_lines() {
        let reader = BillingReader::new();
        let input = format!("{}\n\n{}\n", RECORD, RECORD);
        let (records, _) = reader.parse_json_lines(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_csv() {
        let csv_data = "\
HCPCS_Cd,Rndrng_Prvdr_First_Name,Rndrng_Prvdr_Last_Org_Name,Credentials,State,Tot_Srvcs,rvu,Avg_Sbmtd_Chrg,Avg_Mdcr_Alowd_Amt,Avg_Mdcr_Pymt_Amt,Avg_Mdcr_Stdzd_Amt
27447,Jane,Doe,MD,CA,10,20.5,5000,1400,1100,1050
27130,John,Smith,,TX,12,18,4000,1300,1000,990
";
        let reader = BillingReader::new();
        let (records, _) = reader.parse_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].credentials, None);
        assert_eq!(records[1].total_services, 12);
    }

    #[test]
    fn test_csv_missing_column_rejected() {
        let csv_data = "HCPCS_Cd,Rndrng_Prvdr_First_Name\n27447,Jane\n";
        let reader = BillingReader::new();
        assert!(matches!(
            reader.parse_csv(csv_data.as_bytes()),
            Err(MedrankError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_strip_script_assignment() {
        assert_eq!(strip_script_assignment("window.CMS_DATA = {\"CMS_Data\": []};\n"), "{\"CMS_Data\": []}");
        assert_eq!(strip_script_assignment("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(DataFormat::from_path(Path::new("a/cms.JSON")).unwrap(), DataFormat::Json);
        assert_eq!(DataFormat::from_path(Path::new("a.ndjson")).unwrap(), DataFormat::JsonLines);
        assert_eq!(DataFormat::from_path(Path::new("data.js")).unwrap(), DataFormat::Script);
        assert!(DataFormat::from_path(Path::new("data.xlsx")).is_err());
    }
}
