/*!
 * Export functionality for rankings
 *
 * Writes a ranking as pretty JSON, JSON Lines or a flat CSV table. Every
 * exporter keeps the ranking's national order and the ranks it assigned.
 */

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::{Result, MedrankError, ExportFormat};
use crate::data_types::*;
use crate::ranking::Ranking;

/// Trait for implementing ranking exporters
pub trait RankingExporter {
    /// Export the ranking
    fn export(&self, ranking: &Ranking, path: &Path) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;
}

/// JSON exporter for rankings
pub struct JsonExporter {
    /// Whether to pretty-print the JSON document
    pub pretty_print: bool,
    /// Whether to export as JSON Lines (one provider per line)
    pub json_lines: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self {
            pretty_print: true,
            json_lines: false,
        }
    }
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// Set JSON Lines format
    pub fn as_json_lines(mut self) -> Self {
        self.json_lines = true;
        self.pretty_print = false;
        self
    }
}

impl RankingExporter for JsonExporter {
    fn export(&self, ranking: &Ranking, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        if self.json_lines {
            for provider in ranking.providers() {
                serde_json::to_writer(&mut writer, provider)?;
                writeln!(writer)?;
            }
        } else if self.pretty_print {
            serde_json::to_writer_pretty(&mut writer, ranking)?;
        } else {
            serde_json::to_writer(&mut writer, ranking)?;
        }
        writer.flush()?;

        info!("Exported {} providers as {} to {}", ranking.len(), self.format(), path.display());
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        if self.json_lines {
            ExportFormat::JsonLines
        } else {
            ExportFormat::Json
        }
    }
}

/// CSV exporter for rankings
pub struct CsvExporter {
    /// Whether to write a header row
    pub include_headers: bool,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
        }
    }
}

impl CsvExporter {
    /// Create a new CSV exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether a header row is written
    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }
}

/// One flat CSV row per ranked provider
#[derive(Serialize)]
struct CsvRow<'a> {
    national_rank: usize,
    state_rank: usize,
    provider: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    credentials: &'a str,
    state: &'a str,
    total_services: u64,
    rvu: f64,
    avg_submitted_charge: f64,
    avg_allowed_amount: f64,
    avg_paid_amount: f64,
    avg_standardized_amount: f64,
    total_payment: f64,
}

impl<'a> From<&'a ProviderAggregate> for CsvRow<'a> {
    fn from(p: &'a ProviderAggregate) -> Self {
        Self {
            national_rank: p.national_rank,
            state_rank: p.state_rank,
            provider: &p.display_name,
            first_name: &p.first_name,
            last_name: &p.last_name,
            credentials: p.credentials.as_deref().unwrap_or(""),
            state: &p.state,
            total_services: p.total_services,
            rvu: p.rvu,
            avg_submitted_charge: p.averages.submitted_charge,
            avg_allowed_amount: p.averages.allowed_amount,
            avg_paid_amount: p.averages.paid_amount,
            avg_standardized_amount: p.averages.standardized_amount,
            total_payment: p.total_payment(),
        }
    }
}

impl RankingExporter for CsvExporter {
    fn export(&self, ranking: &Ranking, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.include_headers)
            .from_path(path)
            .map_err(|e| MedrankError::Export {
                message: format!("Cannot create {}: {}", path.display(), e),
                format: ExportFormat::Csv,
                suggestion: Some("Check that the output directory exists and is writable".to_string()),
            })?;

        for provider in ranking.providers() {
            writer.serialize(CsvRow::from(provider))?;
        }
        writer.flush()?;

        info!("Exported {} providers as CSV to {}", ranking.len(), path.display());
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// Output settings applied by [`exporter_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Indent JSON documents; ignored for JSON Lines and CSV
    pub pretty_print: bool,
    /// Write the CSV header row
    pub include_headers: bool,
    /// CSV field delimiter
    pub delimiter: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            pretty_print: true,
            include_headers: true,
            delimiter: b',',
        }
    }
}

/// Exporter for a format with default settings
pub fn exporter_for(format: ExportFormat) -> Box<dyn RankingExporter> {
    exporter_with(format, &ExportOptions::default())
}

/// Exporter for a format with the given settings
pub fn exporter_with(format: ExportFormat, options: &ExportOptions) -> Box<dyn RankingExporter> {
    match format {
        ExportFormat::Json => Box::new(JsonExporter::new().with_pretty_print(options.pretty_print)),
        ExportFormat::JsonLines => Box::new(JsonExporter::new().as_json_lines()),
        ExportFormat::Csv => Box::new(
            CsvExporter::new()
                .with_delimiter(options.delimiter)
                .with_headers(options.include_headers),
        ),
    }
}

// Export convenience functions for Ranking
impl Ranking {
    /// Export to pretty JSON
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        JsonExporter::default().export(self, path.as_ref())
    }

    /// Export to JSON Lines
    pub fn export_json_lines<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        JsonExporter::new().as_json_lines().export(self, path.as_ref())
    }

    /// Export to CSV
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        CsvExporter::default().export(self, path.as_ref())
    }

    /// Export the providers matching `filter`, keeping their assigned ranks
    pub fn export_subset<P: AsRef<Path>, F>(&self, path: P, filter: F, format: ExportFormat) -> Result<()>
    where
        F: Fn(&ProviderAggregate) -> bool,
    {
        self.export_subset_with(path, filter, format, &ExportOptions::default())
    }

    /// [`Ranking::export_subset`] with explicit output settings
    pub fn export_subset_with<P: AsRef<Path>, F>(
        &self,
        path: P,
        filter: F,
        format: ExportFormat,
        options: &ExportOptions,
    ) -> Result<()>
    where
        F: Fn(&ProviderAggregate) -> bool,
    {
        let subset = self.filtered(filter);
        exporter_with(format, options).export(&subset, path.as_ref())
    }
}
