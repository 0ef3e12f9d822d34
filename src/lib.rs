/*!
 * # medrank: Medicare provider rankings
 *
 * Ranks providers by how often, and for how much, they billed Medicare for a
 * procedure, using the CMS "Physician & Other Practitioners by Provider and
 * Service" extract.
 *
 * ## Pipeline
 *
 * 1. **Filter** the billing records to one HCPCS procedure code.
 * 2. **Aggregate** the records per provider, summing services and RVUs.
 * 3. **Rank** providers nationally and within their state, by total services
 *    or by average Medicare payment.
 *
 * ## Quick Start
 *
 * ```no_run
 * use medrank::prelude::*;
 *
 * # fn main() -> Result<()> {
 * let dataset = BillingDataset::load("data/cms_data.json")?;
 * let mut session = dataset.into_session(Selection::default(), AggregationOptions::default())?;
 *
 * for provider in session.top_n(10) {
 *     println!("#{} {} ({})", provider.national_rank, provider.display_name, provider.total_services);
 * }
 *
 * // Rerank the same providers by average payment
 * session.set_metric(RankingMetric::PaymentAmount);
 *
 * match session.lookup_provider("Jane", "Doe")? {
 *     Some(index) => println!("Jane Doe is #{}", index + 1),
 *     None => println!("Jane Doe did not bill this procedure"),
 * }
 * # Ok(())
 * # }
 * ```
 *
 * ## Loading Data
 *
 * JSON (a bare array or a `{"CMS_Data": [...]}` document), JSON Lines, CSV
 * with the CMS column names, and `window.CMS_DATA = {...}` script files are
 * all recognised by extension.
 *
 * ```no_run
 * # use medrank::prelude::*;
 * # fn main() -> Result<()> {
 * let dataset = BillingDatasetBuilder::new()
 *     .data_file("data/cms_data.csv")
 *     .skip_invalid_records(true)
 *     .build()?;
 * dataset.statistics()?.print_summary();
 * # Ok(())
 * # }
 * ```
 *
 * ## Exporting Rankings
 *
 * ```no_run
 * # use medrank::prelude::*;
 * # fn main() -> Result<()> {
 * # let session = BillingDataset::load("data/cms_data.json")?
 * #     .into_session(Selection::default(), AggregationOptions::default())?;
 * let ranking = session.ranking();
 * ranking.export_csv("knee_rankings.csv")?;
 * ranking.export_subset("texas.json", |p| p.state == "TX", ExportFormat::Json)?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Configuration
 *
 * Settings come from `~/.config/medrank/config.toml` and `MEDRANK_*`
 * environment variables, or can be built in code:
 *
 * ```
 * # use medrank::prelude::*;
 * let config = ConfigBuilder::new()
 *     .average_policy(AveragePolicy::ServiceWeighted)
 *     .top_n(25)
 *     .build();
 * medrank::config::set_global_config(config);
 * ```
 */

// Re-export error types from root
pub use error::{MedrankError, Result, ErrorContext, ExportFormat};

// Public modules
pub mod data_types;
pub mod reader;
pub mod schema;
pub mod error;
pub mod analytics;
pub mod dataset;
pub mod export;
pub mod config;
pub mod ranking;
pub mod session;
pub mod selection;
pub mod display;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use medrank::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::*;
    pub use crate::reader::{BillingReader, DataFormat, LoadSummary};
    pub use crate::schema::BillingSchema;
    pub use crate::error::{MedrankError, Result};
    pub use crate::analytics::{BillingAnalytics, DatasetStats, RankingAnalytics};
    pub use crate::dataset::{BillingDataset, BillingDatasetBuilder};
    pub use crate::export::{RankingExporter, JsonExporter, CsvExporter, ExportOptions};
    pub use crate::config::{ConfigBuilder, MedrankConfig};
    pub use crate::ranking::{AggregationOptions, Ranking, StandingsRow};
    pub use crate::selection::{Selection, SelectionStore};
    pub use crate::session::RankingSession;
    pub use crate::ExportFormat;
}

/// Procedure codes and limits
pub mod constants {
    /// HCPCS code for total knee arthroplasty
    pub const TOTAL_KNEE_ARTHROPLASTY: &str = crate::data_types::ProcedureCode::TOTAL_KNEE;

    /// HCPCS code for total hip arthroplasty
    pub const TOTAL_HIP_ARTHROPLASTY: &str = crate::data_types::ProcedureCode::TOTAL_HIP;

    /// Providers shown in a national or state top list
    pub const DEFAULT_TOP_N: usize = 10;

    /// Key holding the record array in CMS JSON documents
    pub const CMS_DATA_KEY: &str = crate::reader::CMS_DATA_KEY;
}

/// Common recipes
pub mod cookbook {
    use crate::prelude::*;

    /// National top `n` for each procedure, ranked by `metric`
    ///
    /// # Example
    /// ```no_run
    /// # use medrank::prelude::*;
    /// # use medrank::cookbook::top_providers_by_procedure;
    /// # fn main() -> Result<()> {
    /// # let dataset = BillingDataset::load("data/cms_data.json")?;
    /// let procedures = [ProcedureCode::knee(), ProcedureCode::hip()];
    /// for (code, top) in top_providers_by_procedure(&dataset, &procedures, RankingMetric::ServiceCount, 5)? {
    ///     println!("{}: {:?}", code, top.iter().map(|p| &p.display_name).collect::<Vec<_>>());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn top_providers_by_procedure(
        dataset: &BillingDataset,
        procedures: &[ProcedureCode],
        metric: RankingMetric,
        n: usize,
    ) -> Result<Vec<(ProcedureCode, Vec<ProviderAggregate>)>> {
        let options = AggregationOptions::default();
        procedures
            .iter()
            .map(|code| {
                let filtered = crate::ranking::filter_by_procedure(dataset.records(), code);
                let aggregation = crate::ranking::aggregate_providers(filtered, &options)?;
                let ranking = crate::ranking::rank_providers(&aggregation, code, metric);
                Ok((code.clone(), ranking.top_n(n).to_vec()))
            })
            .collect()
    }

    /// A provider's national rank under each metric, `None` where not ranked
    pub fn standing_under_both_metrics(
        session: &mut RankingSession,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<(RankingMetric, Option<usize>)>> {
        let previous = session.selection().metric;
        let mut standings = Vec::with_capacity(2);
        for metric in [RankingMetric::ServiceCount, RankingMetric::PaymentAmount] {
            session.set_metric(metric);
            let rank = session.lookup_provider(first_name, last_name)?.map(|idx| idx + 1);
            standings.push((metric, rank));
        }
        session.set_metric(previous);
        Ok(standings)
    }

    /// States with the most ranked providers
    pub fn busiest_states(ranking: &Ranking, limit: usize) -> Vec<(String, usize)> {
        RankingAnalytics::new(ranking).top_states_by_provider_count(limit)
    }
}
