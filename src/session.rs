/*!
 * Ranking session: the single owner of the current selection and derived rankings
 *
 * A session holds the loaded billing records, the active procedure and
 * metric, and the ranking derived from them. Changing the procedure reruns
 * filter, aggregation and ranking; changing the metric reruns ranking only.
 */

use log::info;

use crate::{
    Result,
    data_types::*,
    dataset::BillingDataset,
    ranking::{self, AggregationOptions, ProviderAggregation, Ranking, StandingsRow},
    selection::Selection,
};

/// Controller over one dataset
pub struct RankingSession {
    dataset: BillingDataset,
    options: AggregationOptions,
    selection: Selection,
    aggregation: ProviderAggregation,
    ranking: Ranking,
}

impl RankingSession {
    /// Create a session and derive the ranking for `selection`
    pub fn new(dataset: BillingDataset, selection: Selection, options: AggregationOptions) -> Result<Self> {
        let aggregation = Self::aggregate(&dataset, &selection.procedure, &options)?;
        let ranking = ranking::rank_providers(&aggregation, &selection.procedure, selection.metric);

        Ok(Self {
            dataset,
            options,
            selection,
            aggregation,
            ranking,
        })
    }

    fn aggregate(
        dataset: &BillingDataset,
        procedure: &ProcedureCode,
        options: &AggregationOptions,
    ) -> Result<ProviderAggregation> {
        let filtered = ranking::filter_by_procedure(dataset.records(), procedure);
        ranking::aggregate_providers(filtered, options)
    }

    /// Switch procedure; rebuilds aggregation and ranking.
    ///
    /// On error the session keeps its previous procedure and ranking.
    pub fn set_procedure(&mut self, procedure: ProcedureCode) -> Result<()> {
        info!("Switching procedure {} -> {}", self.selection.procedure, procedure);
        self.aggregation = Self::aggregate(&self.dataset, &procedure, &self.options)?;
        self.selection.procedure = procedure;
        self.rerank();
        Ok(())
    }

    /// Switch ranking metric; rebuilds the ranking from the current aggregation
    pub fn set_metric(&mut self, metric: RankingMetric) {
        info!("Switching ranking metric {} -> {}", self.selection.metric.as_str(), metric.as_str());
        self.selection.metric = metric;
        self.rerank();
    }

    /// Change aggregation policies; rebuilds aggregation and ranking
    pub fn set_options(&mut self, options: AggregationOptions) -> Result<()> {
        self.aggregation = Self::aggregate(&self.dataset, &self.selection.procedure, &options)?;
        self.options = options;
        self.rerank();
        Ok(())
    }

    fn rerank(&mut self) {
        self.ranking = ranking::rank_providers(&self.aggregation, &self.selection.procedure, self.selection.metric);
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn options(&self) -> &AggregationOptions {
        &self.options
    }

    pub fn dataset(&self) -> &BillingDataset {
        &self.dataset
    }

    /// Current national ranking
    pub fn ranking(&self) -> &Ranking {
        &self.ranking
    }

    /// Current aggregation, before ranking
    pub fn aggregation(&self) -> &ProviderAggregation {
        &self.aggregation
    }

    /// Zero-based national index of a provider, or `None` if not in the current ranking
    pub fn lookup_provider(&self, first_name: &str, last_name: &str) -> Result<Option<usize>> {
        self.ranking.lookup(first_name, last_name)
    }

    /// Providers of a state ordered by the active metric
    pub fn state_cohort(&self, state: &str) -> Vec<&ProviderAggregate> {
        self.ranking.state_cohort(state)
    }

    /// National top `n`
    pub fn top_n(&self, n: usize) -> &[ProviderAggregate] {
        self.ranking.top_n(n)
    }

    /// Standings rows around a searched provider
    pub fn standings(&self, index: usize) -> Vec<StandingsRow<'_>> {
        self.ranking.standings(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(first: &str, last: &str, state: &str, code: &str, services: u64, paid: f64) -> BillingRecord {
        BillingRecord {
            procedure_code: code.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            credentials: None,
            state: state.to_string(),
            total_services: services,
            rvu: 1.0,
            avg_submitted_charge: 1.0,
            avg_allowed_amount: 1.0,
            avg_paid_amount: paid,
            avg_standardized_amount: 1.0,
        }
    }

    fn session() -> RankingSession {
        let records = vec![
            record("Jane", "Doe", "CA", "27447", 10, 500.0),
            record("Jane", "Doe", "CA", "27447", 15, 900.0),
            record("Bob", "Roe", "CA", "27447", 20, 800.0),
            record("Ann", "Lee", "TX", "27130", 30, 700.0),
        ];
        RankingSession::new(
            BillingDataset::new(records),
            Selection::default(),
            AggregationOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_ranking_uses_selection() {
        let session = session();
        assert_eq!(session.selection().procedure, ProcedureCode::knee());
        let names: Vec<&str> = session.top_n(10).iter().map(|p| p.first_name.as_str()).collect();
        assert_eq!(names, vec!["Jane", "Bob"]);
        assert_eq!(session.ranking().providers()[0].total_services, 25);
    }

    #[test]
    fn test_metric_toggle_round_trip() {
        let mut session = session();
        let original = session.ranking().clone();

        session.set_metric(RankingMetric::PaymentAmount);
        let names: Vec<&str> = session.top_n(10).iter().map(|p| p.first_name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Jane"]);

        session.set_metric(RankingMetric::ServiceCount);
        assert_eq!(session.ranking(), &original);
    }

    #[test]
    fn test_procedure_switch_rebuilds() {
        let mut session = session();
        session.set_procedure(ProcedureCode::hip()).unwrap();
        assert_eq!(session.ranking().len(), 1);
        assert_eq!(session.lookup_provider("jane", "doe").unwrap(), None);
        assert_eq!(session.lookup_provider("ann", "lee").unwrap(), Some(0));
        assert_eq!(session.state_cohort("TX").len(), 1);

        session.set_procedure(ProcedureCode::from("00000")).unwrap();
        assert!(session.ranking().is_empty());
        assert!(session.aggregation().is_empty());
    }

    #[test]
    fn test_failed_procedure_switch_keeps_ranking() {
        let records = vec![
            record("Jane", "Doe", "CA", "27447", 10, 500.0),
            record("Ann", "Lee", "TX", "27130", u64::MAX, 700.0),
            record("Ann", "Lee", "TX", "27130", 1, 700.0),
        ];
        let mut session = RankingSession::new(
            BillingDataset::new(records),
            Selection::default(),
            AggregationOptions::default(),
        )
        .unwrap();
        let before = session.ranking().clone();

        assert!(session.set_procedure(ProcedureCode::hip()).is_err());
        assert_eq!(session.selection().procedure, ProcedureCode::knee());
        assert_eq!(session.ranking(), &before);
    }
}
