/*!
 * Analytics over billing records and rankings
 *
 * Dataset-level counts (records per procedure, states, providers) and
 * ranking-level summaries (providers and services per state).
 */

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::{
    Result, MedrankError,
    data_types::*,
    display::state_name,
    ranking::Ranking,
};

fn add_services(total: &mut u64, services: u64, scope: &str) -> Result<()> {
    *total = total
        .checked_add(services)
        .ok_or_else(|| MedrankError::services_overflow(scope))?;
    Ok(())
}

/// Analytics engine over a slice of billing records
pub struct BillingAnalytics<'a> {
    records: &'a [BillingRecord],
}

impl<'a> BillingAnalytics<'a> {
    pub fn new(records: &'a [BillingRecord]) -> Self {
        Self { records }
    }

    /// Get basic statistics about the dataset
    pub fn dataset_stats(&self) -> Result<DatasetStats> {
        let procedures = self.record_count_by_procedure();
        let services_by_procedure = self.services_by_procedure()?;

        let unique_states = self
            .records
            .iter()
            .map(|r| r.state.to_uppercase())
            .collect::<HashSet<_>>()
            .len();

        let unique_provider_names = self
            .records
            .iter()
            .map(|r| (r.first_name.as_str(), r.last_name.as_str()))
            .collect::<HashSet<_>>()
            .len();

        let mut total_services = 0;
        for services in services_by_procedure.values() {
            add_services(&mut total_services, *services, "the whole dataset")?;
        }

        Ok(DatasetStats {
            total_records: self.records.len(),
            unique_procedures: procedures.len(),
            unique_states,
            unique_provider_names,
            total_services,
            records_by_procedure: procedures,
            services_by_procedure,
        })
    }

    /// Record count per procedure code
    pub fn record_count_by_procedure(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.records {
            *counts.entry(record.procedure_code.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Summed services per procedure code
    pub fn services_by_procedure(&self) -> Result<BTreeMap<String, u64>> {
        let mut totals = BTreeMap::new();
        for record in self.records {
            let total = totals.entry(record.procedure_code.clone()).or_insert(0);
            add_services(total, record.total_services, &format!("procedure {}", record.procedure_code))?;
        }
        Ok(totals)
    }
}

/// Summaries over a ranking
pub struct RankingAnalytics<'a> {
    ranking: &'a Ranking,
}

impl<'a> RankingAnalytics<'a> {
    pub fn new(ranking: &'a Ranking) -> Self {
        Self { ranking }
    }

    /// Provider count per state
    pub fn provider_count_by_state(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for provider in self.ranking.providers() {
            *counts.entry(provider.state.to_uppercase()).or_insert(0) += 1;
        }
        counts
    }

    /// Summed services per state
    pub fn services_by_state(&self) -> Result<HashMap<String, u64>> {
        let mut totals = HashMap::new();
        for provider in self.ranking.providers() {
            let state = provider.state.to_uppercase();
            let total = totals.entry(state.clone()).or_insert(0);
            add_services(total, provider.total_services, &format!("state {}", state))?;
        }
        Ok(totals)
    }

    /// Top N states by provider count; ties ordered by state code
    pub fn top_states_by_provider_count(&self, limit: usize) -> Vec<(String, usize)> {
        let mut state_counts: Vec<_> = self.provider_count_by_state().into_iter().collect();
        state_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        state_counts.truncate(limit);
        state_counts
    }

    /// Per-state leader (state rank 1), ordered by state code
    pub fn state_leaders(&self) -> Vec<&'a ProviderAggregate> {
        let mut leaders: Vec<&ProviderAggregate> = self
            .ranking
            .providers()
            .iter()
            .filter(|p| p.state_rank == 1)
            .collect();
        leaders.sort_by(|a, b| a.state.cmp(&b.state));
        leaders
    }

    /// Print a per-state table
    pub fn print_state_summary(&self, limit: usize) -> Result<()> {
        let services = self.services_by_state()?;
        println!("=== Providers by State ({}) ===", self.ranking.procedure);
        for (state, count) in self.top_states_by_provider_count(limit) {
            println!(
                "{:<22} {:>6} providers {:>10} services",
                format!("{} ({})", state_name(&state), state),
                count,
                services.get(&state).copied().unwrap_or(0)
            );
        }
        Ok(())
    }
}

/// Dataset statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStats {
    pub total_records: usize,
    pub unique_procedures: usize,
    pub unique_states: usize,
    pub unique_provider_names: usize,
    pub total_services: u64,
    pub records_by_procedure: BTreeMap<String, usize>,
    pub services_by_procedure: BTreeMap<String, u64>,
}

impl DatasetStats {
    /// Print a formatted summary of the statistics
    pub fn print_summary(&self) {
        println!("=== Billing Dataset Statistics ===");
        println!("Total Records: {}", self.total_records);
        println!("Distinct Providers (by name): {}", self.unique_provider_names);
        println!("States Represented: {}", self.unique_states);
        println!("Total Services: {}", self.total_services);
        println!("Procedures: {}", self.unique_procedures);
        for (code, count) in &self.records_by_procedure {
            let share = if self.total_records > 0 {
                (*count as f64 / self.total_records as f64) * 100.0
            } else {
                0.0
            };
            let label = ProcedureCode::new(code.as_str())
                .surgery_name()
                .map(|name| format!(" (total {})", name))
                .unwrap_or_default();
            let services = self.services_by_procedure.get(code).copied().unwrap_or(0);
            println!("  {}{}: {} records ({:.1}%), {} services", code, label, count, share, services);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{aggregate_providers, filter_by_procedure, rank_providers, AggregationOptions};

    fn record(first: &str, state: &str, code: &str, services: u64) -> BillingRecord {
        BillingRecord {
            procedure_code: code.to_string(),
            first_name: first.to_string(),
            last_name: "Test".to_string(),
            credentials: None,
            state: state.to_string(),
            total_services: services,
            rvu: 1.0,
            avg_submitted_charge: 1.0,
            avg_allowed_amount: 1.0,
            avg_paid_amount: 1.0,
            avg_standardized_amount: 1.0,
        }
    }

    fn records() -> Vec<BillingRecord> {
        vec![
            record("A", "CA", "27447", 10),
            record("B", "CA", "27447", 20),
            record("C", "ny", "27447", 5),
            record("A", "CA", "27130", 7),
        ]
    }

    fn rank(records: &[BillingRecord]) -> Ranking {
        let code = ProcedureCode::knee();
        let aggregation =
            aggregate_providers(filter_by_procedure(records, &code), &AggregationOptions::default()).unwrap();
        rank_providers(&aggregation, &code, RankingMetric::ServiceCount)
    }

    #[test]
    fn test_dataset_stats() {
        let records = records();
        let stats = BillingAnalytics::new(&records).dataset_stats().unwrap();
        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.unique_procedures, 2);
        assert_eq!(stats.unique_states, 2);
        assert_eq!(stats.unique_provider_names, 3);
        assert_eq!(stats.total_services, 42);
        assert_eq!(stats.records_by_procedure.get("27447"), Some(&3));
        assert_eq!(stats.services_by_procedure.get("27447"), Some(&35));
        assert_eq!(stats.services_by_procedure.get("27130"), Some(&7));
    }

    #[test]
    fn test_service_totals_overflow_is_an_error() {
        let records = vec![
            record("A", "CA", "27447", u64::MAX),
            record("B", "CA", "27130", 1),
        ];
        let analytics = BillingAnalytics::new(&records);
        assert!(analytics.services_by_procedure().is_ok());
        assert!(matches!(
            analytics.dataset_stats(),
            Err(MedrankError::DataValidation { .. })
        ));

        let ranking = rank(&[record("A", "CA", "27447", u64::MAX), record("B", "CA", "27447", 1)]);
        assert!(RankingAnalytics::new(&ranking).services_by_state().is_err());
    }

    #[test]
    fn test_ranking_summaries() {
        let ranking = rank(&records());
        let analytics = RankingAnalytics::new(&ranking);

        assert_eq!(analytics.top_states_by_provider_count(1), vec![("CA".to_string(), 2)]);
        assert_eq!(analytics.services_by_state().unwrap().get("NY"), Some(&5));

        let leaders: Vec<&str> = analytics.state_leaders().iter().map(|p| p.first_name.as_str()).collect();
        assert_eq!(leaders, vec!["B", "C"]);
    }
}
