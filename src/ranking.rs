/*!
 * Provider ranking pipeline
 *
 * Three pure stages run in sequence:
 *
 * 1. [`filter_by_procedure`] keeps the records of one procedure code.
 * 2. [`aggregate_providers`] merges records per provider identity.
 * 3. [`rank_providers`] orders providers nationally and within each state.
 *
 * Rankings are a total order: metric descending, then provider key ascending.
 */

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    Result, MedrankError,
    data_types::*,
};

/// Number of leading and trailing providers shown around a search result
pub const STANDINGS_EDGE: usize = 3;

/// Options controlling how records merge into providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregationOptions {
    pub identity: IdentityPolicy,
    pub averages: AveragePolicy,
}

/// Select the records billed under `code`, preserving input order
pub fn filter_by_procedure<'a>(records: &'a [BillingRecord], code: &ProcedureCode) -> Vec<&'a BillingRecord> {
    let filtered: Vec<&BillingRecord> = records
        .iter()
        .filter(|r| r.procedure_code == code.as_str())
        .collect();
    debug!("Procedure {} matched {} of {} records", code, filtered.len(), records.len());
    filtered
}

/// Providers merged from a set of records, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct ProviderAggregation {
    providers: Vec<ProviderAggregate>,
    index: HashMap<ProviderKey, usize>,
    /// Upper-cased state code -> positions in `providers`
    by_state: BTreeMap<String, Vec<usize>>,
}

impl ProviderAggregation {
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Aggregates in first-seen order
    pub fn providers(&self) -> &[ProviderAggregate] {
        &self.providers
    }

    /// State codes present, sorted
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.by_state.keys().map(String::as_str)
    }

    /// Aggregates in a state, in first-seen order
    pub fn in_state(&self, state: &str) -> Vec<&ProviderAggregate> {
        self.by_state
            .get(&state.to_uppercase())
            .map(|indices| indices.iter().map(|&idx| &self.providers[idx]).collect())
            .unwrap_or_default()
    }
}

/// Merge records into one aggregate per provider identity.
///
/// Services and RVUs are summed. The four average amounts follow
/// `options.averages`: with [`AveragePolicy::FirstRecord`] later records never
/// touch them; with [`AveragePolicy::ServiceWeighted`] they become the
/// services-weighted mean, falling back to the first record when the provider
/// has zero services in total.
///
/// Fails with [`MedrankError::DataValidation`] when a provider's summed
/// services overflow a `u64`.
pub fn aggregate_providers<'a, I>(records: I, options: &AggregationOptions) -> Result<ProviderAggregation>
where
    I: IntoIterator<Item = &'a BillingRecord>,
{
    let mut aggregation = ProviderAggregation::default();
    let mut weighted: Vec<AverageAmounts> = Vec::new();

    for record in records {
        let key = record.provider_key(options.identity);
        let weight = record.total_services as f64;

        match aggregation.index.get(&key) {
            Some(&idx) => {
                let existing = &mut aggregation.providers[idx];
                existing.total_services = existing
                    .total_services
                    .checked_add(record.total_services)
                    .ok_or_else(|| MedrankError::services_overflow(&existing.key))?;
                existing.rvu += record.rvu;
                existing.record_count += 1;
                weighted[idx].add(&record.averages().scaled(weight));
            }
            None => {
                let idx = aggregation.providers.len();
                let provider = ProviderAggregate::from_record(key.clone(), record);
                aggregation
                    .by_state
                    .entry(provider.state.to_uppercase())
                    .or_default()
                    .push(idx);
                aggregation.providers.push(provider);
                aggregation.index.insert(key, idx);
                weighted.push(record.averages().scaled(weight));
            }
        }
    }

    if options.averages == AveragePolicy::ServiceWeighted {
        for (provider, sums) in aggregation.providers.iter_mut().zip(&weighted) {
            if provider.total_services > 0 {
                provider.averages = sums.scaled(1.0 / provider.total_services as f64);
            }
        }
    }

    debug!(
        "Aggregated {} providers across {} states",
        aggregation.providers.len(),
        aggregation.by_state.len()
    );
    Ok(aggregation)
}

/// Ordering for `metric`: larger values first, ties broken by provider key
pub fn compare_by_metric(metric: RankingMetric, a: &ProviderAggregate, b: &ProviderAggregate) -> Ordering {
    let primary = match metric {
        RankingMetric::ServiceCount => b.total_services.cmp(&a.total_services),
        RankingMetric::PaymentAmount => b.averages.paid_amount.total_cmp(&a.averages.paid_amount),
    };
    primary.then_with(|| a.key.cmp(&b.key))
}

/// Rank every provider nationally and within its state
pub fn rank_providers(
    aggregation: &ProviderAggregation,
    procedure: &ProcedureCode,
    metric: RankingMetric,
) -> Ranking {
    let mut providers = aggregation.providers.clone();

    for indices in aggregation.by_state.values() {
        let mut cohort = indices.clone();
        cohort.sort_by(|&a, &b| compare_by_metric(metric, &providers[a], &providers[b]));
        for (position, idx) in cohort.into_iter().enumerate() {
            providers[idx].state_rank = position + 1;
        }
    }

    providers.sort_by(|a, b| compare_by_metric(metric, a, b));
    for (position, provider) in providers.iter_mut().enumerate() {
        provider.national_rank = position + 1;
    }

    debug!("Ranked {} providers by {}", providers.len(), metric.as_str());

    Ranking {
        procedure: procedure.clone(),
        metric,
        providers,
    }
}

/// Providers of one procedure ordered by one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub procedure: ProcedureCode,
    pub metric: RankingMetric,
    providers: Vec<ProviderAggregate>,
}

impl Ranking {
    /// Empty ranking for a procedure with no matching records
    pub fn empty(procedure: ProcedureCode, metric: RankingMetric) -> Self {
        Self {
            procedure,
            metric,
            providers: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// All providers in national order
    pub fn providers(&self) -> &[ProviderAggregate] {
        &self.providers
    }

    /// The first `n` providers nationally
    pub fn top_n(&self, n: usize) -> &[ProviderAggregate] {
        &self.providers[..n.min(self.providers.len())]
    }

    /// Ranking restricted to the providers matching `filter`.
    ///
    /// Providers keep the national and state ranks assigned here.
    pub fn filtered<F>(&self, filter: F) -> Ranking
    where
        F: Fn(&ProviderAggregate) -> bool,
    {
        Ranking {
            procedure: self.procedure.clone(),
            metric: self.metric,
            providers: self.providers.iter().filter(|p| filter(p)).cloned().collect(),
        }
    }

    /// Every provider in `state`, ordered by the ranking metric.
    ///
    /// Computed on each call; state codes compare case-insensitively.
    pub fn state_cohort(&self, state: &str) -> Vec<&ProviderAggregate> {
        let state = state.trim();
        let mut cohort: Vec<&ProviderAggregate> = self
            .providers
            .iter()
            .filter(|p| p.state.eq_ignore_ascii_case(state))
            .collect();
        cohort.sort_by(|a, b| compare_by_metric(self.metric, a, b));
        cohort
    }

    /// Zero-based index of the first provider named `first last`.
    ///
    /// Matching is exact after lowercasing, against the name with or without
    /// credentials. Returns `Ok(None)` when nobody matches and an
    /// `InvalidSearch` error when either name is blank.
    pub fn lookup(&self, first_name: &str, last_name: &str) -> Result<Option<usize>> {
        let first = first_name.trim();
        let last = last_name.trim();
        if first.is_empty() || last.is_empty() {
            return Err(MedrankError::blank_search_name());
        }

        let query = format!("{} {}", first, last).to_lowercase();
        Ok(self.providers.iter().position(|p| p.matches_name(&query)))
    }

    /// Rows to display around the provider at `index`.
    ///
    /// Shows the top three, the neighbours on either side of the provider and,
    /// when the provider sits well above the bottom, the last three. A gap
    /// row marks skipped ranks; no provider appears twice.
    pub fn standings(&self, index: usize) -> Vec<StandingsRow<'_>> {
        let total = self.providers.len();
        if index >= total {
            return Vec::new();
        }

        let mut wanted: Vec<usize> = (0..STANDINGS_EDGE.min(total)).collect();
        wanted.extend(index.saturating_sub(1)..=(index + 1).min(total - 1));

        let tail_start = total.saturating_sub(STANDINGS_EDGE);
        if index + 1 < tail_start {
            wanted.extend(tail_start..total);
        }

        wanted.sort_unstable();
        wanted.dedup();

        let mut rows = Vec::with_capacity(wanted.len() + 2);
        let mut previous: Option<usize> = None;
        for idx in wanted {
            if let Some(prev) = previous {
                if idx > prev + 1 {
                    rows.push(StandingsRow::Gap);
                }
            }
            rows.push(StandingsRow::Provider {
                rank: idx + 1,
                provider: &self.providers[idx],
                highlighted: idx == index,
            });
            previous = Some(idx);
        }
        rows
    }
}

/// One line of a standings view
#[derive(Debug, Clone, PartialEq)]
pub enum StandingsRow<'a> {
    Provider {
        rank: usize,
        provider: &'a ProviderAggregate,
        highlighted: bool,
    },
    /// Skipped ranks
    Gap,
}
