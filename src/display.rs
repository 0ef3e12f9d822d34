/*!
 * Text rendering for rankings
 *
 * Number formatting, state names and the provider cards printed by the CLI.
 */

use crate::data_types::*;
use crate::ranking::{Ranking, StandingsRow};

/// Shown in place of an empty state cohort
pub const NO_STATE_PROVIDERS: &str = "No providers found for this state.";

/// Shown in place of an empty ranking
pub const NO_PROVIDERS: &str = "No providers found for this procedure.";

const STATE_NAMES: &[(&str, &str)] = &[
    ("AK", "Alaska"), ("AL", "Alabama"), ("AR", "Arkansas"), ("AZ", "Arizona"),
    ("CA", "California"), ("CO", "Colorado"), ("CT", "Connecticut"),
    ("DC", "District of Columbia"), ("DE", "Delaware"), ("FL", "Florida"),
    ("GA", "Georgia"), ("HI", "Hawaii"), ("IA", "Iowa"), ("ID", "Idaho"),
    ("IL", "Illinois"), ("IN", "Indiana"), ("KS", "Kansas"), ("KY", "Kentucky"),
    ("LA", "Louisiana"), ("MA", "Massachusetts"), ("MD", "Maryland"), ("ME", "Maine"),
    ("MI", "Michigan"), ("MN", "Minnesota"), ("MO", "Missouri"), ("MS", "Mississippi"),
    ("MT", "Montana"), ("NC", "North Carolina"), ("ND", "North Dakota"),
    ("NE", "Nebraska"), ("NH", "New Hampshire"), ("NJ", "New Jersey"),
    ("NM", "New Mexico"), ("NV", "Nevada"), ("NY", "New York"), ("OH", "Ohio"),
    ("OK", "Oklahoma"), ("OR", "Oregon"), ("PA", "Pennsylvania"), ("RI", "Rhode Island"),
    ("SC", "South Carolina"), ("SD", "South Dakota"), ("TN", "Tennessee"), ("TX", "Texas"),
    ("UT", "Utah"), ("VA", "Virginia"), ("VT", "Vermont"), ("WA", "Washington"),
    ("WI", "Wisconsin"), ("WV", "West Virginia"), ("WY", "Wyoming"),
];

/// Full state name for a two-letter code; unknown codes come back unchanged
pub fn state_name(code: &str) -> String {
    let code = code.trim();
    STATE_NAMES
        .iter()
        .find(|(abbr, _)| abbr.eq_ignore_ascii_case(code))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn with_separators(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    match unsigned.split_once('.') {
        Some((int, frac)) => format!("{}{}.{}", sign, group_thousands(int), frac),
        None => format!("{}{}", sign, group_thousands(unsigned)),
    }
}

/// Shortest decimal form with thousands separators: `12345.5` -> `12,345.5`
pub fn format_number(value: f64) -> String {
    with_separators(&value.to_string())
}

/// Two decimals with thousands separators: `1234.5` -> `1,234.50`
pub fn format_currency(amount: f64) -> String {
    with_separators(&format!("{:.2}", amount))
}

/// Page headline for a procedure
pub fn procedure_headline(procedure: &ProcedureCode) -> String {
    match procedure.surgery_name() {
        Some(name) => format!("Who did the most total {} surgeries?", name),
        None => format!("Who billed the most for procedure {}?", procedure),
    }
}

/// Hint shown under the state view headline
pub fn state_view_subtitle(procedure: &ProcedureCode, limit: usize) -> String {
    match procedure.surgery_name() {
        Some(name) => format!("Pick a state to see the top {} providers for total {} surgeries", limit, name),
        None => format!("Pick a state to see the top {} providers for procedure {}", limit, procedure),
    }
}

/// Card for one provider; `rank` is the position shown first
pub fn render_card(provider: &ProviderAggregate, rank: usize, highlighted: bool) -> String {
    let marker = if highlighted { ">>" } else { "  " };
    format!(
        "{} #{:<5} #{} in {:<3} {}\n          Total Services: {}  RVU: {}  Avg Payment: ${}  Total Payment: ${}",
        marker,
        rank,
        provider.state_rank,
        provider.state,
        provider.display_name,
        provider.total_services,
        format_number(provider.rvu),
        format_currency(provider.averages.paid_amount),
        format_currency(provider.total_payment())
    )
}

/// Card for the state view: state rank first, national rank second
pub fn render_state_card(provider: &ProviderAggregate) -> String {
    format!(
        "#{} in {}  (#{} Full List)  {}\n          Total Services: {}  RVU: {}  Avg Payment: ${}  Total Payment: ${}",
        provider.state_rank,
        provider.state,
        provider.national_rank,
        provider.display_name,
        provider.total_services,
        format_number(provider.rvu),
        format_currency(provider.averages.paid_amount),
        format_currency(provider.total_payment())
    )
}

/// National top list
pub fn render_top(ranking: &Ranking, n: usize) -> String {
    let top = ranking.top_n(n);
    if top.is_empty() {
        return NO_PROVIDERS.to_string();
    }
    top.iter()
        .map(|p| render_card(p, p.national_rank, false))
        .collect::<Vec<_>>()
        .join("\n")
}

/// State cohort list, limited to `limit` providers
pub fn render_state(cohort: &[&ProviderAggregate], limit: usize) -> String {
    if cohort.is_empty() {
        return NO_STATE_PROVIDERS.to_string();
    }
    cohort
        .iter()
        .take(limit)
        .map(|p| render_state_card(p))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Standings rows around a searched provider
pub fn render_standings(rows: &[StandingsRow<'_>]) -> String {
    rows.iter()
        .map(|row| match row {
            StandingsRow::Provider { rank, provider, highlighted } => render_card(provider, *rank, *highlighted),
            StandingsRow::Gap => "   ...".to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Message for a name that is not in the current ranking
pub fn not_found_message(first_name: &str, last_name: &str) -> String {
    format!("Provider \"{} {}\" not found in the database.", first_name.trim(), last_name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1234.0), "1,234");
        assert_eq!(format_number(1234567.25), "1,234,567.25");
        assert_eq!(format_number(-4321.5), "-4,321.5");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "0.00");
        assert_eq!(format_currency(1234.5), "1,234.50");
        assert_eq!(format_currency(30000.0), "30,000.00");
        assert_eq!(format_currency(1234567.891), "1,234,567.89");
    }

    #[test]
    fn test_state_name() {
        assert_eq!(state_name("CA"), "California");
        assert_eq!(state_name("dc"), "District of Columbia");
        assert_eq!(state_name("PR"), "PR");
        assert_eq!(STATE_NAMES.len(), 51);
    }

    #[test]
    fn test_headlines() {
        assert_eq!(procedure_headline(&ProcedureCode::knee()), "Who did the most total knee surgeries?");
        assert_eq!(procedure_headline(&ProcedureCode::hip()), "Who did the most total hip surgeries?");
        assert!(state_view_subtitle(&ProcedureCode::from("99213"), 10).contains("99213"));
        assert_eq!(
            state_view_subtitle(&ProcedureCode::hip(), 25),
            "Pick a state to see the top 25 providers for total hip surgeries"
        );
    }

    #[test]
    fn test_render_card() {
        let record = BillingRecord {
            procedure_code: "27447".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            credentials: Some("MD".to_string()),
            state: "CA".to_string(),
            total_services: 25,
            rvu: 1234.5,
            avg_submitted_charge: 1.0,
            avg_allowed_amount: 1.0,
            avg_paid_amount: 1200.0,
            avg_standardized_amount: 1.0,
        };
        let mut provider = ProviderAggregate::from_record(record.provider_key(IdentityPolicy::Name), &record);
        provider.state_rank = 2;

        let card = render_card(&provider, 7, true);
        assert!(card.starts_with(">> #7"));
        assert!(card.contains("#2 in CA"));
        assert!(card.contains("Jane Doe, MD"));
        assert!(card.contains("RVU: 1,234.5"));
        assert!(card.contains("Total Payment: $30,000.00"));
        assert_eq!(card.lines().count(), 2);
    }

    #[test]
    fn test_empty_notices() {
        assert_eq!(render_state(&[], 10), NO_STATE_PROVIDERS);
        let ranking = Ranking::empty(ProcedureCode::knee(), RankingMetric::ServiceCount);
        assert_eq!(render_top(&ranking, 10), NO_PROVIDERS);
        assert_eq!(not_found_message(" Jane", "Doe "), "Provider \"Jane Doe\" not found in the database.");
    }
}
