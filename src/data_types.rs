/*!
 * Data type definitions for Medicare billing records and provider rankings
 *
 * Field names of `BillingRecord` follow the CMS "Medicare Physician & Other
 * Practitioners - by Provider and Service" column names, so the published
 * JSON and CSV extracts deserialize without a mapping step.
 */

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{MedrankError, Result};

/// Largest accepted `Tot_Srvcs`; every count up to here is exact as an `f64`
pub const MAX_SERVICE_COUNT: u64 = 1 << 53;

/// HCPCS procedure code (e.g. `27447` total knee arthroplasty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcedureCode(pub String);

impl ProcedureCode {
    /// Total knee arthroplasty
    pub const TOTAL_KNEE: &'static str = "27447";
    /// Total hip arthroplasty
    pub const TOTAL_HIP: &'static str = "27130";

    pub fn new(code: impl Into<String>) -> Self {
        ProcedureCode(code.into().trim().to_string())
    }

    pub fn knee() -> Self {
        Self::new(Self::TOTAL_KNEE)
    }

    pub fn hip() -> Self {
        Self::new(Self::TOTAL_HIP)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short surgery name for the well-known codes
    pub fn surgery_name(&self) -> Option<&'static str> {
        match self.0.as_str() {
            Self::TOTAL_KNEE => Some("knee"),
            Self::TOTAL_HIP => Some("hip"),
            _ => None,
        }
    }
}

impl Default for ProcedureCode {
    fn default() -> Self {
        Self::knee()
    }
}

impl fmt::Display for ProcedureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProcedureCode {
    fn from(code: &str) -> Self {
        ProcedureCode::new(code)
    }
}

/// Metric used to order providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RankingMetric {
    /// Summed total services across the provider's records
    #[default]
    #[serde(rename = "services", alias = "service_count")]
    ServiceCount,
    /// Average Medicare paid amount
    #[serde(rename = "payment", alias = "payment_amount")]
    PaymentAmount,
}

impl RankingMetric {
    /// The other metric
    pub fn toggled(&self) -> Self {
        match self {
            RankingMetric::ServiceCount => RankingMetric::PaymentAmount,
            RankingMetric::PaymentAmount => RankingMetric::ServiceCount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingMetric::ServiceCount => "services",
            RankingMetric::PaymentAmount => "payment",
        }
    }
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingMetric::ServiceCount => write!(f, "Total Services"),
            RankingMetric::PaymentAmount => write!(f, "Avg Payment"),
        }
    }
}

impl FromStr for RankingMetric {
    type Err = MedrankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "services" | "service_count" | "service-count" => Ok(RankingMetric::ServiceCount),
            "payment" | "payment_amount" | "payment-amount" => Ok(RankingMetric::PaymentAmount),
            other => Err(MedrankError::invalid_metric(other)),
        }
    }
}

/// How providers are told apart during aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityPolicy {
    /// First and last name only; same-named providers in different states merge
    #[default]
    Name,
    /// First name, last name and state
    NameAndState,
}

/// How the four per-record average amounts are combined when records merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AveragePolicy {
    /// Keep the averages of the first record seen for the provider
    #[default]
    FirstRecord,
    /// Services-weighted mean across all merged records
    ServiceWeighted,
}

/// One row of CMS billing data: a provider, a procedure, and its volume and amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    #[serde(rename = "HCPCS_Cd", deserialize_with = "de_trimmed")]
    pub procedure_code: String,
    #[serde(rename = "Rndrng_Prvdr_First_Name", deserialize_with = "de_trimmed")]
    pub first_name: String,
    #[serde(rename = "Rndrng_Prvdr_Last_Org_Name", deserialize_with = "de_trimmed")]
    pub last_name: String,
    #[serde(rename = "Credentials", default, deserialize_with = "de_optional_text")]
    pub credentials: Option<String>,
    #[serde(rename = "State", deserialize_with = "de_trimmed")]
    pub state: String,
    #[serde(rename = "Tot_Srvcs", deserialize_with = "de_count")]
    pub total_services: u64,
    #[serde(rename = "rvu", deserialize_with = "de_amount")]
    pub rvu: f64,
    #[serde(rename = "Avg_Sbmtd_Chrg", deserialize_with = "de_amount")]
    pub avg_submitted_charge: f64,
    #[serde(rename = "Avg_Mdcr_Alowd_Amt", deserialize_with = "de_amount")]
    pub avg_allowed_amount: f64,
    #[serde(rename = "Avg_Mdcr_Pymt_Amt", deserialize_with = "de_amount")]
    pub avg_paid_amount: f64,
    #[serde(rename = "Avg_Mdcr_Stdzd_Amt", deserialize_with = "de_amount")]
    pub avg_standardized_amount: f64,
}

impl BillingRecord {
    /// Check the invariants the aggregator relies on.
    ///
    /// Serde already rejects missing or non-numeric fields; this catches values
    /// that parse but would corrupt sums.
    pub fn validate(&self, record_index: Option<usize>) -> Result<()> {
        for (field, value) in [("HCPCS_Cd", &self.procedure_code), ("State", &self.state)] {
            if value.is_empty() {
                return Err(MedrankError::invalid_field(field, None, "is empty", record_index));
            }
        }
        if self.first_name.is_empty() && self.last_name.is_empty() {
            return Err(MedrankError::invalid_field(
                "Rndrng_Prvdr_Last_Org_Name",
                None,
                "is empty (and so is the first name)",
                record_index,
            ));
        }

        let amounts = [
            ("rvu", self.rvu),
            ("Avg_Sbmtd_Chrg", self.avg_submitted_charge),
            ("Avg_Mdcr_Alowd_Amt", self.avg_allowed_amount),
            ("Avg_Mdcr_Pymt_Amt", self.avg_paid_amount),
            ("Avg_Mdcr_Stdzd_Amt", self.avg_standardized_amount),
        ];
        for (field, value) in amounts {
            if !value.is_finite() {
                return Err(MedrankError::invalid_field(field, Some(value.to_string()), "must be finite", record_index));
            }
            if value < 0.0 {
                return Err(MedrankError::invalid_field(field, Some(value.to_string()), "must be non-negative", record_index));
            }
        }
        Ok(())
    }

    /// Averages carried by this record
    pub fn averages(&self) -> AverageAmounts {
        AverageAmounts {
            submitted_charge: self.avg_submitted_charge,
            allowed_amount: self.avg_allowed_amount,
            paid_amount: self.avg_paid_amount,
            standardized_amount: self.avg_standardized_amount,
        }
    }

    /// Identity key of the provider on this record
    pub fn provider_key(&self, policy: IdentityPolicy) -> ProviderKey {
        ProviderKey {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            state: match policy {
                IdentityPolicy::Name => None,
                IdentityPolicy::NameAndState => Some(self.state.to_uppercase()),
            },
        }
    }
}

/// Per-service average amounts in dollars
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AverageAmounts {
    pub submitted_charge: f64,
    pub allowed_amount: f64,
    pub paid_amount: f64,
    pub standardized_amount: f64,
}

impl AverageAmounts {
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            submitted_charge: self.submitted_charge * factor,
            allowed_amount: self.allowed_amount * factor,
            paid_amount: self.paid_amount * factor,
            standardized_amount: self.standardized_amount * factor,
        }
    }

    pub fn add(&mut self, other: &AverageAmounts) {
        self.submitted_charge += other.submitted_charge;
        self.allowed_amount += other.allowed_amount;
        self.paid_amount += other.paid_amount;
        self.standardized_amount += other.standardized_amount;
    }
}

/// Composite provider identity.
///
/// Ordering is (first name, last name, state), which is also the ranking tie-break.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderKey {
    pub first_name: String,
    pub last_name: String,
    pub state: Option<String>,
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => write!(f, "{} {} ({})", self.first_name, self.last_name, state),
            None => write!(f, "{} {}", self.first_name, self.last_name),
        }
    }
}

/// A provider's billing totals for one procedure, with its ranks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderAggregate {
    #[serde(skip)]
    pub key: ProviderKey,
    pub first_name: String,
    pub last_name: String,
    pub credentials: Option<String>,
    pub display_name: String,
    pub state: String,
    pub total_services: u64,
    pub rvu: f64,
    pub averages: AverageAmounts,
    /// Number of billing records merged into this aggregate
    pub record_count: usize,
    /// 1-based national position; 0 until ranked
    pub national_rank: usize,
    /// 1-based position within the state; 0 until ranked
    pub state_rank: usize,
}

impl ProviderAggregate {
    /// Start an aggregate from the first record seen for a provider
    pub fn from_record(key: ProviderKey, record: &BillingRecord) -> Self {
        let display_name = match &record.credentials {
            Some(cred) => format!("{} {}, {}", record.first_name, record.last_name, cred),
            None => format!("{} {}", record.first_name, record.last_name),
        };

        Self {
            key,
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            credentials: record.credentials.clone(),
            display_name,
            state: record.state.clone(),
            total_services: record.total_services,
            rvu: record.rvu,
            averages: record.averages(),
            record_count: 1,
            national_rank: 0,
            state_rank: 0,
        }
    }

    /// Name without credentials
    pub fn bare_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Services multiplied by the average Medicare payment
    pub fn total_payment(&self) -> f64 {
        self.total_services as f64 * self.averages.paid_amount
    }

    /// Case-insensitive match against either the display name or the bare name
    pub fn matches_name(&self, query_lower: &str) -> bool {
        self.display_name.to_lowercase() == query_lower
            || self.bare_name().to_lowercase() == query_lower
    }
}

// Lenient numeric deserialization: CMS extracts carry numbers both as JSON
// numbers and as quoted strings.

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Integer(u64),
    Number(f64),
    Text(String),
}

fn de_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Integer(n) => Ok(n as f64),
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => parse_amount(&s),
    }
}

fn parse_amount<E: serde::de::Error>(text: &str) -> std::result::Result<f64, E> {
    text.trim()
        .replace(',', "")
        .parse::<f64>()
        .map_err(|_| E::custom(format!("expected a number, found '{}'", text)))
}

fn de_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Integer(n) => n,
        NumberOrText::Number(n) => whole_count(n)?,
        NumberOrText::Text(s) => match s.trim().replace(',', "").parse::<u64>() {
            Ok(n) => n,
            Err(_) => whole_count(parse_amount(&s)?)?,
        },
    };
    if count > MAX_SERVICE_COUNT {
        return Err(serde::de::Error::custom(format!(
            "service count {} exceeds the supported maximum of {}",
            count, MAX_SERVICE_COUNT
        )));
    }
    Ok(count)
}

fn whole_count<E: serde::de::Error>(value: f64) -> std::result::Result<u64, E> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > MAX_SERVICE_COUNT as f64 {
        return Err(E::custom(format!(
            "expected a whole number of services between 0 and {}, found {}",
            MAX_SERVICE_COUNT, value
        )));
    }
    Ok(value as u64)
}

fn de_trimmed<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

fn de_optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "HCPCS_Cd": "27447",
            "Rndrng_Prvdr_First_Name": "Jane",
            "Rndrng_Prvdr_Last_Org_Name": "Doe",
            "Credentials": "M.D.",
            "State": "CA",
            "Tot_Srvcs": 10,
            "rvu": 20.5,
            "Avg_Sbmtd_Chrg": "5000.00",
            "Avg_Mdcr_Alowd_Amt": 1400.25,
            "Avg_Mdcr_Pymt_Amt": 1100.5,
            "Avg_Mdcr_Stdzd_Amt": 1050
        })
    }

    #[test]
    fn test_record_deserializes_mixed_numbers() {
        let record: BillingRecord = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(record.total_services, 10);
        assert_eq!(record.avg_submitted_charge, 5000.0);
        assert_eq!(record.credentials.as_deref(), Some("M.D."));
        assert!(record.validate(None).is_ok());
    }

    #[test]
    fn test_missing_numeric_field_fails() {
        let mut value = sample_json();
        value.as_object_mut().unwrap().remove("Tot_Srvcs");
        let result: std::result::Result<BillingRecord, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn test_fractional_services_rejected() {
        let mut value = sample_json();
        value["Tot_Srvcs"] = serde_json::json!(2.5);
        let result: std::result::Result<BillingRecord, _> = serde_json::from_value(value);
        assert!(result.is_err());

        let mut value = sample_json();
        value["Tot_Srvcs"] = serde_json::json!("12.0");
        let record: BillingRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.total_services, 12);
    }

    #[test]
    fn test_service_counts_stay_exact() {
        let mut value = sample_json();
        value["Tot_Srvcs"] = serde_json::json!(MAX_SERVICE_COUNT);
        let record: BillingRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.total_services, 9_007_199_254_740_992);

        let mut value = sample_json();
        value["Tot_Srvcs"] = serde_json::json!("1,250");
        let record: BillingRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.total_services, 1250);
    }

    #[test]
    fn test_oversized_service_counts_rejected() {
        for too_big in [
            serde_json::json!(1e30),
            serde_json::json!(9_007_199_254_740_993u64),
            serde_json::json!(10_000_000_000_000_000_000u64),
            serde_json::json!("18446744073709551616"),
            serde_json::json!(-3),
        ] {
            let mut value = sample_json();
            value["Tot_Srvcs"] = too_big.clone();
            let result: std::result::Result<BillingRecord, _> = serde_json::from_value(value);
            assert!(result.is_err(), "accepted {}", too_big);
        }
    }

    #[test]
    fn test_blank_credentials_become_none() {
        let mut value = sample_json();
        value["Credentials"] = serde_json::json!("  ");
        let record: BillingRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.credentials, None);

        let mut value = sample_json();
        value.as_object_mut().unwrap().remove("Credentials");
        let record: BillingRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.credentials, None);
    }

    #[test]
    fn test_negative_amount_fails_validation() {
        let mut record: BillingRecord = serde_json::from_value(sample_json()).unwrap();
        record.rvu = -1.0;
        assert!(record.validate(Some(3)).is_err());
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("services".parse::<RankingMetric>().unwrap(), RankingMetric::ServiceCount);
        assert_eq!("Payment".parse::<RankingMetric>().unwrap(), RankingMetric::PaymentAmount);
        assert_eq!("payment_amount".parse::<RankingMetric>().unwrap(), RankingMetric::PaymentAmount);
        assert!("volume".parse::<RankingMetric>().is_err());
        assert_eq!(RankingMetric::ServiceCount.toggled(), RankingMetric::PaymentAmount);
    }

    #[test]
    fn test_display_name_and_identity() {
        let record: BillingRecord = serde_json::from_value(sample_json()).unwrap();
        let key = record.provider_key(IdentityPolicy::Name);
        let aggregate = ProviderAggregate::from_record(key.clone(), &record);
        assert_eq!(aggregate.display_name, "Jane Doe, M.D.");
        assert_eq!(key.to_string(), "Jane Doe");
        assert!(aggregate.matches_name("jane doe"));
        assert!(aggregate.matches_name("jane doe, m.d."));
        assert_eq!(record.provider_key(IdentityPolicy::NameAndState).to_string(), "Jane Doe (CA)");
    }

    #[test]
    fn test_procedure_code_names() {
        assert_eq!(ProcedureCode::knee().surgery_name(), Some("knee"));
        assert_eq!(ProcedureCode::from(" 27130 ").surgery_name(), Some("hip"));
        assert_eq!(ProcedureCode::from("99213").surgery_name(), None);
    }
}
