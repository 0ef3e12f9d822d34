/*!
 * Column schema for CMS billing data files
 *
 * The source extracts carry many more columns (NPI, address, place of
 * service, ...); only the columns the aggregator reads are required.
 */

use crate::MedrankError;

/// Columns read from a CMS "by Provider and Service" extract
pub struct BillingSchema;

impl BillingSchema {
    pub const PROCEDURE_CODE: &'static str = "HCPCS_Cd";
    pub const FIRST_NAME: &'static str = "Rndrng_Prvdr_First_Name";
    pub const LAST_NAME: &'static str = "Rndrng_Prvdr_Last_Org_Name";
    pub const CREDENTIALS: &'static str = "Credentials";
    pub const STATE: &'static str = "State";
    pub const TOTAL_SERVICES: &'static str = "Tot_Srvcs";
    pub const RVU: &'static str = "rvu";
    pub const AVG_SUBMITTED_CHARGE: &'static str = "Avg_Sbmtd_Chrg";
    pub const AVG_ALLOWED_AMOUNT: &'static str = "Avg_Mdcr_Alowd_Amt";
    pub const AVG_PAID_AMOUNT: &'static str = "Avg_Mdcr_Pymt_Amt";
    pub const AVG_STANDARDIZED_AMOUNT: &'static str = "Avg_Mdcr_Stdzd_Amt";

    /// Every column the reader understands
    pub fn column_names() -> Vec<&'static str> {
        vec![
            Self::PROCEDURE_CODE,
            Self::FIRST_NAME,
            Self::LAST_NAME,
            Self::CREDENTIALS,
            Self::STATE,
            Self::TOTAL_SERVICES,
            Self::RVU,
            Self::AVG_SUBMITTED_CHARGE,
            Self::AVG_ALLOWED_AMOUNT,
            Self::AVG_PAID_AMOUNT,
            Self::AVG_STANDARDIZED_AMOUNT,
        ]
    }

    /// Columns that must be present; `Credentials` may be absent
    pub fn required_columns() -> Vec<&'static str> {
        Self::column_names()
            .into_iter()
            .filter(|c| *c != Self::CREDENTIALS)
            .collect()
    }

    /// Validate that a CSV header row contains every required column.
    ///
    /// Extra columns and column order are not checked.
    pub fn validate_headers(headers: &[String]) -> Result<(), MedrankError> {
        let missing: Vec<String> = Self::required_columns()
            .into_iter()
            .filter(|required| !headers.iter().any(|h| h.trim() == *required))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MedrankError::missing_columns(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_header_passes() {
        let cols = BillingSchema::column_names();
        assert!(BillingSchema::validate_headers(&headers(&cols)).is_ok());
    }

    #[test]
    fn test_credentials_optional_and_extras_ignored() {
        let mut cols = BillingSchema::required_columns();
        cols.push("Rndrng_NPI");
        assert!(BillingSchema::validate_headers(&headers(&cols)).is_ok());
    }

    #[test]
    fn test_missing_columns_reported() {
        let cols: Vec<&str> = BillingSchema::required_columns()
            .into_iter()
            .filter(|c| *c != "rvu" && *c != "State")
            .collect();
        match BillingSchema::validate_headers(&headers(&cols)) {
            Err(MedrankError::SchemaMismatch { missing_columns, .. }) => {
                assert_eq!(missing_columns, vec!["State".to_string(), "rvu".to_string()]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }
}
