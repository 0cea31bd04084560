//! Provider capability model and call contract types.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::health::state::HealthStatus;

/// Opaque provider payload, passed through the gateway untouched.
pub type NormalizedData = Map<String, Value>;

/// Kind of verification data a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckType {
    CriminalNational,
    CriminalCounty,
    CriminalFederal,
    SexOffenderRegistry,
    GlobalWatchlist,
    CreditReport,
    EmploymentVerification,
    EducationVerification,
    ProfessionalLicense,
    IdentityVerification,
    SsnTrace,
    MotorVehicleRecord,
    DrugScreening,
}

impl CheckType {
    /// All known check types, in declaration order.
    pub const ALL: [CheckType; 13] = [
        CheckType::CriminalNational,
        CheckType::CriminalCounty,
        CheckType::CriminalFederal,
        CheckType::SexOffenderRegistry,
        CheckType::GlobalWatchlist,
        CheckType::CreditReport,
        CheckType::EmploymentVerification,
        CheckType::EducationVerification,
        CheckType::ProfessionalLicense,
        CheckType::IdentityVerification,
        CheckType::SsnTrace,
        CheckType::MotorVehicleRecord,
        CheckType::DrugScreening,
    ];

    /// Wire name of the check type (`CRIMINAL_NATIONAL`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            CheckType::CriminalNational => "CRIMINAL_NATIONAL",
            CheckType::CriminalCounty => "CRIMINAL_COUNTY",
            CheckType::CriminalFederal => "CRIMINAL_FEDERAL",
            CheckType::SexOffenderRegistry => "SEX_OFFENDER_REGISTRY",
            CheckType::GlobalWatchlist => "GLOBAL_WATCHLIST",
            CheckType::CreditReport => "CREDIT_REPORT",
            CheckType::EmploymentVerification => "EMPLOYMENT_VERIFICATION",
            CheckType::EducationVerification => "EDUCATION_VERIFICATION",
            CheckType::ProfessionalLicense => "PROFESSIONAL_LICENSE",
            CheckType::IdentityVerification => "IDENTITY_VERIFICATION",
            CheckType::SsnTrace => "SSN_TRACE",
            CheckType::MotorVehicleRecord => "MOTOR_VEHICLE_RECORD",
            CheckType::DrugScreening => "DRUG_SCREENING",
        }
    }

    /// Category used to pick a freshness window.
    pub fn category(self) -> CheckCategory {
        match self {
            CheckType::CriminalNational
            | CheckType::CriminalCounty
            | CheckType::CriminalFederal
            | CheckType::SexOffenderRegistry
            | CheckType::GlobalWatchlist => CheckCategory::Criminal,
            CheckType::CreditReport => CheckCategory::Credit,
            CheckType::EmploymentVerification | CheckType::ProfessionalLicense => {
                CheckCategory::Employment
            }
            CheckType::EducationVerification => CheckCategory::Education,
            CheckType::IdentityVerification | CheckType::SsnTrace => CheckCategory::Identity,
            CheckType::MotorVehicleRecord | CheckType::DrugScreening => CheckCategory::Other,
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        CheckType::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown check type '{}'", s))
    }
}

/// Coarse grouping of check types sharing a freshness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Criminal,
    Credit,
    Employment,
    Education,
    Identity,
    Other,
}

/// Relative price band of a provider capability. Ordered cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostTier {
    Free,
    Low,
    Medium,
    High,
    Premium,
}

/// Commercial category of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderCategory {
    Core,
    Premium,
}

/// Service tier the caller is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceTier {
    #[default]
    Standard,
    Enhanced,
}

impl ServiceTier {
    /// Standard only sees core providers; enhanced also sees premium ones.
    pub fn allows(self, category: ProviderCategory) -> bool {
        match self {
            ServiceTier::Standard => category == ProviderCategory::Core,
            ServiceTier::Enhanced => true,
        }
    }
}

impl fmt::Display for ServiceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceTier::Standard => f.write_str("STANDARD"),
            ServiceTier::Enhanced => f.write_str("ENHANCED"),
        }
    }
}

impl FromStr for ServiceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ServiceTier::Standard),
            "enhanced" => Ok(ServiceTier::Enhanced),
            other => Err(format!("unknown service tier '{}'", other)),
        }
    }
}

/// What a provider can do for one check type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapability {
    pub check_type: CheckType,
    /// Supported locales. Empty means every locale.
    #[serde(default)]
    pub locales: HashSet<String>,
    pub cost_tier: CostTier,
    #[serde(default)]
    pub avg_latency_ms: u64,
    /// Observed reliability in `0.0..=1.0`.
    pub reliability_score: f64,
}

impl ProviderCapability {
    pub fn new(check_type: CheckType, cost_tier: CostTier, reliability_score: f64) -> Self {
        Self {
            check_type,
            locales: HashSet::new(),
            cost_tier,
            avg_latency_ms: 0,
            reliability_score,
        }
    }

    /// Restrict the capability to the given locales.
    pub fn with_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locales = locales.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_latency_ms(mut self, avg_latency_ms: u64) -> Self {
        self.avg_latency_ms = avg_latency_ms;
        self
    }

    pub fn supports_locale(&self, locale: &str) -> bool {
        self.locales.is_empty() || self.locales.iter().any(|l| l.eq_ignore_ascii_case(locale))
    }
}

/// Static metadata describing a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub category: ProviderCategory,
    #[serde(default)]
    pub capabilities: Vec<ProviderCapability>,
}

impl ProviderInfo {
    pub fn new(id: impl Into<String>, category: ProviderCategory) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category,
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: ProviderCapability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn capability_for(&self, check_type: CheckType) -> Option<&ProviderCapability> {
        self.capabilities.iter().find(|c| c.check_type == check_type)
    }
}

/// Outcome of a single provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub success: bool,
    pub normalized_data: Option<NormalizedData>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// Provider-declared: worth retrying on the same provider.
    pub retryable: bool,
    pub cost_incurred: Decimal,
}

impl CheckResult {
    pub fn success(data: NormalizedData, cost_incurred: Decimal) -> Self {
        Self {
            success: true,
            normalized_data: Some(data),
            error_code: None,
            error_message: None,
            retryable: false,
            cost_incurred,
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            success: false,
            normalized_data: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
            retryable,
            cost_incurred: Decimal::ZERO,
        }
    }
}

/// Result of a provider health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_type_parse() {
        assert_eq!("CRIMINAL_NATIONAL".parse::<CheckType>().unwrap(), CheckType::CriminalNational);
        assert_eq!("credit-report".parse::<CheckType>().unwrap(), CheckType::CreditReport);
        assert!("HOROSCOPE".parse::<CheckType>().is_err());
    }

    #[test]
    fn test_check_type_serde_matches_display() {
        for check in CheckType::ALL {
            let json = serde_json::to_string(&check).unwrap();
            assert_eq!(json, format!("\"{}\"", check));
        }
    }

    #[test]
    fn test_cost_tier_ordering() {
        assert!(CostTier::Free < CostTier::Low);
        assert!(CostTier::Low < CostTier::Medium);
        assert!(CostTier::High < CostTier::Premium);
    }

    #[test]
    fn test_tier_visibility() {
        assert!(ServiceTier::Standard.allows(ProviderCategory::Core));
        assert!(!ServiceTier::Standard.allows(ProviderCategory::Premium));
        assert!(ServiceTier::Enhanced.allows(ProviderCategory::Premium));
    }

    #[test]
    fn test_locale_support() {
        let any = ProviderCapability::new(CheckType::CreditReport, CostTier::Low, 0.9);
        assert!(any.supports_locale("FR"));

        let us_only = any.clone().with_locales(["US"]);
        assert!(us_only.supports_locale("us"));
        assert!(!us_only.supports_locale("CA"));
    }
}
