//! Data models for the land price estimator.
//!
//! This module contains the core data structures used throughout
//! the application: comparable observations, estimates, backend
//! contracts, saved queries, and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A comparable parcel sale, as returned by the comparables lookup.
///
/// Every field is nullable on the wire; validity is decided by
/// [`Observation::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Asking or sale price in currency units.
    #[serde(default)]
    pub price: Option<f64>,
    /// Parcel area, in the same unit as the target area (acres).
    #[serde(default, rename = "acre")]
    pub area: Option<f64>,
    /// Display label, usually the street address.
    #[serde(default, rename = "address")]
    pub label: Option<String>,
}

/// Why an observation cannot contribute a unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    MissingPrice,
    MissingArea,
    ZeroArea,
    NonFinite,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::MissingPrice => write!(f, "missing price"),
            InvalidReason::MissingArea => write!(f, "missing area"),
            InvalidReason::ZeroArea => write!(f, "zero area"),
            InvalidReason::NonFinite => write!(f, "non-finite value"),
        }
    }
}

/// Validity tag for a single observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObservationStatus {
    /// Price and area are usable; carries `price / area`.
    Valid { unit_price: f64 },
    /// The observation is silently dropped before clustering.
    Invalid(InvalidReason),
}

impl Observation {
    /// Creates an observation with both price and area set.
    #[allow(dead_code)] // Builder utility
    pub fn new(price: f64, area: f64) -> Self {
        Self {
            price: Some(price),
            area: Some(area),
            label: None,
        }
    }

    /// Attaches a display label.
    #[allow(dead_code)] // Builder utility
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Classifies the observation. Signs are not checked: zero or
    /// negative prices still produce a unit price.
    pub fn validate(&self) -> ObservationStatus {
        let price = match self.price {
            Some(p) => p,
            None => return ObservationStatus::Invalid(InvalidReason::MissingPrice),
        };
        let area = match self.area {
            Some(a) => a,
            None => return ObservationStatus::Invalid(InvalidReason::MissingArea),
        };
        if !price.is_finite() || !area.is_finite() {
            return ObservationStatus::Invalid(InvalidReason::NonFinite);
        }
        if area == 0.0 {
            return ObservationStatus::Invalid(InvalidReason::ZeroArea);
        }

        let unit_price = price / area;
        if !unit_price.is_finite() {
            return ObservationStatus::Invalid(InvalidReason::NonFinite);
        }

        ObservationStatus::Valid { unit_price }
    }

    /// Returns the unit price if the observation is valid.
    pub fn unit_price(&self) -> Option<f64> {
        match self.validate() {
            ObservationStatus::Valid { unit_price } => Some(unit_price),
            ObservationStatus::Invalid(_) => None,
        }
    }
}

/// Everything the aggregator needs for one estimate.
#[derive(Debug, Clone, Default)]
pub struct EstimateInput {
    /// Comparable observations, in any order.
    pub observations: Vec<Observation>,
    /// Area of the parcel being priced.
    pub target_area: Option<f64>,
    /// Locality name, used only in the narrative.
    pub locality: String,
}

/// Summary statistics of the dominant cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStatistics {
    pub mean: f64,
    pub std_dev: f64,
    /// Coefficient of variation, `std_dev / mean`.
    pub cv: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// A complete price estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Mean price per unit area of the dominant cluster.
    pub mean_unit_price: f64,
    pub std_dev: f64,
    pub cv: f64,
    pub min: f64,
    pub max: f64,
    /// Members of the dominant cluster.
    pub cluster_size: usize,
    /// Number of valid unit prices.
    pub total_valid: usize,
    /// Valid unit prices outside the dominant cluster.
    pub outliers: usize,
    pub cluster_count: usize,
    /// Sizes of all clusters, in formation order.
    pub cluster_sizes: Vec<usize>,
    pub target_area: f64,
    /// `mean_unit_price * target_area`.
    pub projected_price: f64,
    /// Heuristic trust indicator in `[0, 100]`.
    pub confidence: f64,
    pub locality: String,
    pub narrative: String,
}

/// Comparables lookup request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparablesRequest {
    pub city: String,
    pub acres: f64,
    pub zip_code: String,
}

/// Comparables lookup response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparablesResponse {
    #[serde(default)]
    pub prices: Vec<Observation>,
}

/// Accepted shapes of a comparables JSON document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ComparablesDocument {
    Response(ComparablesResponse),
    List(Vec<Observation>),
}

impl ComparablesResponse {
    /// Parse either a `{"prices": [...]}` response or a bare array.
    pub fn from_json_str(content: &str) -> serde_json::Result<Self> {
        Ok(match serde_json::from_str(content)? {
            ComparablesDocument::Response(response) => response,
            ComparablesDocument::List(prices) => Self { prices },
        })
    }
}

/// Distance lookup request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceRequest {
    pub origins: String,
    pub destination: String,
}

/// Distance lookup response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceResponse {
    pub distance_text: String,
    /// Meters.
    pub distance_value: f64,
    pub duration_text: String,
    /// Seconds.
    pub duration_value: f64,
}

/// Backend health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// A stored user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub credits: u64,
}

/// A persisted property query with its estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyQuery {
    pub id: String,
    pub address: String,
    pub locality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    pub target_area: f64,
    pub comparables: Vec<Observation>,
    pub estimate: Estimate,
    pub created_at: DateTime<Utc>,
}

/// Process exit code: estimate produced, or non-estimate command done.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code: runtime error (config, network, credits, IO).
pub const EXIT_ERROR: i32 = 1;
/// Process exit code: not enough comparable data for an estimate.
pub const EXIT_INSUFFICIENT_DATA: i32 = 2;

/// Metadata about the estimate report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Address or label of the subject parcel.
    pub subject: String,
    pub locality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_area: Option<f64>,
    pub generated_at: DateTime<Utc>,
    pub comparables_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<DistanceResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_query_id: Option<String>,
}

/// The complete estimate report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub comparables: Vec<Observation>,
    /// `None` when there was not enough comparable data.
    pub estimate: Option<Estimate>,
    /// Reason shown when no estimate could be produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insufficient_reason: Option<String>,
}

impl Report {
    /// Exit code for a finished estimate run.
    pub fn exit_code(&self) -> i32 {
        if self.estimate.is_some() {
            EXIT_SUCCESS
        } else {
            EXIT_INSUFFICIENT_DATA
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid() {
        let obs = Observation::new(100000.0, 10.0);
        assert_eq!(
            obs.validate(),
            ObservationStatus::Valid {
                unit_price: 10000.0
            }
        );
    }

    #[test]
    fn test_validate_missing_fields() {
        let no_price = Observation {
            price: None,
            area: Some(5.0),
            label: None,
        };
        assert_eq!(
            no_price.validate(),
            ObservationStatus::Invalid(InvalidReason::MissingPrice)
        );

        let no_area = Observation {
            price: Some(5.0),
            area: None,
            label: None,
        };
        assert_eq!(
            no_area.validate(),
            ObservationStatus::Invalid(InvalidReason::MissingArea)
        );
    }

    #[test]
    fn test_validate_zero_area() {
        let obs = Observation::new(50000.0, 0.0);
        assert_eq!(
            obs.validate(),
            ObservationStatus::Invalid(InvalidReason::ZeroArea)
        );
        assert_eq!(obs.unit_price(), None);
    }

    #[test]
    fn test_validate_signed_values_pass() {
        assert_eq!(Observation::new(0.0, 4.0).unit_price(), Some(0.0));
        assert_eq!(Observation::new(-100.0, 4.0).unit_price(), Some(-25.0));
    }

    #[test]
    fn test_validate_non_finite() {
        let obs = Observation::new(f64::NAN, 1.0);
        assert_eq!(
            obs.validate(),
            ObservationStatus::Invalid(InvalidReason::NonFinite)
        );
    }

    #[test]
    fn test_comparables_response_nullable_fields() {
        let json = r#"{"prices": [
            {"acre": 10.0, "price": 100000.0, "address": "1 Main St"},
            {"acre": null, "price": 5.0},
            {}
        ]}"#;

        let response: ComparablesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.prices.len(), 3);
        assert_eq!(response.prices[0].label.as_deref(), Some("1 Main St"));
        assert_eq!(response.prices[0].area, Some(10.0));
        assert_eq!(response.prices[1].area, None);
        assert_eq!(response.prices[2], Observation::default());
    }

    #[test]
    fn test_comparables_from_bare_array() {
        let json = r#"[{"acre": 2.0, "price": 40000}, {"acre": 0, "price": 1}]"#;
        let response = ComparablesResponse::from_json_str(json).unwrap();
        assert_eq!(response.prices.len(), 2);
        assert_eq!(response.prices[0].unit_price(), Some(20000.0));

        let wrapped = ComparablesResponse::from_json_str(r#"{"prices": []}"#).unwrap();
        assert!(wrapped.prices.is_empty());

        assert!(ComparablesResponse::from_json_str("42").is_err());
    }

    #[test]
    fn test_observation_serializes_wire_names() {
        let obs = Observation::new(1.0, 2.0).with_label("Lot 4");
        let json = serde_json::to_string(&obs).unwrap();
        assert!(json.contains("\"acre\":2.0"));
        assert!(json.contains("\"address\":\"Lot 4\""));
    }

    #[test]
    fn test_report_exit_code() {
        let mut report = Report {
            metadata: ReportMetadata {
                subject: "12 Oak Rd".to_string(),
                locality: "Austin".to_string(),
                zip_code: None,
                target_area: Some(5.0),
                generated_at: Utc::now(),
                comparables_count: 0,
                distance: None,
                saved_query_id: None,
            },
            comparables: Vec::new(),
            estimate: None,
            insufficient_reason: Some("no valid unit prices".to_string()),
        };
        assert_eq!(report.exit_code(), EXIT_INSUFFICIENT_DATA);

        report.estimate = Some(Estimate {
            mean_unit_price: 10000.0,
            std_dev: 0.0,
            cv: 0.0,
            min: 10000.0,
            max: 10000.0,
            cluster_size: 1,
            total_valid: 1,
            outliers: 0,
            cluster_count: 1,
            cluster_sizes: vec![1],
            target_area: 5.0,
            projected_price: 50000.0,
            confidence: 100.0,
            locality: "Austin".to_string(),
            narrative: String::new(),
        });
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
    }
}
