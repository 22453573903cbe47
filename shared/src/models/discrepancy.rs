//! Discrepancy models

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded variance requiring human disposition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discrepancy {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub reason_category: ReasonCategory,
    pub status: DiscrepancyStatus,
    pub notes: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub lines: Vec<DiscrepancyLine>,
}

/// Per-product variance on a discrepancy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscrepancyLine {
    pub id: Uuid,
    pub discrepancy_id: Uuid,
    /// None only for an aggregate line without per-product data
    pub product_id: Option<Uuid>,
    /// Signed, negative = shortage
    pub qty_delta: Option<Decimal>,
    /// Signed, negative = shortage
    pub weight_delta_kg: Option<Decimal>,
    /// Set at resolution time
    pub disposition: Option<Disposition>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCategory {
    WeightVariance,
    QtyVariance,
    Damage,
    Other,
}

impl ReasonCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCategory::WeightVariance => "weight_variance",
            ReasonCategory::QtyVariance => "qty_variance",
            ReasonCategory::Damage => "damage",
            ReasonCategory::Other => "other",
        }
    }
}

impl FromStr for ReasonCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weight_variance" => Ok(ReasonCategory::WeightVariance),
            "qty_variance" => Ok(ReasonCategory::QtyVariance),
            "damage" => Ok(ReasonCategory::Damage),
            "other" => Ok(ReasonCategory::Other),
            _ => Err(format!("Unknown reason category: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyStatus {
    Open,
    UnderReview,
    Reopened,
    Resolved,
}

impl DiscrepancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyStatus::Open => "open",
            DiscrepancyStatus::UnderReview => "under_review",
            DiscrepancyStatus::Reopened => "reopened",
            DiscrepancyStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for DiscrepancyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(DiscrepancyStatus::Open),
            "under_review" => Ok(DiscrepancyStatus::UnderReview),
            "reopened" => Ok(DiscrepancyStatus::Reopened),
            "resolved" => Ok(DiscrepancyStatus::Resolved),
            _ => Err(format!("Unknown discrepancy status: {}", s)),
        }
    }
}

impl std::fmt::Display for DiscrepancyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal action for a discrepancy line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Apply the variance to the receiving branch on-hand stock
    Adjust,
    /// Write the variance off as an inventory loss
    Scrap,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Adjust => "adjust",
            Disposition::Scrap => "scrap",
        }
    }
}

impl FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adjust" => Ok(Disposition::Adjust),
            "scrap" => Ok(Disposition::Scrap),
            _ => Err(format!("Unknown disposition: {}", s)),
        }
    }
}

/// Manually entered discrepancy line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscrepancyLine {
    pub product_id: Uuid,
    pub qty_delta: Option<Decimal>,
    pub weight_delta_kg: Option<Decimal>,
    pub notes: Option<String>,
}

/// Manually raised discrepancy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscrepancy {
    pub reason_category: ReasonCategory,
    pub lines: Vec<NewDiscrepancyLine>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_string_forms() {
        for reason in [
            ReasonCategory::WeightVariance,
            ReasonCategory::QtyVariance,
            ReasonCategory::Damage,
            ReasonCategory::Other,
        ] {
            assert_eq!(reason.as_str().parse::<ReasonCategory>().unwrap(), reason);
        }
        for status in [
            DiscrepancyStatus::Open,
            DiscrepancyStatus::UnderReview,
            DiscrepancyStatus::Reopened,
            DiscrepancyStatus::Resolved,
        ] {
            assert_eq!(status.as_str().parse::<DiscrepancyStatus>().unwrap(), status);
        }
        assert_eq!("scrap".parse::<Disposition>().unwrap(), Disposition::Scrap);
        assert!("burn".parse::<Disposition>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&DiscrepancyStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
    }
}
