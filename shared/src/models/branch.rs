//! Branch and product reference data

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A store or warehouse location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
}

/// A stocked product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub weight_unit: WeightUnit,
}

/// Unit a product is counted in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    G,
    Unit,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Kg => "kg",
            WeightUnit::G => "g",
            WeightUnit::Unit => "unit",
        }
    }
}

impl FromStr for WeightUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" => Ok(WeightUnit::Kg),
            "g" => Ok(WeightUnit::G),
            "unit" => Ok(WeightUnit::Unit),
            _ => Err(format!("Unknown weight unit: {}", s)),
        }
    }
}
