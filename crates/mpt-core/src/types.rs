use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::MptError;
use crate::MptResult;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// Capital fractions per asset, indexed in `AssetSet` order.
pub type Weights = Vec<f64>;

/// Ordered set of distinct asset identifiers.
///
/// The order fixes the index convention of every return vector, covariance
/// matrix and weight vector built against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AssetSet {
    names: Vec<String>,
}

impl AssetSet {
    pub fn new(names: Vec<String>) -> MptResult<Self> {
        if names.len() < 2 {
            return Err(MptError::InsufficientData(format!(
                "At least 2 assets required, got {}",
                names.len()
            )));
        }
        let mut seen = HashSet::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(MptError::InvalidInput {
                    field: format!("asset_names[{}]", i),
                    reason: "Asset identifier must not be blank".into(),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(MptError::InvalidInput {
                    field: format!("asset_names[{}]", i),
                    reason: format!("Duplicate asset identifier '{}'", name),
                });
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl TryFrom<Vec<String>> for AssetSet {
    type Error = MptError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        AssetSet::new(names)
    }
}

impl From<AssetSet> for Vec<String> {
    fn from(set: AssetSet) -> Self {
        set.names
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}
