//! Coordinate and attribute containers shared by grids, templates and datasets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute map of a variable, coordinate or dataset.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Build an [`Attributes`] map from `(key, value)` pairs.
pub fn attrs<I, K, V>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<serde_json::Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Values of a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Values {
    Numeric(Vec<f64>),
    /// Durations in seconds.
    Period(Vec<i64>),
    Time(Vec<DateTime<Utc>>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Numeric(v) => v.len(),
            Values::Period(v) => v.len(),
            Values::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of a numeric value, compared with a relative tolerance.
    pub fn position_of_number(&self, value: f64) -> Option<usize> {
        match self {
            Values::Numeric(values) => values
                .iter()
                .position(|&v| (v - value).abs() <= 1e-9 * v.abs().max(1.0)),
            _ => None,
        }
    }

    pub fn position_of_period(&self, seconds: i64) -> Option<usize> {
        match self {
            Values::Period(values) => values.iter().position(|&v| v == seconds),
            _ => None,
        }
    }
}

/// A named coordinate: dimension names (empty for scalars), values and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub dims: Vec<String>,
    pub values: Values,
    #[serde(default)]
    pub attrs: Attributes,
}

impl Coordinate {
    /// One-dimensional coordinate along its own dimension.
    pub fn dimension(name: &str, values: Values, attrs: Attributes) -> Self {
        Self {
            dims: vec![name.to_string()],
            values,
            attrs,
        }
    }

    /// Scalar coordinate holding a single value.
    pub fn scalar(values: Values, attrs: Attributes) -> Self {
        Self {
            dims: Vec::new(),
            values,
            attrs,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions() {
        let levels = Values::Numeric(vec![70000.0, 50000.0]);
        assert_eq!(levels.position_of_number(50000.0), Some(1));
        assert_eq!(levels.position_of_number(50000.0 + 1e-7), Some(1));
        assert_eq!(levels.position_of_number(85000.0), None);
        assert_eq!(levels.position_of_period(0), None);

        let times = Values::Period(vec![0, 10800]);
        assert_eq!(times.position_of_period(10800), Some(1));
        assert_eq!(times.len(), 2);
    }

    #[test]
    fn test_values_serialization() {
        let json = serde_json::to_value(Values::Period(vec![3600])).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "period", "data": [3600]}));
    }
}
