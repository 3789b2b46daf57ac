//! Message selection.
//!
//! A [`Selector`] holds any number of [`Classifier`]s and selects a message
//! if at least one of them accepts it. An empty selector selects everything.
//!
//! Selections can also be declared in YAML:
//!
//! ```yaml
//! variables:
//!   - short_name: TMP
//!     level_code: 100
//!     level_values: [50000, 85000]
//!   - short_name: APCP
//!     time_descriptor: acc
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};
use crate::metadata::MetaData;

/// Boolean test over message metadata.
pub trait Classifier: Send + Sync {
    fn matches(&self, item: &MetaData) -> bool;
}

impl<F> Classifier for F
where
    F: Fn(&MetaData) -> bool + Send + Sync,
{
    fn matches(&self, item: &MetaData) -> bool {
        self(item)
    }
}

/// OR-combination of classifiers.
#[derive(Clone, Default)]
pub struct Selector {
    classifiers: Vec<Arc<dyn Classifier>>,
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("classifiers", &self.classifiers.len())
            .finish()
    }
}

impl Selector {
    /// Selector accepting every message.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<C: Classifier + 'static>(mut self, classifier: C) -> Self {
        self.push(classifier);
        self
    }

    pub fn push<C: Classifier + 'static>(&mut self, classifier: C) {
        self.classifiers.push(Arc::new(classifier));
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    pub fn matches(&self, item: &MetaData) -> bool {
        self.classifiers.is_empty() || self.classifiers.iter().any(|c| c.matches(item))
    }

    /// Selected messages of `items`, order preserved.
    pub fn select<'a, I>(&self, items: I) -> Vec<&'a MetaData>
    where
        I: IntoIterator<Item = &'a MetaData>,
    {
        items.into_iter().filter(|item| self.matches(item)).collect()
    }
}

/// One declarative selection rule. Every given field must match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRule {
    pub short_name: String,
    #[serde(default)]
    pub level_code: Option<u8>,
    /// Accepted bottom level values, in the level's native units.
    #[serde(default)]
    pub level_values: Option<Vec<f64>>,
    /// Word that must occur in the time descriptor, e.g. "acc" or "anl".
    #[serde(default)]
    pub time_descriptor: Option<String>,
}

impl Classifier for SelectionRule {
    fn matches(&self, item: &MetaData) -> bool {
        if item.varname != self.short_name {
            return false;
        }
        if self.level_code.is_some_and(|code| code != item.bot_level_code) {
            return false;
        }
        if let Some(values) = &self.level_values {
            let found = item
                .bot_level_value
                .is_some_and(|v| values.iter().any(|&allowed| (allowed - v).abs() < 1e-6));
            if !found {
                return false;
            }
        }
        match &self.time_descriptor {
            Some(word) => item.time_str.split_whitespace().any(|w| w == word),
            None => true,
        }
    }
}

/// Declarative variable selection, compiled into a [`Selector`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub variables: Vec<SelectionRule>,
}

impl SelectionConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        if let Some(rule) = config.variables.iter().find(|r| r.short_name.is_empty()) {
            return Err(DatasetError::invalid_config(format!(
                "selection rule without short_name: {:?}",
                rule
            )));
        }
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path).map_err(|e| {
            DatasetError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn into_selector(self) -> Selector {
        self.variables
            .into_iter()
            .fold(Selector::new(), |selector, rule| selector.with(rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::record;
    use std::path::Path;

    fn item(short_name: &str, level: &str, time: &str) -> MetaData {
        MetaData::from_record(Path::new("f.grib2"), &record(short_name, level, time)).unwrap()
    }

    #[test]
    fn test_empty_selector_selects_all() {
        let items = vec![item("TMP", "500 mb", "anl"), item("HGT", "500 mb", "anl")];
        assert_eq!(Selector::new().select(&items).len(), 2);
    }

    #[test]
    fn test_union_of_classifiers() {
        let items = vec![
            item("TMP", "500 mb", "anl"),
            item("HGT", "500 mb", "anl"),
            item("UGRD", "500 mb", "anl"),
        ];
        let selector = Selector::new()
            .with(|i: &MetaData| i.varname == "TMP")
            .with(|i: &MetaData| i.varname == "UGRD");

        let selected = selector.select(&items);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].varname, "TMP");
        assert_eq!(selected[1].varname, "UGRD");
    }

    #[test]
    fn test_selection_config() {
        let config = SelectionConfig::from_yaml_str(
            r#"
variables:
  - short_name: TMP
    level_code: 100
    level_values: [50000]
  - short_name: HGT
    time_descriptor: fcst
"#,
        )
        .unwrap();
        let selector = config.into_selector();
        assert_eq!(selector.len(), 2);

        assert!(selector.matches(&item("TMP", "500 mb", "anl")));
        assert!(!selector.matches(&item("UGRD", "500 mb", "anl")));
        assert!(selector.matches(&item("HGT", "500 mb", "12 hour fcst")));
        assert!(!selector.matches(&item("HGT", "500 mb", "anl")));

        let mut other_level = item("TMP", "700 mb", "anl");
        other_level.bot_level_value = Some(70000.0);
        assert!(!selector.matches(&other_level));
    }

    #[test]
    fn test_selection_config_rejects_unnamed_rule() {
        assert!(SelectionConfig::from_yaml_str("variables:\n  - short_name: ''\n").is_err());
    }
}
