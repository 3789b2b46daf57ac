//! Configuration for inventory handling and assembly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::OpenOptions;
use crate::processing::ProcessingTable;
use crate::template::{TemplateOptions, VertLevelClass};

/// Settings shared by template building and dataset assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Directory for inventory files. Inventories sit next to their GRIB2
    /// file when unset.
    pub inventory_dir: Option<PathBuf>,

    /// Write inventories of scanned files.
    pub save_inventory: bool,

    /// Assemble reference time slices in parallel.
    pub parallel: bool,
}

impl AssemblyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRIB2_INVENTORY_DIR") {
            if !val.trim().is_empty() {
                config.inventory_dir = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("GRIB2_SAVE_INVENTORY") {
            config.save_inventory = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("GRIB2_PARALLEL") {
            config.parallel = parse_bool(&val);
        }

        config
    }

    pub fn template_options(
        &self,
        vertlevels: Vec<VertLevelClass>,
        processing: ProcessingTable,
    ) -> TemplateOptions {
        TemplateOptions {
            reftime: None,
            vertlevels,
            inventory_dir: self.inventory_dir.clone(),
            save_inventory: self.save_inventory,
            processing,
        }
    }

    pub fn open_options(&self) -> OpenOptions {
        OpenOptions {
            inventory_dir: self.inventory_dir.clone(),
            save_inventory: self.save_inventory,
            parallel: self.parallel,
            ..OpenOptions::default()
        }
    }
}

fn parse_bool(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("yes"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn test_options_carry_settings() {
        let config = AssemblyConfig {
            inventory_dir: Some(PathBuf::from("/var/cache/inv")),
            save_inventory: true,
            parallel: true,
        };

        let open = config.open_options();
        assert_eq!(open.inventory_dir, config.inventory_dir);
        assert!(open.save_inventory && open.parallel);
        assert!(open.expected_reftimes.is_none());

        let template = config.template_options(vec![VertLevelClass::Isobaric], ProcessingTable::default());
        assert_eq!(template.vertlevels, vec![VertLevelClass::Isobaric]);
        assert!(template.save_inventory);
    }
}
