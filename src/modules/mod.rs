//! Built-in import modules.
//!
//! Each module is one [`ImportModuleConfig`] describing a target table:
//! its schema with auto-mapping patterns, uniqueness rules, and optional
//! module hooks. Adding an entity type to the importer means adding a
//! config here, not touching the pipeline.

pub mod customers;
pub mod parts;
pub mod resources;

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ImportModuleConfig;

static REGISTRY: Lazy<HashMap<String, Arc<ImportModuleConfig>>> = Lazy::new(|| {
    [customers::config(), parts::config(), resources::config()]
        .into_iter()
        .map(|config| (config.module_name.clone(), Arc::new(config)))
        .collect()
});

/// Look up a module config by name.
pub fn module_config(name: &str) -> Option<Arc<ImportModuleConfig>> {
    REGISTRY.get(name).cloned()
}

/// Registered module names, sorted.
pub fn module_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contents() {
        assert_eq!(module_names(), vec!["customers", "parts", "resources"]);
        assert!(module_config("parts").is_some());
        assert!(module_config("orders").is_none());
    }

    #[test]
    fn test_configs_target_their_own_tables() {
        for name in module_names() {
            let config = module_config(name).unwrap();
            assert_eq!(config.module_name, name);
            assert_eq!(config.table_name, name);
            assert!(!config.required_fields().is_empty());
        }
    }
}
