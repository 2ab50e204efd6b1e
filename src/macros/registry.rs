//! Macro registry: name lookup for built-ins and extension modules.
//!
//! # Features
//! - Built-ins are registered once and always visible.
//! - Extension modules are named bundles that stay dormant until a story or
//!   configuration enables them. An enabled module's macros answer to both
//!   their bare name (`count`) and their qualified name (`inventory.count`).
//! - Registering a name twice replaces the earlier macro.
//!
//! The registry is cheap to clone (`im` maps), so each session can enable
//! its own modules without affecting any other.

use im::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::ErrorKind;
use crate::macros::{inventory, std as builtins, Macro};

#[derive(Clone, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, Arc<dyn Macro>>,
    modules: HashMap<String, Vec<Arc<dyn Macro>>>,
    enabled: Vec<String>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-ins registered, bundled modules available but not enabled.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        builtins::register_std_macros(&mut registry);
        inventory::register_inventory_module(&mut registry);
        registry
    }

    pub fn register(&mut self, mac: impl Macro + 'static) {
        self.macros.insert(mac.name().to_string(), Arc::new(mac));
    }

    /// Makes a module available under `name`.
    pub fn register_module(&mut self, name: &str, macros: Vec<Arc<dyn Macro>>) {
        self.modules.insert(name.to_string(), macros);
    }

    /// Enables a registered module. Enabling twice is harmless.
    pub fn enable_module(&mut self, name: &str) -> Result<(), ErrorKind> {
        if self.enabled.iter().any(|m| m == name) {
            return Ok(());
        }
        let macros = self
            .modules
            .get(name)
            .cloned()
            .ok_or_else(|| ErrorKind::UnknownModule { name: name.to_string() })?;
        for mac in macros {
            self.macros
                .insert(format!("{name}.{}", mac.name()), Arc::clone(&mac));
            self.macros.insert(mac.name().to_string(), mac);
        }
        self.enabled.push(name.to_string());
        tracing::debug!(module = name, "enabled macro module");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Macro>> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Registered macro names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn enabled_modules(&self) -> &[String] {
        &self.enabled
    }
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroRegistry")
            .field("macros", &self.names())
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modules_stay_dormant_until_enabled() {
        let mut registry = MacroRegistry::standard();
        assert!(registry.contains("set"));
        assert!(!registry.contains("count"));
        registry.enable_module("inventory").unwrap();
        assert!(registry.contains("count"));
        assert!(registry.contains("inventory.count"));
        assert_eq!(registry.enabled_modules(), ["inventory"]);
    }

    #[test]
    fn unknown_modules_are_errors() {
        let mut registry = MacroRegistry::standard();
        assert!(matches!(
            registry.enable_module("weather"),
            Err(ErrorKind::UnknownModule { .. })
        ));
    }

    #[test]
    fn clones_enable_modules_independently() {
        let base = MacroRegistry::standard();
        let mut enabled = base.clone();
        enabled.enable_module("inventory").unwrap();
        assert!(!base.contains("plus"));
        assert!(enabled.contains("plus"));
    }
}
