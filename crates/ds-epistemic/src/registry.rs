//! Caller-registered diagnostics.
//!
//! A registry maps names to closures evaluated over the output table.
//! Results land under the report's `custom` map; a failing diagnostic
//! records its error under the same name instead of failing the report.

use std::collections::BTreeMap;
use std::sync::Arc;

use ds_common::table::DriftTable;
use serde_json::{json, Value};

/// A named diagnostic over the output table.
pub type DiagnosticFn = Arc<dyn Fn(&DriftTable) -> Result<Value, String> + Send + Sync>;

/// Registry of caller-supplied diagnostics, evaluated in name order.
#[derive(Clone, Default)]
pub struct DiagnosticRegistry {
    diagnostics: BTreeMap<String, DiagnosticFn>,
}

impl DiagnosticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a diagnostic under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, diagnostic: F)
    where
        F: Fn(&DriftTable) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.diagnostics.insert(name.into(), Arc::new(diagnostic));
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Registered names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.diagnostics.keys().map(String::as_str).collect()
    }

    /// Evaluate every diagnostic against `table`.
    pub fn evaluate(&self, table: &DriftTable) -> BTreeMap<String, Value> {
        self.diagnostics
            .iter()
            .map(|(name, diagnostic)| {
                let value = match diagnostic(table) {
                    Ok(value) => value,
                    Err(message) => json!({ "error": message }),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

impl std::fmt::Debug for DiagnosticRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_in_name_order() {
        let mut registry = DiagnosticRegistry::new();
        registry.register("rows", |t: &DriftTable| Ok(json!(t.len())));
        registry.register("always_one", |_: &DriftTable| Ok(json!(1)));
        let table = DriftTable::default();
        let out = registry.evaluate(&table);
        let names: Vec<&String> = out.keys().collect();
        assert_eq!(names, vec!["always_one", "rows"]);
        assert_eq!(out["rows"], json!(0));
    }

    #[test]
    fn test_failure_recorded_not_propagated() {
        let mut registry = DiagnosticRegistry::new();
        registry.register("broken", |_: &DriftTable| Err("boom".to_string()));
        let out = registry.evaluate(&DriftTable::default());
        assert_eq!(out["broken"], json!({ "error": "boom" }));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = DiagnosticRegistry::new();
        registry.register("x", |_: &DriftTable| Ok(json!(1)));
        registry.register("x", |_: &DriftTable| Ok(json!(2)));
        assert_eq!(registry.len(), 1);
        let out = registry.evaluate(&DriftTable::default());
        assert_eq!(out["x"], json!(2));
    }
}
