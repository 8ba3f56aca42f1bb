//! Custom threshold-model registry.
//!
//! A model maps a drift history plus JSON parameters to a full threshold
//! series, one value per input point. The registry is an explicit value
//! passed into the engine; there is no global mutable state. Two windowed
//! models ship built in, and callers may register their own closures.
//!
//! Model failures never abort an analysis. The engine catches every
//! [`ModelError`], falls back to the stochastic strategy, and records the
//! error text as the fallback reason in the report.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use ds_math::{backfill, rolling_mean_std, rolling_quantile};

/// Default trailing window for the built-in models.
const DEFAULT_WINDOW: usize = 14;
/// Default quantile for `rolling_quantile`.
const DEFAULT_QUANTILE: f64 = 0.80;
/// Default band width for `window_std_k`.
const DEFAULT_STD_K: f64 = 2.5;

/// Why a custom model produced no usable threshold series.
///
/// The display text doubles as the fallback reason recorded in the report.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("no model registered under `{name}`")]
    Unknown { name: String },

    #[error("model `{name}` failed: {message}")]
    Failed { name: String, message: String },

    #[error("model returned {got} thresholds for {expected} points")]
    WrongLength { expected: usize, got: usize },

    #[error("model returned a non-finite threshold at index {index}")]
    NonFinite { index: usize },
}

/// A custom threshold model: `(drift_history, params) -> threshold_series`.
///
/// Returns one threshold per input point or a failure message. Validation
/// of length and finiteness happens in [`ModelRegistry::evaluate`], so
/// implementations only need to worry about their own math.
pub type ModelFn = Arc<dyn Fn(&[f64], &Value) -> Result<Vec<f64>, String> + Send + Sync>;

/// Named threshold models keyed by registration name.
///
/// `Default` ships the built-ins; [`ModelRegistry::empty`] starts blank.
#[derive(Clone)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelFn>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        ModelRegistry::builtin()
    }
}

impl ModelRegistry {
    /// An empty registry with no models at all.
    pub fn empty() -> Self {
        ModelRegistry {
            models: BTreeMap::new(),
        }
    }

    /// The registry with the built-in windowed models.
    ///
    /// - `rolling_quantile` {window: 14, q: 0.80}: rolling q-quantile of
    ///   drift over a trailing window.
    /// - `window_std_k` {window: 14, k: 2.5}: rolling mean plus k rolling
    ///   standard deviations (population).
    ///
    /// Both use `min_periods = max(2, window / 2)` and backfill the warmup
    /// region with the first defined value.
    pub fn builtin() -> Self {
        let mut registry = ModelRegistry::empty();
        registry.register("rolling_quantile", |drifts, params| {
            let window = param_usize(params, "window", DEFAULT_WINDOW)?;
            let q = param_f64(params, "q", DEFAULT_QUANTILE)?;
            let series = rolling_quantile(drifts, window, q, min_periods(window));
            Ok(backfill(&series))
        });
        registry.register("window_std_k", |drifts, params| {
            let window = param_usize(params, "window", DEFAULT_WINDOW)?;
            let k = param_f64(params, "k", DEFAULT_STD_K)?;
            let (means, stds) = rolling_mean_std(drifts, window, min_periods(window));
            let series: Vec<f64> = means
                .iter()
                .zip(&stds)
                .map(|(m, s)| m + k * s)
                .collect();
            Ok(backfill(&series))
        });
        registry
    }

    /// Register a model under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, model: F)
    where
        F: Fn(&[f64], &Value) -> Result<Vec<f64>, String> + Send + Sync + 'static,
    {
        self.models.insert(name.to_string(), Arc::new(model));
    }

    /// Registered model names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Run a model and validate its output.
    ///
    /// The returned series must have exactly one finite value per input
    /// point; anything else is a [`ModelError`] for the engine to turn
    /// into a stochastic fallback.
    pub fn evaluate(&self, name: &str, drifts: &[f64], params: &Value) -> Result<Vec<f64>, ModelError> {
        let model = self.models.get(name).ok_or_else(|| ModelError::Unknown {
            name: name.to_string(),
        })?;
        let series = model(drifts, params).map_err(|message| ModelError::Failed {
            name: name.to_string(),
            message,
        })?;
        if series.len() != drifts.len() {
            return Err(ModelError::WrongLength {
                expected: drifts.len(),
                got: series.len(),
            });
        }
        if let Some(index) = series.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite { index });
        }
        Ok(series)
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

fn min_periods(window: usize) -> usize {
    (window / 2).max(2)
}

/// Pull an integer parameter out of a JSON object, or the default when the
/// key (or the whole object) is absent. Null parameters mean "all defaults".
fn param_usize(params: &Value, key: &str, default: usize) -> Result<usize, String> {
    match lookup(params, key)? {
        None => Ok(default),
        Some(value) => {
            let n = value
                .as_u64()
                .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0 && *v >= 0.0).map(|v| v as u64))
                .ok_or_else(|| format!("parameter `{key}` must be a non-negative integer"))?;
            if n == 0 {
                return Err(format!("parameter `{key}` must be at least 1"));
            }
            Ok(n as usize)
        }
    }
}

fn param_f64(params: &Value, key: &str, default: f64) -> Result<f64, String> {
    match lookup(params, key)? {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("parameter `{key}` must be a finite number")),
    }
}

fn lookup<'v>(params: &'v Value, key: &str) -> Result<Option<&'v Value>, String> {
    match params {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(map.get(key)),
        _ => Err("parameters must be a JSON object".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_builtin_names() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.names(), vec!["rolling_quantile", "window_std_k"]);
        assert!(registry.contains("rolling_quantile"));
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn test_rolling_quantile_with_overrides() {
        let registry = ModelRegistry::builtin();
        let drifts = [1.0, 2.0, 3.0, 4.0, 5.0];
        let params = json!({"window": 3, "q": 0.5});
        let series = registry.evaluate("rolling_quantile", &drifts, &params).unwrap();
        // min_periods = max(2, 1) = 2: the first position backfills from
        // the median of [1, 2].
        assert_eq!(series.len(), 5);
        assert!(approx_eq(series[0], 1.5, 1e-12));
        assert!(approx_eq(series[1], 1.5, 1e-12));
        assert!(approx_eq(series[2], 2.0, 1e-12));
        assert!(approx_eq(series[4], 4.0, 1e-12));
    }

    #[test]
    fn test_window_std_k_known_values() {
        let registry = ModelRegistry::builtin();
        let drifts = [1.0, 3.0, 5.0];
        let params = json!({"window": 2, "k": 1.0});
        let series = registry.evaluate("window_std_k", &drifts, &params).unwrap();
        // Window [1,3]: mean 2, population std 1 -> 3. Window [3,5] -> 5.
        assert!(approx_eq(series[0], 3.0, 1e-12));
        assert!(approx_eq(series[1], 3.0, 1e-12));
        assert!(approx_eq(series[2], 5.0, 1e-12));
    }

    #[test]
    fn test_null_params_use_defaults() {
        let registry = ModelRegistry::builtin();
        let drifts: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let series = registry
            .evaluate("rolling_quantile", &drifts, &Value::Null)
            .unwrap();
        assert_eq!(series.len(), 30);
        assert!(series.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::builtin();
        let err = registry.evaluate("mystery", &[1.0], &Value::Null).unwrap_err();
        assert_eq!(
            err,
            ModelError::Unknown {
                name: "mystery".to_string()
            }
        );
    }

    #[test]
    fn test_bad_parameter_type() {
        let registry = ModelRegistry::builtin();
        let err = registry
            .evaluate("rolling_quantile", &[1.0, 2.0], &json!({"q": "high"}))
            .unwrap_err();
        match err {
            ModelError::Failed { name, message } => {
                assert_eq!(name, "rolling_quantile");
                assert!(message.contains("`q`"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_object_params_rejected() {
        let registry = ModelRegistry::builtin();
        let err = registry
            .evaluate("window_std_k", &[1.0], &json!([14]))
            .unwrap_err();
        assert!(matches!(err, ModelError::Failed { .. }));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut registry = ModelRegistry::empty();
        registry.register("short", |_, _| Ok(vec![1.0]));
        let err = registry.evaluate("short", &[1.0, 2.0, 3.0], &Value::Null).unwrap_err();
        assert_eq!(err, ModelError::WrongLength { expected: 3, got: 1 });
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut registry = ModelRegistry::empty();
        registry.register("nan_tail", |drifts, _| {
            let mut out = vec![0.0; drifts.len()];
            if let Some(last) = out.last_mut() {
                *last = f64::NAN;
            }
            Ok(out)
        });
        let err = registry.evaluate("nan_tail", &[1.0, 2.0], &Value::Null).unwrap_err();
        assert_eq!(err, ModelError::NonFinite { index: 1 });
    }

    #[test]
    fn test_registered_model_overrides() {
        let mut registry = ModelRegistry::builtin();
        registry.register("rolling_quantile", |drifts, _| {
            Ok(vec![42.0; drifts.len()])
        });
        let series = registry
            .evaluate("rolling_quantile", &[1.0, 2.0], &Value::Null)
            .unwrap();
        assert_eq!(series, vec![42.0, 42.0]);
    }
}
