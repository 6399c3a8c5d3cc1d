//! Loosely typed configuration.
//!
//! [`IcConfig`] reads estimator options from JSON. Every field is checked on
//! its own, so a value of the wrong JSON type is reported as
//! [`Error::InvalidArgumentType`] and an unrecognized or out-of-range value as
//! [`Error::InvalidConfiguration`], naming the offending option.
//!
//! ```rust
//! use gmm_ic::IcConfig;
//!
//! let config = IcConfig::from_json_str(
//!     r#"{"min_components": 1, "max_components": 4, "covariance_type": "all"}"#,
//! )
//! .unwrap();
//! let estimator = config.build();
//! assert_eq!(estimator.grid_params().max_components, Some(4));
//! ```

use super::criterion::Criterion;
use super::estimator::{GaussianMixtureIc, DEFAULT_MAX_AGGLOM_SIZE};
use super::grid::{Choice, InitAffinity};
use crate::cluster::{CovarianceType, Linkage};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Estimator options in their serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct IcConfig {
    /// Smallest component count.
    pub min_components: usize,
    /// Largest component count; `None` means `min_components`.
    pub max_components: Option<usize>,
    /// Covariance structures.
    pub covariance_type: Choice<CovarianceType>,
    /// Agglomerative affinities, or `none`.
    pub affinity: Choice<InitAffinity>,
    /// Agglomerative linkages.
    pub linkage: Choice<Linkage>,
    /// `bic` or `aic`.
    pub selection_criteria: Criterion,
    /// Fixed starting labels.
    pub label_init: Option<Vec<usize>>,
    /// EM iteration cap.
    pub max_iter: usize,
    /// EM tolerance.
    pub tol: f64,
    /// Worker threads.
    pub n_jobs: usize,
    /// Seed.
    pub random_state: Option<u64>,
    /// Row cap for agglomerative clustering.
    pub max_agglom_size: Option<usize>,
}

impl Default for IcConfig {
    fn default() -> Self {
        Self {
            min_components: 2,
            max_components: None,
            covariance_type: Choice::One(CovarianceType::Full),
            affinity: Choice::One(InitAffinity::Euclidean),
            linkage: Choice::One(Linkage::Ward),
            selection_criteria: Criterion::Bic,
            label_init: None,
            max_iter: 100,
            tol: 1e-3,
            n_jobs: 1,
            random_state: None,
            max_agglom_size: Some(DEFAULT_MAX_AGGLOM_SIZE),
        }
    }
}

impl IcConfig {
    /// Parse a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| Error::config("config", e.to_string()))?;
        Self::from_value(value)
    }

    /// Read options from a JSON object; absent keys keep their defaults.
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => return Err(type_error("config", "object", &other)),
        };
        let mut config = Self::default();
        for (key, v) in map {
            match key.as_str() {
                "min_components" => config.min_components = integer("min_components", &v)?,
                "max_components" => {
                    config.max_components = optional(&v, |v| integer("max_components", v))?
                }
                "covariance_type" => config.covariance_type = choice("covariance_type", &v)?,
                "affinity" => config.affinity = choice("affinity", &v)?,
                "linkage" => config.linkage = choice("linkage", &v)?,
                "selection_criteria" => {
                    config.selection_criteria = string("selection_criteria", &v)?.parse()?
                }
                "label_init" => config.label_init = optional(&v, label_init)?,
                "max_iter" => config.max_iter = integer("max_iter", &v)?,
                "tol" => {
                    config.tol = v.as_f64().ok_or_else(|| type_error("tol", "number", &v))?
                }
                "n_jobs" => config.n_jobs = integer("n_jobs", &v)?,
                "random_state" => {
                    config.random_state =
                        optional(&v, |v| integer::<u64>("random_state", v))?
                }
                "max_agglom_size" => {
                    config.max_agglom_size = optional(&v, |v| integer("max_agglom_size", v))?
                }
                other => {
                    return Err(Error::config("config", format!("unknown option '{other}'")));
                }
            }
        }
        Ok(config)
    }

    /// An unfitted estimator with these options.
    pub fn build(&self) -> GaussianMixtureIc {
        let mut est = GaussianMixtureIc::new()
            .with_min_components(self.min_components)
            .with_covariance_type(self.covariance_type.clone())
            .with_affinity(self.affinity.clone())
            .with_linkage(self.linkage.clone())
            .with_selection_criteria(self.selection_criteria)
            .with_max_iter(self.max_iter)
            .with_tol(self.tol)
            .with_n_jobs(self.n_jobs)
            .with_max_agglom_size(self.max_agglom_size);
        if let Some(max) = self.max_components {
            est = est.with_max_components(max);
        }
        if let Some(labels) = &self.label_init {
            est = est.with_label_init(labels.clone());
        }
        if let Some(seed) = self.random_state {
            est = est.with_random_state(seed);
        }
        est
    }
}

impl TryFrom<Value> for IcConfig {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<IcConfig> for Value {
    fn from(c: IcConfig) -> Self {
        let mut map = Map::new();
        map.insert("min_components".into(), json!(c.min_components));
        map.insert("max_components".into(), json!(c.max_components));
        map.insert("covariance_type".into(), choice_value(&c.covariance_type));
        map.insert("affinity".into(), choice_value(&c.affinity));
        map.insert("linkage".into(), choice_value(&c.linkage));
        map.insert("selection_criteria".into(), json!(c.selection_criteria.as_str()));
        map.insert("label_init".into(), json!(c.label_init));
        map.insert("max_iter".into(), json!(c.max_iter));
        map.insert("tol".into(), json!(c.tol));
        map.insert("n_jobs".into(), json!(c.n_jobs));
        map.insert("random_state".into(), json!(c.random_state));
        map.insert("max_agglom_size".into(), json!(c.max_agglom_size));
        Value::Object(map)
    }
}

fn choice_value<T: fmt::Display>(choice: &Choice<T>) -> Value {
    match choice {
        Choice::One(v) => json!(v.to_string()),
        Choice::Many(vs) => Value::Array(vs.iter().map(|v| json!(v.to_string())).collect()),
        Choice::All => json!("all"),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(name: &'static str, expected: &'static str, found: &Value) -> Error {
    Error::InvalidArgumentType {
        name,
        expected,
        found: json_type(found).to_string(),
    }
}

fn optional<T>(v: &Value, parse: impl FnOnce(&Value) -> Result<T>) -> Result<Option<T>> {
    if v.is_null() {
        Ok(None)
    } else {
        parse(v).map(Some)
    }
}

fn integer<T: TryFrom<u64>>(name: &'static str, v: &Value) -> Result<T> {
    if let Some(i) = v.as_u64() {
        return T::try_from(i).map_err(|_| Error::config(name, format!("{i} is too large")));
    }
    match v.as_i64() {
        Some(i) => Err(Error::config(name, format!("must be non-negative, got {i}"))),
        None => Err(type_error(name, "integer", v)),
    }
}

fn string<'a>(name: &'static str, v: &'a Value) -> Result<&'a str> {
    v.as_str().ok_or_else(|| type_error(name, "string", v))
}

/// A name, a list of names, or `"all"`.
fn choice<T>(name: &'static str, v: &Value) -> Result<Choice<T>>
where
    T: FromStr<Err = Error>,
{
    const EXPECTED: &str = "string or list of strings";
    match v {
        Value::String(s) => s.parse(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.parse::<T>(),
                other => Err(type_error(name, EXPECTED, other)),
            })
            .collect::<Result<Vec<T>>>()
            .map(Choice::Many),
        other => Err(type_error(name, EXPECTED, other)),
    }
}

/// A flat label list; an n×1 column is flattened.
fn label_init(v: &Value) -> Result<Vec<usize>> {
    const EXPECTED: &str = "1-D array of non-negative integers";
    let Value::Array(items) = v else {
        return Err(type_error("label_init", EXPECTED, v));
    };
    items
        .iter()
        .map(|item| {
            let scalar = match item {
                Value::Array(inner) if inner.len() == 1 => &inner[0],
                other => other,
            };
            scalar
                .as_u64()
                .or_else(|| scalar.as_f64().and_then(integral_label))
                .and_then(|l| usize::try_from(l).ok())
                .ok_or_else(|| type_error("label_init", EXPECTED, item))
        })
        .collect()
}

/// Float labels such as `1.0` are accepted when they hold a whole number.
fn integral_label(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then(|| f as u64)
}
