//! Parameter value and domain types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Concrete hyperparameter value
///
/// `Selector` is the value of a switch's active-alternative key: the child
/// index and the index into that child's own configuration grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Categorical(String),
    Selector { child: usize, config: usize },
}

impl ParameterValue {
    /// Get as float (converts int to float if needed)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int; floats are accepted only when integral
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Categorical(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_selector(&self) -> Option<(usize, usize)> {
        match self {
            ParameterValue::Selector { child, config } => Some((*child, *config)),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(b) => write!(f, "{b}"),
            ParameterValue::Int(v) => write!(f, "{v}"),
            ParameterValue::Float(v) => write!(f, "{v:?}"),
            ParameterValue::Categorical(s) => write!(f, "'{s}'"),
            ParameterValue::Selector { child, config } => write!(f, "({child}, {config})"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Categorical(v.to_string())
    }
}

fn default_num() -> usize {
    5
}

fn default_step() -> i64 {
    1
}

/// Parameter domain (candidate set or range descriptor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDomain {
    /// Literal list of candidate values
    Values(Vec<ParameterValue>),
    /// `num` evenly spaced points over [low, high], optionally log-scaled
    Continuous {
        low: f64,
        high: f64,
        #[serde(default = "default_num")]
        num: usize,
        #[serde(default)]
        log_scale: bool,
    },
    /// Integer range [low, high] with a stride
    Discrete {
        low: i64,
        high: i64,
        #[serde(default = "default_step")]
        step: i64,
    },
    /// Categorical choices
    Categorical { choices: Vec<String> },
    /// `false` then `true`
    Boolean,
}

impl ParameterDomain {
    /// Enumerate the candidate values in deterministic order
    pub fn grid_values(&self) -> Vec<ParameterValue> {
        match self {
            ParameterDomain::Values(values) => values.clone(),
            ParameterDomain::Continuous { low, high, num, log_scale } => match *num {
                0 => Vec::new(),
                1 => vec![ParameterValue::Float(*low)],
                n => {
                    let divisor = (n - 1) as f64;
                    if *log_scale {
                        let log_low = low.max(f64::MIN_POSITIVE).ln();
                        let log_high = high.max(f64::MIN_POSITIVE).ln();
                        (0..n)
                            .map(|i| {
                                let t = i as f64 / divisor;
                                ParameterValue::Float((log_low + t * (log_high - log_low)).exp())
                            })
                            .collect()
                    } else {
                        (0..n)
                            .map(|i| {
                                let t = i as f64 / divisor;
                                ParameterValue::Float(low + t * (high - low))
                            })
                            .collect()
                    }
                }
            },
            ParameterDomain::Discrete { low, high, step } => {
                if *step <= 0 {
                    return Vec::new();
                }
                (*low..=*high).step_by(*step as usize).map(ParameterValue::Int).collect()
            }
            ParameterDomain::Categorical { choices } => {
                choices.iter().map(|c| ParameterValue::Categorical(c.clone())).collect()
            }
            ParameterDomain::Boolean => vec![ParameterValue::Bool(false), ParameterValue::Bool(true)],
        }
    }

    /// Reject domains that cannot yield a meaningful grid
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            ParameterDomain::Values(values) if values.is_empty() => Err("values must not be empty".to_string()),
            ParameterDomain::Categorical { choices } if choices.is_empty() => {
                Err("choices must not be empty".to_string())
            }
            ParameterDomain::Continuous { low, high, num, log_scale } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(format!("bounds must be finite, got [{low}, {high}]"));
                }
                if low > high {
                    return Err(format!("low {low} exceeds high {high}"));
                }
                if *num == 0 {
                    return Err("num must be > 0".to_string());
                }
                if *log_scale && *low <= 0.0 {
                    return Err(format!("log_scale needs low > 0, got {low}"));
                }
                Ok(())
            }
            ParameterDomain::Discrete { low, high, step } => {
                if *step <= 0 {
                    return Err(format!("step must be > 0, got {step}"));
                }
                if low > high {
                    return Err(format!("low {low} exceeds high {high}"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Number of candidate values
    pub fn len(&self) -> usize {
        self.grid_values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a value is valid for this domain
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (ParameterDomain::Values(values), v) => values.contains(v),
            (ParameterDomain::Continuous { low, high, .. }, ParameterValue::Float(v)) => {
                *v >= *low && *v <= *high
            }
            (ParameterDomain::Discrete { low, high, step }, ParameterValue::Int(v)) => {
                *step > 0 && *v >= *low && *v <= *high && (*v - *low) % *step == 0
            }
            (ParameterDomain::Categorical { choices }, ParameterValue::Categorical(s)) => {
                choices.contains(s)
            }
            (ParameterDomain::Boolean, ParameterValue::Bool(_)) => true,
            _ => false,
        }
    }
}
