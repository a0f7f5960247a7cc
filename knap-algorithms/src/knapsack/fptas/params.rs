use crate::InvalidParameter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_EPSILON: f64 = 0.1;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Params {
    /// Relative error allowed against the optimum, in (0, 1)
    pub epsilon: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl Params {
    pub fn initialize(h: &Option<Map<String, Value>>) -> Result<Self, InvalidParameter> {
        let mut p = Self::default();
        if let Some(m) = h {
            if let Some(v) = m.get("epsilon") {
                p.epsilon = v.as_f64().ok_or_else(|| {
                    InvalidParameter::new("epsilon", format!("expected a number, got {}", v))
                })?;
            }
        }
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<(), InvalidParameter> {
        if self.epsilon > 0.0 && self.epsilon < 1.0 {
            Ok(())
        } else {
            Err(InvalidParameter::new(
                "epsilon",
                format!("{} is outside (0, 1)", self.epsilon),
            ))
        }
    }
}
