use crate::config::ServiceConfig;
use crate::{EnhancerError, Result};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Upscaling factor accepted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scale {
    #[default]
    X2,
    X4,
    X8,
}

impl Scale {
    pub fn factor(self) -> u8 {
        match self {
            Scale::X2 => 2,
            Scale::X4 => 4,
            Scale::X8 => 8,
        }
    }

    /// Validate a caller-supplied factor.
    pub fn from_factor(value: i64) -> Result<Self> {
        match value {
            2 => Ok(Scale::X2),
            4 => Ok(Scale::X4),
            8 => Ok(Scale::X8),
            _ => Err(Self::rejection()),
        }
    }

    /// Parse a factor from a form field or query string.
    pub fn parse(raw: &str) -> Result<Self> {
        let value = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| Self::not_an_integer(raw))?;
        Self::from_factor(value)
    }

    /// Validate a JSON body value.
    ///
    /// Accepts an integer, a float with no fractional part, or a numeric
    /// string. `null` is treated like an out-of-range factor.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Err(Self::rejection()),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::from_factor(i),
                (None, Some(f)) if f.is_finite() && f.fract() == 0.0 => {
                    Self::from_factor(f as i64)
                }
                _ => Err(Self::not_an_integer(&n.to_string())),
            },
            Value::String(raw) => Self::parse(raw),
            other => Err(Self::not_an_integer(&other.to_string())),
        }
    }

    fn not_an_integer(raw: &str) -> EnhancerError {
        EnhancerError::validation("scale", format!("'{}' is not a valid integer", raw))
    }

    fn rejection() -> EnhancerError {
        let allowed = ServiceConfig::ALLOWED_SCALES;
        EnhancerError::invalid_params(format!(
            "Scale must be {}, {}, or {}",
            allowed[0], allowed[1], allowed[2]
        ))
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.factor())
    }
}

impl Serialize for Scale {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.factor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_factors() {
        for factor in ServiceConfig::ALLOWED_SCALES {
            let scale = Scale::from_factor(factor as i64).unwrap();
            assert_eq!(scale.factor(), factor);
        }
    }

    #[test]
    fn test_rejected_factors_use_bare_message() {
        for bad in [0, 1, 3, 16, -2] {
            let err = Scale::from_factor(bad).unwrap_err();
            assert_eq!(err.to_string(), "Scale must be 2, 4, or 8");
            assert!(matches!(err, EnhancerError::InvalidParams { .. }));
        }
    }

    #[test]
    fn test_json_scale_coercion() {
        use serde_json::json;

        assert_eq!(Scale::from_json(&json!(4)).unwrap(), Scale::X4);
        assert_eq!(Scale::from_json(&json!("4")).unwrap(), Scale::X4);
        assert_eq!(Scale::from_json(&json!(8.0)).unwrap(), Scale::X8);

        for bad in [json!(3), json!("16"), json!(6.0), json!(null)] {
            assert!(matches!(
                Scale::from_json(&bad),
                Err(EnhancerError::InvalidParams { .. })
            ));
        }
        for malformed in [json!("x"), json!(4.5), json!(true), json!([4])] {
            assert!(matches!(
                Scale::from_json(&malformed),
                Err(EnhancerError::Validation { .. })
            ));
        }
    }

    #[test]
    fn test_parse_form_value() {
        assert_eq!(Scale::parse(" 8 ").unwrap(), Scale::X8);
        assert!(matches!(
            Scale::parse("big"),
            Err(EnhancerError::Validation { .. })
        ));
        assert!(matches!(
            Scale::parse("3"),
            Err(EnhancerError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_default_and_serialization() {
        assert_eq!(Scale::default().factor(), ServiceConfig::DEFAULT_SCALE);
        assert_eq!(serde_json::to_string(&Scale::X4).unwrap(), "4");
    }
}
