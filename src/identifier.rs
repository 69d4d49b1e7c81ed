use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};

/// An item designator accepted by the registry endpoints.
///
/// The registry addresses items either by their colon-delimited hierarchical
/// code (`vessel:polarstern:pco2_go_ps`, each segment narrowing scope from
/// platform to sub-instrument) or by their numeric registry id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Code(String),
    Id(i64),
}

impl Identifier {
    /// Truncates a hierarchical code to its owning platform: the first two
    /// colon-delimited segments. Codes with fewer than two segments cannot
    /// name a platform and fail with [`Error::MalformedIdentifier`].
    pub fn platform_code(code: &str) -> Result<String> {
        let mut parts = code.split(':');
        match (parts.next(), parts.next()) {
            (Some(platform), Some(item)) if !platform.is_empty() && !item.is_empty() => {
                Ok(format!("{}:{}", platform, item))
            }
            _ => Err(Error::MalformedIdentifier(code.to_string())),
        }
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Identifier::Id(id)
    }
}

impl From<&str> for Identifier {
    fn from(code: &str) -> Self {
        Identifier::Code(code.to_string())
    }
}

impl From<String> for Identifier {
    fn from(code: String) -> Self {
        Identifier::Code(code)
    }
}

impl From<&String> for Identifier {
    fn from(code: &String) -> Self {
        Identifier::Code(code.clone())
    }
}

impl TryFrom<&Value> for Identifier {
    type Error = Error;

    /// Accepts the two JSON shapes an identifier may arrive in (string code
    /// or integer id); everything else is [`Error::InvalidIdentifierType`].
    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(code) => Ok(Identifier::Code(code.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(Identifier::Id)
                .ok_or_else(|| Error::InvalidIdentifierType(value.to_string())),
            other => Err(Error::InvalidIdentifierType(other.to_string())),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Code(code) => write!(f, "{}", code),
            Identifier::Id(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn platform_code_truncates_to_two_segments() {
        assert_eq!(
            Identifier::platform_code("vessel:polarstern:pco2_go_ps:pre_xco2").unwrap(),
            "vessel:polarstern"
        );
        assert_eq!(
            Identifier::platform_code("vessel:polarstern").unwrap(),
            "vessel:polarstern"
        );
    }

    #[test]
    fn platform_code_rejects_short_codes() {
        assert!(matches!(
            Identifier::platform_code("vessel"),
            Err(Error::MalformedIdentifier(_))
        ));
        assert!(matches!(
            Identifier::platform_code("vessel:"),
            Err(Error::MalformedIdentifier(_))
        ));
        assert!(matches!(
            Identifier::platform_code(""),
            Err(Error::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn try_from_value_accepts_strings_and_integers() {
        assert_eq!(
            Identifier::try_from(&json!("vessel:polarstern")).unwrap(),
            Identifier::Code("vessel:polarstern".to_string())
        );
        assert_eq!(Identifier::try_from(&json!(4711)).unwrap(), Identifier::Id(4711));
    }

    #[test]
    fn try_from_value_rejects_other_shapes() {
        assert!(matches!(
            Identifier::try_from(&json!(true)),
            Err(Error::InvalidIdentifierType(_))
        ));
        assert!(matches!(
            Identifier::try_from(&json!(1.5)),
            Err(Error::InvalidIdentifierType(_))
        ));
        assert!(matches!(
            Identifier::try_from(&json!({ "id": 1 })),
            Err(Error::InvalidIdentifierType(_))
        ));
    }

    #[test]
    fn display_round_trips_both_variants() {
        assert_eq!(Identifier::from("vessel:ps").to_string(), "vessel:ps");
        assert_eq!(Identifier::from(42).to_string(), "42");
    }
}
