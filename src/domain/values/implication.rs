use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Necessary outcome of the target market implied by a source outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Implication {
    TargetYes,
    TargetNo,
}

impl fmt::Display for Implication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implication::TargetYes => write!(f, "target_yes"),
            Implication::TargetNo => write!(f, "target_no"),
        }
    }
}

impl FromStr for Implication {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "target_yes" => Ok(Implication::TargetYes),
            "target_no" => Ok(Implication::TargetNo),
            _ => Err(format!("Unknown implication: {s}")),
        }
    }
}

/// Deserializes an implication field leniently: anything other than the
/// exact strings `"target_yes"` / `"target_no"` becomes `None`.
pub fn lenient_implication<'de, D>(deserializer: D) -> Result<Option<Implication>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_implication")]
        value: Option<Implication>,
    }

    fn implication_of(json: &str) -> Option<Implication> {
        serde_json::from_str::<Probe>(json).unwrap().value
    }

    #[test]
    fn test_known_values_parse() {
        assert_eq!(implication_of(r#"{"value":"target_yes"}"#), Some(Implication::TargetYes));
        assert_eq!(implication_of(r#"{"value":"target_no"}"#), Some(Implication::TargetNo));
    }

    #[test]
    fn test_unknown_values_become_none() {
        assert_eq!(implication_of(r#"{"value":"maybe"}"#), None);
        assert_eq!(implication_of(r#"{"value":null}"#), None);
        assert_eq!(implication_of(r#"{"value":42}"#), None);
        assert_eq!(implication_of(r#"{"value":"TARGET_YES"}"#), None);
        assert_eq!(implication_of(r#"{}"#), None);
    }
}
