//! Storage keys and the parse-or-default combinator used when loading them.

use serde::de::DeserializeOwned;

/// Persisted configuration record.
pub const CONFIG_KEY: &str = "oneLine_apiConfig";

/// Persisted password-validation flag, stored as `"true"` when set.
pub const VALIDATED_KEY: &str = "oneLine_passwordValidated";

/// A parsed value, or the default plus `valid == false` when parsing failed.
///
/// A missing value is not a failure: it yields the default with `valid == true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub value: T,
    pub valid: bool,
    pub present: bool,
}

pub fn parse_or_default<T>(raw: Option<&str>) -> Parsed<T>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = raw else {
        return Parsed {
            value: T::default(),
            valid: true,
            present: false,
        };
    };

    match serde_json::from_str(raw) {
        Ok(value) => Parsed {
            value,
            valid: true,
            present: true,
        },
        Err(_) => Parsed {
            value: T::default(),
            valid: false,
            present: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_default_and_valid() {
        let parsed: Parsed<bool> = parse_or_default(None);
        assert_eq!(
            parsed,
            Parsed {
                value: false,
                valid: true,
                present: false
            }
        );
    }

    #[test]
    fn test_valid_value_is_parsed() {
        let parsed: Parsed<bool> = parse_or_default(Some("true"));
        assert!(parsed.value);
        assert!(parsed.valid);
        assert!(parsed.present);
    }

    #[test]
    fn test_garbage_falls_back_to_default() {
        let parsed: Parsed<bool> = parse_or_default(Some("yes please"));
        assert!(!parsed.value);
        assert!(!parsed.valid);

        let parsed: Parsed<Vec<String>> = parse_or_default(Some("{\"not\": \"a list\"}"));
        assert!(parsed.value.is_empty());
        assert!(!parsed.valid);
    }
}
