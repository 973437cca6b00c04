use serde::{Deserialize, Serialize};

/// The in-memory value of a setting.
///
/// A setting either holds one content value or, when its records are flagged as multiple, the
/// ordered list of contents of every record sharing its name. Content may be null in the backing
/// table, hence the `Option`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// A single-valued setting.
    Single(Option<String>),
    /// A multiple setting, in load/insertion order.
    Multiple(Vec<Option<String>>),
}

impl SettingValue {
    /// Returns the content of a non-null single value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Single(content) => content.as_deref(),
            SettingValue::Multiple(_) => None,
        }
    }

    /// Returns the values of a multiple setting.
    pub fn as_multiple(&self) -> Option<&[Option<String>]> {
        match self {
            SettingValue::Single(_) => None,
            SettingValue::Multiple(values) => Some(values),
        }
    }

    /// True for a single value whose content is null.
    pub fn is_null(&self) -> bool {
        matches!(self, SettingValue::Single(None))
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Single(Some(value.to_string()))
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Single(Some(value))
    }
}

impl<T: Into<String>> From<Vec<T>> for SettingValue {
    fn from(values: Vec<T>) -> Self {
        SettingValue::Multiple(values.into_iter().map(|v| Some(v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_accessors() {
        let single = SettingValue::from("dark");
        assert_eq!(single.as_str(), Some("dark"));
        assert_eq!(single.as_multiple(), None);
        assert!(!single.is_null());

        let multiple = SettingValue::from(vec!["a", "b"]);
        assert_eq!(multiple.as_str(), None);
        assert_eq!(
            multiple.as_multiple(),
            Some(&[Some("a".to_string()), Some("b".to_string())][..])
        );

        assert!(SettingValue::Single(None).is_null());
    }

    #[test]
    fn test_serializes_untagged() {
        let snapshot = std::collections::BTreeMap::from([
            ("theme".to_string(), SettingValue::from("dark")),
            ("unset".to_string(), SettingValue::Single(None)),
            (
                "tags".to_string(),
                SettingValue::Multiple(vec![Some("a".to_string()), None]),
            ),
        ]);

        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({ "tags": ["a", null], "theme": "dark", "unset": null })
        );
    }
}
