//! The editable key/value record shown to the user for review.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{FormFillError, Result};
use crate::fields::FieldSet;

/// Ordered field-key → value mapping.
///
/// The key set is fixed when the record is built; only values change
/// afterwards. Serializes as a JSON object in key order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultRecord {
    entries: Vec<(String, String)>,
}

impl ResultRecord {
    /// Build a record over `field_set` from the service's field mapping.
    ///
    /// Keys the service omitted get `""`; keys outside `field_set` are dropped.
    pub fn from_fields(field_set: FieldSet, fields: &HashMap<String, Value>) -> Self {
        let entries = field_set
            .keys()
            .iter()
            .map(|key| {
                let value = fields.get(*key).map(value_to_string).unwrap_or_default();
                (key.to_string(), value)
            })
            .collect();
        Self { entries }
    }

    /// Record over `field_set` with every value empty.
    pub fn blank(field_set: FieldSet) -> Self {
        Self {
            entries: field_set
                .keys()
                .iter()
                .map(|key| (key.to_string(), String::new()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value at `key`. Keys not already in the record are rejected.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let slot = self
            .entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .ok_or_else(|| FormFillError::UnknownField(key.to_string()))?;
        slot.1 = value.into();
        Ok(())
    }

    /// Same keys, same order, every value empty.
    pub fn reset(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(k, _)| (k.clone(), String::new()))
                .collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ResultRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// The service sometimes sends `null` or numbers where strings are expected.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{self, IDENTITY_CARD_FIELDS};
    use serde_json::json;

    fn fields_of(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_from_fields_fills_and_drops() {
        let set = fields::resolve(Some("VOTER_ID"));
        let record = ResultRecord::from_fields(
            set,
            &fields_of(json!({"Name": "Ravi", "PAN": "ABCDE1234F", "error": "x"})),
        );

        assert_eq!(record.keys().collect::<Vec<_>>(), set.keys());
        assert_eq!(record.get("Name"), Some("Ravi"));
        assert_eq!(record.get("EPIC Number"), Some(""));
        assert_eq!(record.get("PAN"), None);
        assert_eq!(record.get("error"), None);
    }

    #[test]
    fn test_non_string_values() {
        let set = fields::resolve(Some("aadhaar"));
        let record = ResultRecord::from_fields(
            set,
            &fields_of(json!({"Name": null, "Aadhaar": 123412341234u64, "Gender": true})),
        );
        assert_eq!(record.get("Name"), Some(""));
        assert_eq!(record.get("Aadhaar"), Some("123412341234"));
        assert_eq!(record.get("Gender"), Some("true"));
    }

    #[test]
    fn test_set_keeps_key_set() {
        let mut record = ResultRecord::blank(fields::resolve(Some("pan")));
        let before: Vec<String> = record.keys().map(String::from).collect();

        record.set("DOB", "01/01/1990").unwrap();
        assert_eq!(record.get("DOB"), Some("01/01/1990"));

        let err = record.set("EPIC Number", "XYZ").unwrap_err();
        assert!(matches!(err, FormFillError::UnknownField(k) if k == "EPIC Number"));

        let after: Vec<String> = record.keys().map(String::from).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut record = ResultRecord::blank(fields::resolve(Some("aadhaar")));
        record.set("Name", "Asha").unwrap();
        record.set("Address", "Pune").unwrap();

        let once = record.reset();
        assert!(once.iter().all(|(_, v)| v.is_empty()));
        assert_eq!(once.keys().collect::<Vec<_>>(), IDENTITY_CARD_FIELDS);
        assert_eq!(once.reset(), once);
    }

    #[test]
    fn test_serializes_in_key_order() {
        let mut record = ResultRecord::blank(fields::resolve(Some("voter")));
        record.set("Name", "Ravi").unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.starts_with(r#"{"Name":"Ravi","EPIC Number":"""#));
        assert!(json.ends_with(r#""Address":""}"#));
    }
}
