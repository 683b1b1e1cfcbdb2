use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// `entityTypePropertyType` code for numeric values.
pub const NUMERIC_PROPERTY: i64 = 1;
/// `entityTypePropertyType` code for string values.
pub const TEXT_PROPERTY: i64 = 2;

/// Declared type of an entity type property.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeProperty {
    pub entity_type_property_type: i64,
}

/// One attribute value of one simulated entity at one world-state, as
/// returned by `GET <ooi>/EntityProperty`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_property_id: Option<u64>,
    pub entity_id: u64,
    pub entity_type_property_id: u64,
    /// Any JSON kind; the accessors skip non-strings.
    #[serde(default)]
    pub entity_property_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type_property: Option<EntityTypeProperty>,
}

impl EntityProperty {
    pub fn declared_type(&self) -> Option<i64> {
        self.entity_type_property
            .as_ref()
            .map(|p| p.entity_type_property_type)
    }

    /// The stored string, `None` when the value is null or absent.
    pub fn raw_value(&self) -> Result<Option<&str>, SkipReason> {
        match &self.entity_property_value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => Ok(Some(raw.as_str())),
            Some(other) => Err(SkipReason::NotText(other.to_string())),
        }
    }

    /// Like [`Self::raw_value`], but a missing value is an error too.
    pub fn required_value(&self) -> Result<&str, SkipReason> {
        self.raw_value()?.ok_or(SkipReason::MissingValue)
    }

    /// Value of a record declared numeric.
    ///
    /// The declared type can lie, so the string is parsed regardless.
    pub fn numeric_value(&self) -> Result<f64, SkipReason> {
        self.expect_type(NUMERIC_PROPERTY)?;
        let raw = self.required_value()?;
        parse_number(raw).ok_or_else(|| SkipReason::NotNumeric(raw.to_string()))
    }

    /// Value of a record declared as string. `None` when the value is null.
    pub fn text_value(&self) -> Result<Option<&str>, SkipReason> {
        self.expect_type(TEXT_PROPERTY)?;
        self.raw_value()
    }

    fn expect_type(&self, expected: i64) -> Result<(), SkipReason> {
        match self.declared_type() {
            Some(found) if found == expected => Ok(()),
            found => Err(SkipReason::WrongType { expected, found }),
        }
    }
}

/// Parses an OOI value as a number: whitespace trimmed, decimal comma
/// accepted. Non-finite results are rejected.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Why a record was left out of an aggregation.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum SkipReason {
    WrongType { expected: i64, found: Option<i64> },
    NotNumeric(String),
    NotText(String),
    MissingValue,
    BadCommand(String),
    NotInBaseline,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::WrongType { expected, found } => match found {
                Some(found) => write!(f, "property is of type {} instead of {}", found, expected),
                None => write!(f, "property has no declared type (expected {})", expected),
            },
            SkipReason::NotNumeric(v) => write!(f, "property is not a number: '{}'", v),
            SkipReason::NotText(v) => write!(f, "property value is not a string: {}", v),
            SkipReason::MissingValue => write!(f, "property has no value"),
            SkipReason::BadCommand(v) => write!(f, "unreadable vehicle command: '{}'", v),
            SkipReason::NotInBaseline => write!(f, "entity missing from baseline worldstate"),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub entity_id: u64,
    pub reason: SkipReason,
}

/// Result of a scan over entity properties: the aggregate plus every record
/// that was skipped on the way.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scan<T> {
    pub value: T,
    pub skipped: Vec<SkippedRecord>,
}

impl<T> Scan<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            skipped: Vec::new(),
        }
    }

    /// Records a skipped entity and logs it.
    pub fn skip(&mut self, entity_id: u64, reason: SkipReason) {
        warn!(entity_id, reason = %reason, "Skipping entity property");
        self.skipped.push(SkippedRecord { entity_id, reason });
    }

    pub fn skipped_ids(&self) -> Vec<u64> {
        self.skipped.iter().map(|s| s.entity_id).collect()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Scan<U> {
        Scan {
            value: f(self.value),
            skipped: self.skipped,
        }
    }
}

/// Entities whose property value is `"false"` (case-insensitive).
///
/// Used with the patient *exposed* property: unexposed patients are not
/// part of the exercise.
pub fn false_flagged(records: &[EntityProperty]) -> HashSet<u64> {
    records
        .iter()
        .filter(|ep| matches!(ep.raw_value(), Ok(Some(v)) if v.eq_ignore_ascii_case("false")))
        .map(|ep| ep.entity_id)
        .collect()
}
