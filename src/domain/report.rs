//! Periodic performance filings: full variable reports (51 value slots, each
//! with a data-kind tag) and the indicator measurements computed from them
//! (32 slots). Both are keyed by `(epsa, year, month)`; a null month marks an
//! annual filing.
//!
//! The wire format is flat (`v1`, `v1_type`, …, `ind1`, …) so both records
//! implement their serde conversions by hand instead of spelling out a
//! hundred struct fields.

use crate::domain::{check_min_year, current_year};
use chrono::{DateTime, Utc};
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

pub const VARIABLE_SLOTS: usize = 51;
pub const INDICATOR_SLOTS: usize = 32;

/// Data-kind tag attached to each reported variable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueKind {
    /// Plain value
    #[default]
    VA,
    /// No corresponde
    NC,
    /// No reportó
    NR,
    /// Norma Boliviana
    NB,
    /// Manual de Seguimiento
    MS,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::VA => "VA",
            ValueKind::NC => "NC",
            ValueKind::NR => "NR",
            ValueKind::NB => "NB",
            ValueKind::MS => "MS",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "VA" => Some(ValueKind::VA),
            "NC" => Some(ValueKind::NC),
            "NR" => Some(ValueKind::NR),
            "NB" => Some(ValueKind::NB),
            "MS" => Some(ValueKind::MS),
            _ => None,
        }
    }
}

enum SlotKey {
    Value(usize),
    Kind(usize),
}

fn parse_slot_key(key: &str, prefix: &str, slots: usize) -> Option<SlotKey> {
    let rest = key.strip_prefix(prefix)?;
    let (digits, is_kind) = match rest.strip_suffix("_type") {
        Some(d) => (d, true),
        None => (rest, false),
    };
    let n: usize = digits.parse().ok()?;
    if (1..=slots).contains(&n) {
        Some(if is_kind { SlotKey::Kind(n - 1) } else { SlotKey::Value(n - 1) })
    } else {
        None
    }
}

/// Reported values arrive both as JSON numbers and as numeric strings
/// (legacy spreadsheet exports), so slot values are parsed leniently.
struct LenientFloat(f64);

impl<'de> Deserialize<'de> for LenientFloat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FloatVisitor;

        impl<'de> Visitor<'de> for FloatVisitor {
            type Value = LenientFloat;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a number or a numeric string")
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(LenientFloat(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(LenientFloat(v as f64))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(LenientFloat(v as f64))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.trim().parse::<f64>().map(LenientFloat).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(FloatVisitor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableReport {
    pub id: Option<i64>,
    pub epsa: Option<String>,
    pub year: i32,
    pub month: Option<i32>,
    pub values: Vec<Option<f64>>,
    pub value_kinds: Vec<ValueKind>,
    pub modified: Option<DateTime<Utc>>,
}

impl Default for VariableReport {
    fn default() -> Self {
        Self {
            id: None,
            epsa: None,
            year: current_year(),
            month: Some(1),
            values: vec![None; VARIABLE_SLOTS],
            value_kinds: vec![ValueKind::VA; VARIABLE_SLOTS],
            modified: None,
        }
    }
}

impl VariableReport {
    pub const UNIQUE_KEY: &'static [&'static str] = &["epsa", "year", "month"];

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        check_min_year(&mut errors, "year", self.year, 1900);
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                errors.push("month: must be between 1 and 12".to_string());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Compact slot map persisted as a single JSON column: non-null values
    /// and non-default kind tags only.
    pub fn slots_to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        for i in 0..VARIABLE_SLOTS {
            if let Some(v) = self.values[i] {
                obj.insert(format!("v{}", i + 1), v.into());
            }
            if self.value_kinds[i] != ValueKind::VA {
                obj.insert(
                    format!("v{}_type", i + 1),
                    Value::String(self.value_kinds[i].as_str().to_string()),
                );
            }
        }
        Value::Object(obj)
    }

    pub fn apply_slots_json(&mut self, slots: &Value) {
        if let Some(obj) = slots.as_object() {
            for (key, value) in obj {
                match parse_slot_key(key, "v", VARIABLE_SLOTS) {
                    Some(SlotKey::Value(i)) => self.values[i] = value.as_f64(),
                    Some(SlotKey::Kind(i)) => {
                        if let Some(kind) = value.as_str().and_then(ValueKind::from_tag) {
                            self.value_kinds[i] = kind;
                        }
                    }
                    None => {}
                }
            }
        }
    }
}

impl Serialize for VariableReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("epsa", &self.epsa)?;
        map.serialize_entry("year", &self.year)?;
        map.serialize_entry("month", &self.month)?;
        for i in 0..VARIABLE_SLOTS {
            map.serialize_entry(&format!("v{}", i + 1), &self.values[i])?;
            map.serialize_entry(&format!("v{}_type", i + 1), self.value_kinds[i].as_str())?;
        }
        map.serialize_entry("modified", &self.modified)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for VariableReport {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ReportVisitor;

        impl<'de> Visitor<'de> for ReportVisitor {
            type Value = VariableReport;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a variable report object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut report = VariableReport::default();
                let mut year: Option<i32> = None;
                let mut month_seen = false;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "id" => report.id = map.next_value()?,
                        "epsa" => report.epsa = map.next_value()?,
                        "year" => year = map.next_value()?,
                        "month" => {
                            report.month = map.next_value()?;
                            month_seen = true;
                        }
                        "modified" => report.modified = map.next_value()?,
                        other => match parse_slot_key(other, "v", VARIABLE_SLOTS) {
                            Some(SlotKey::Value(i)) => {
                                report.values[i] =
                                    map.next_value::<Option<LenientFloat>>()?.map(|v| v.0);
                            }
                            Some(SlotKey::Kind(i)) => {
                                if let Some(kind) = map.next_value::<Option<ValueKind>>()? {
                                    report.value_kinds[i] = kind;
                                }
                            }
                            None => {
                                map.next_value::<IgnoredAny>()?;
                            }
                        },
                    }
                }
                if let Some(y) = year {
                    report.year = y;
                }
                // An absent month means the January default; an explicit null
                // marks an annual filing and was captured above.
                if !month_seen {
                    report.month = Some(1);
                }
                Ok(report)
            }
        }

        deserializer.deserialize_map(ReportVisitor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorMeasurement {
    pub id: Option<i64>,
    pub epsa: Option<String>,
    pub year: i32,
    pub month: Option<i32>,
    pub values: Vec<Option<f64>>,
    pub modified: Option<DateTime<Utc>>,
}

impl Default for IndicatorMeasurement {
    fn default() -> Self {
        Self {
            id: None,
            epsa: None,
            year: current_year(),
            month: Some(1),
            values: vec![None; INDICATOR_SLOTS],
            modified: None,
        }
    }
}

impl IndicatorMeasurement {
    pub const UNIQUE_KEY: &'static [&'static str] = &["epsa", "year", "month"];

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        check_min_year(&mut errors, "year", self.year, 1900);
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                errors.push("month: must be between 1 and 12".to_string());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn slots_to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        for i in 0..INDICATOR_SLOTS {
            if let Some(v) = self.values[i] {
                obj.insert(format!("ind{}", i + 1), v.into());
            }
        }
        Value::Object(obj)
    }

    pub fn apply_slots_json(&mut self, slots: &Value) {
        if let Some(obj) = slots.as_object() {
            for (key, value) in obj {
                if let Some(SlotKey::Value(i)) = parse_slot_key(key, "ind", INDICATOR_SLOTS) {
                    self.values[i] = value.as_f64();
                }
            }
        }
    }
}

impl Serialize for IndicatorMeasurement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("epsa", &self.epsa)?;
        map.serialize_entry("year", &self.year)?;
        map.serialize_entry("month", &self.month)?;
        for i in 0..INDICATOR_SLOTS {
            map.serialize_entry(&format!("ind{}", i + 1), &self.values[i])?;
        }
        map.serialize_entry("modified", &self.modified)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for IndicatorMeasurement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MeasurementVisitor;

        impl<'de> Visitor<'de> for MeasurementVisitor {
            type Value = IndicatorMeasurement;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "an indicator measurement object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut measurement = IndicatorMeasurement::default();
                let mut year: Option<i32> = None;
                let mut month_seen = false;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "id" => measurement.id = map.next_value()?,
                        "epsa" => measurement.epsa = map.next_value()?,
                        "year" => year = map.next_value()?,
                        "month" => {
                            measurement.month = map.next_value()?;
                            month_seen = true;
                        }
                        "modified" => measurement.modified = map.next_value()?,
                        other => match parse_slot_key(other, "ind", INDICATOR_SLOTS) {
                            Some(SlotKey::Value(i)) => {
                                measurement.values[i] =
                                    map.next_value::<Option<LenientFloat>>()?.map(|v| v.0);
                            }
                            _ => {
                                map.next_value::<IgnoredAny>()?;
                            }
                        },
                    }
                }
                if let Some(y) = year {
                    measurement.year = y;
                }
                if !month_seen {
                    measurement.month = Some(1);
                }
                Ok(measurement)
            }
        }

        deserializer.deserialize_map(MeasurementVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_flat_slot_keys_and_string_floats() {
        let report: VariableReport = serde_json::from_value(json!({
            "epsa": "AAPOS",
            "year": 2017,
            "month": null,
            "v1": "790840.00",
            "v2": 531163.0,
            "v3_type": "NR"
        }))
        .unwrap();
        assert_eq!(report.epsa.as_deref(), Some("AAPOS"));
        assert_eq!(report.month, None);
        assert_eq!(report.values[0], Some(790840.0));
        assert_eq!(report.values[1], Some(531163.0));
        assert_eq!(report.value_kinds[2], ValueKind::NR);
        assert_eq!(report.value_kinds[0], ValueKind::VA);
    }

    #[test]
    fn absent_month_defaults_to_january() {
        let report: VariableReport =
            serde_json::from_value(json!({ "epsa": "EPSAS", "year": 2020 })).unwrap();
        assert_eq!(report.month, Some(1));
    }

    #[test]
    fn month_out_of_range_fails_validation() {
        let report: VariableReport =
            serde_json::from_value(json!({ "epsa": "EPSAS", "year": 2020, "month": 13 })).unwrap();
        assert!(report.validate().is_err());
    }

    #[test]
    fn serializes_every_slot_with_kind_tags() {
        let mut report = VariableReport::default();
        report.epsa = Some("AAPOS".to_string());
        report.year = 2017;
        report.values[4] = Some(12.5);
        report.value_kinds[5] = ValueKind::NC;
        let out = serde_json::to_value(&report).unwrap();
        assert_eq!(out["v5"], 12.5);
        assert_eq!(out["v6_type"], "NC");
        assert_eq!(out["v1_type"], "VA");
    }

    #[test]
    fn slot_json_round_trips() {
        let mut report = VariableReport::default();
        report.values[0] = Some(1.5);
        report.value_kinds[10] = ValueKind::MS;
        let slots = report.slots_to_json();
        let mut restored = VariableReport::default();
        restored.apply_slots_json(&slots);
        assert_eq!(restored.values[0], Some(1.5));
        assert_eq!(restored.value_kinds[10], ValueKind::MS);
        // defaults are not persisted
        assert!(slots.get("v2").is_none());
        assert!(slots.get("v1_type").is_none());
    }

    #[test]
    fn measurement_slots_stop_at_32() {
        let m: IndicatorMeasurement = serde_json::from_value(json!({
            "epsa": "SAGUAPAC",
            "year": 2014,
            "ind1": 98.7,
            "ind32": 67.29,
            "ind33": 1.0
        }))
        .unwrap();
        assert_eq!(m.values[0], Some(98.7));
        assert_eq!(m.values[31], Some(67.29));
    }
}
