//! Acquisition records as delivered by the backend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How one game ended up in the library. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    /// Acquisition date exactly as the store reports it, e.g. `"12 Mar, 2021"`.
    pub date: String,
    /// Acquisition source, e.g. `"Gift/Guest Pass"` or `"Steam Store"`.
    pub acquisition: String,
    /// Name of the license as the backend knows it, when it differs from the
    /// key the record is stored under.
    #[serde(rename = "game_name", default, skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionKind {
    /// Gifted, guest pass or otherwise complimentary. Only these get a widget.
    Complimentary,
    Other,
}

impl AcquisitionRecord {
    pub fn new(date: impl Into<String>, acquisition: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            acquisition: acquisition.into(),
            canonical_name: None,
        }
    }

    /// Classify the acquisition source against case-insensitive markers.
    pub fn kind(&self, qualifying_markers: &[String]) -> AcquisitionKind {
        let source = self.acquisition.to_lowercase();
        let qualifies = qualifying_markers
            .iter()
            .map(|marker| marker.trim().to_lowercase())
            .any(|marker| !marker.is_empty() && source.contains(&marker));

        if qualifies {
            AcquisitionKind::Complimentary
        } else {
            AcquisitionKind::Other
        }
    }

    /// Text shown as the widget value.
    pub fn summary(&self) -> String {
        format!("Acquired on: {} via {}", self.date, self.acquisition)
    }
}

/// Decode a bulk payload into a name → record mapping.
///
/// Absent, blank, `null` or malformed payloads all decode to an empty map;
/// entries that do not look like a record are skipped individually so one bad
/// row cannot hide the rest.
pub fn parse_payload(payload: Option<&str>) -> HashMap<String, AcquisitionRecord> {
    let Some(raw) = payload.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return HashMap::new();
    };

    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "discarding unparsable license payload");
            return HashMap::new();
        }
    };

    let serde_json::Value::Object(entries) = value else {
        if !value.is_null() {
            warn!("license payload is not an object; treating as empty");
        }
        return HashMap::new();
    };

    let mut records = HashMap::with_capacity(entries.len());
    let mut skipped = 0usize;
    for (name, entry) in entries {
        match serde_json::from_value::<AcquisitionRecord>(entry) {
            Ok(record) => {
                records.insert(name, record);
            }
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, kept = records.len(), "skipped malformed license entries");
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["gift".into(), "guest pass".into(), "complimentary".into()]
    }

    #[test]
    fn classifies_complimentary_sources() {
        let gift = AcquisitionRecord::new("1 Jan, 2020", "Gift/Guest Pass");
        let bought = AcquisitionRecord::new("1 Jan, 2020", "Steam Store");
        let promo = AcquisitionRecord::new("1 Jan, 2020", "Complimentary");

        assert_eq!(gift.kind(&markers()), AcquisitionKind::Complimentary);
        assert_eq!(promo.kind(&markers()), AcquisitionKind::Complimentary);
        assert_eq!(bought.kind(&markers()), AcquisitionKind::Other);
        assert_eq!(gift.kind(&[" ".to_string()]), AcquisitionKind::Other);
    }

    #[test]
    fn parses_mapping_with_optional_canonical_name() {
        let payload = r#"{
            "Dota 2 - Gift": {"date": "9 Jul, 2013", "acquisition": "Gift/Guest Pass", "game_name": "Dota 2"},
            "Bad North": {"date": "2 Feb, 2019", "acquisition": "Steam Store"}
        }"#;

        let records = parse_payload(Some(payload));

        assert_eq!(records.len(), 2);
        assert_eq!(
            records["Dota 2 - Gift"].canonical_name.as_deref(),
            Some("Dota 2")
        );
        assert_eq!(records["Bad North"].canonical_name, None);
    }

    #[test]
    fn malformed_or_absent_payloads_are_empty() {
        assert!(parse_payload(None).is_empty());
        assert!(parse_payload(Some("   ")).is_empty());
        assert!(parse_payload(Some("null")).is_empty());
        assert!(parse_payload(Some("{not json")).is_empty());
        assert!(parse_payload(Some("[1, 2, 3]")).is_empty());
    }

    #[test]
    fn skips_individual_bad_entries() {
        let payload = r#"{"Good": {"date": "d", "acquisition": "a"}, "Bad": 42}"#;

        let records = parse_payload(Some(payload));

        assert_eq!(records.len(), 1);
        assert!(records.contains_key("Good"));
    }
}
