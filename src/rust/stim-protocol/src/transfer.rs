// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Protocol export files.
//!
//! A file holds a list of `{color, letter, label, protocol}` entries and the
//! well assignments of the plate. Files written by older versions use
//! snake_case keys and/or the legacy flat pulse schema; both are accepted on
//! import.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::casing::{convert_protocol_casing, snake_to_camel};
use crate::catalog::{ProtocolCatalog, ProtocolEntry};
use crate::compatibility::check_pulse_compatibility;
use crate::validators::has_invalid_pulse;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub protocols: Vec<ProtocolEntry>,
    pub protocol_assignments: IndexMap<String, Option<String>>,
}

pub fn export_document(catalog: &ProtocolCatalog) -> ExportDocument {
    ExportDocument {
        protocols: catalog.entries().cloned().collect(),
        protocol_assignments: catalog.protocol_assignments(),
    }
}

pub fn export_json(catalog: &ProtocolCatalog) -> Result<String> {
    Ok(serde_json::to_string_pretty(&export_document(catalog))?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedProtocol {
    pub label: String,
    /// Letter in the imported file, if it had one.
    pub original_letter: Option<String>,
    /// Letter allocated in the target catalog.
    pub letter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedProtocol {
    pub label: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<ImportedProtocol>,
    /// Labels of imported protocols that contain invalid blocks.
    pub invalid_protocols: Vec<String>,
    pub rejected: Vec<RejectedProtocol>,
    /// Wells of the file whose assignment could not be carried over.
    pub unassigned_wells: Vec<String>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_protocols.is_empty()
            && self.rejected.is_empty()
            && self.unassigned_wells.is_empty()
    }
}

pub fn import_document(catalog: &mut ProtocolCatalog, document: &str) -> Result<ImportReport> {
    let value: Value = serde_json::from_str(document)?;
    import_value(catalog, value)
}

/// Add every protocol of an export file to `catalog`.
///
/// Protocols get fresh letters in file order and the file's well assignments
/// are remapped onto them. A protocol that cannot be converted is skipped and
/// reported; one that converts but has invalid blocks is added and flagged.
pub fn import_value(catalog: &mut ProtocolCatalog, document: Value) -> Result<ImportReport> {
    let document = if document.get("protocol_assignments").is_some() {
        convert_protocol_casing(document, &snake_to_camel)
    } else {
        document
    };
    let Value::Object(mut document) = document else {
        return Err(Error::MalformedProtocol(
            "an export file must be a JSON object".to_string(),
        ));
    };
    let protocols = match document.remove("protocols") {
        Some(Value::Array(protocols)) => protocols,
        Some(_) => {
            return Err(Error::MalformedProtocol(
                "'protocols' must be a list".to_string(),
            ));
        }
        None => vec![],
    };

    let mut report = ImportReport::default();
    let mut letters: HashMap<String, String> = HashMap::new();
    for (idx, mut item) in protocols.into_iter().enumerate() {
        let original_letter = item
            .get("letter")
            .and_then(Value::as_str)
            .map(str::to_string);
        let mut label = item
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let protocol = match item.get_mut("protocol").map(Value::take) {
            Some(protocol) => check_pulse_compatibility(protocol),
            None => Err(Error::MalformedProtocol(format!(
                "entry {idx} has no protocol"
            ))),
        };
        let protocol = match protocol {
            Ok(protocol) => protocol,
            Err(error) => {
                stim_log::warn!("Rejected protocol '{}' on import: {}", label, error);
                report.rejected.push(RejectedProtocol {
                    label,
                    error: error.to_string(),
                });
                continue;
            }
        };
        if label.is_empty() {
            label = protocol.name.clone();
        }
        if has_invalid_pulse(&protocol.detailed_subprotocols, protocol.stimulation_type) {
            stim_log::warn!("Imported protocol '{}' contains invalid pulses", label);
            report.invalid_protocols.push(label.clone());
        }
        let letter = catalog.add_protocol(label.clone(), protocol).letter.clone();
        if let Some(original) = &original_letter {
            letters.insert(original.clone(), letter.clone());
        }
        report.imported.push(ImportedProtocol {
            label,
            original_letter,
            letter,
        });
    }

    if let Some(Value::Object(assignments)) = document.get("protocolAssignments") {
        for (well, letter) in assignments {
            let Some(letter) = letter.as_str() else {
                continue;
            };
            let assigned = letters
                .get(letter)
                .map(|new_letter| catalog.assign_well_by_name(well, new_letter));
            if !matches!(assigned, Some(Ok(()))) {
                report.unassigned_wells.push(well.clone());
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BiphasicPulse, Protocol, StimulationType, Subprotocol, TimedDuration};
    use labware::WellTitle;
    use serde_json::json;
    use stim_units::TimeUnit;

    fn plate() -> WellTitle {
        WellTitle::new(2, 3).unwrap()
    }

    fn valid_protocol(name: &str) -> Protocol {
        Protocol::from_detailed(
            name,
            StimulationType::Current,
            1.0,
            TimeUnit::Seconds,
            true,
            vec![Subprotocol::Biphasic(BiphasicPulse {
                phase_one_duration: 10.0,
                phase_one_charge: 50.0,
                interphase_interval: 5.0,
                phase_two_duration: 10.0,
                phase_two_charge: -50.0,
                postphase_interval: 25.0,
                total_active_duration: TimedDuration::new(1.0, TimeUnit::Seconds),
                num_cycles: Some(20),
                frequency: 20.0,
                color: "#45847b".to_string(),
            })],
        )
    }

    fn legacy_entry() -> Value {
        json!({
            "letter": "A",
            "color": "#45847b",
            "label": "legacy",
            "protocol": {
                "name": "legacy",
                "stimulation_type": "C",
                "rest_duration": 0,
                "time_unit": "seconds",
                "detailed_pulses": [
                    {
                        "type": "Monophasic",
                        "pulse_settings": {
                            "phase_one_duration": 4,
                            "phase_one_charge": -20,
                            "repeat_delay_interval": 96
                        },
                        "repeat": {"color": "#c12b48", "number_of_repeats": 5}
                    }
                ]
            }
        })
    }

    #[test]
    fn test_export_round_trip() {
        let mut source = ProtocolCatalog::new(plate());
        source.add_protocol("first", valid_protocol("first"));
        source.add_protocol("second", valid_protocol("second"));
        source.assign_well_by_name("A1", "B").unwrap();
        source.assign_well_by_name("B3", "A").unwrap();

        let exported = export_json(&source).unwrap();
        let value: Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(value["protocols"][0]["letter"], "A");
        assert_eq!(value["protocols"][1]["protocol"]["name"], "second");
        assert_eq!(value["protocolAssignments"]["A1"], "B");
        assert_eq!(value["protocolAssignments"]["B1"], Value::Null);

        let mut target = ProtocolCatalog::new(plate());
        let report = import_document(&mut target, &exported).unwrap();
        assert!(report.is_clean());
        assert_eq!(export_document(&target), export_document(&source));
    }

    #[test]
    fn test_import_remaps_letters() {
        let mut source = ProtocolCatalog::new(plate());
        source.add_protocol("first", valid_protocol("first"));
        source.assign_well_by_name("A2", "A").unwrap();
        let exported = export_document(&source);

        let mut target = ProtocolCatalog::new(plate());
        target.add_protocol("existing", valid_protocol("existing"));
        let report = import_value(&mut target, serde_json::to_value(&exported).unwrap()).unwrap();
        assert_eq!(
            report.imported,
            vec![ImportedProtocol {
                label: "first".to_string(),
                original_letter: Some("A".to_string()),
                letter: "B".to_string(),
            }]
        );
        assert_eq!(target.protocol_assignments()["A2"], Some("B".to_string()));
    }

    #[test]
    fn test_import_snake_case_legacy_file() {
        let document = json!({
            "protocols": [legacy_entry()],
            "protocol_assignments": {"A1": "A", "B1": null, "C9": "A", "A2": "Z"}
        });
        let mut catalog = ProtocolCatalog::new(plate());
        let mut report = import_value(&mut catalog, document).unwrap();
        assert!(report.rejected.is_empty());
        assert!(report.invalid_protocols.is_empty());
        report.unassigned_wells.sort();
        assert_eq!(report.unassigned_wells, vec!["A2", "C9"]);

        let entry = catalog.get("A").unwrap();
        assert_eq!(entry.label, "legacy");
        let block = &entry.protocol.detailed_subprotocols[0];
        let pulse = block.as_pulse().unwrap();
        assert_eq!(pulse.postphase_interval(), 96.0);
        assert_eq!(pulse.num_cycles(), Some(5));
        assert_eq!(block.color(), Some("#c12b48"));
        assert_eq!(catalog.protocol_assignments()["A1"], Some("A".to_string()));
    }

    #[test]
    fn test_import_file_with_stored_rest_delay() {
        let mut protocol = serde_json::to_value(valid_protocol("p")).unwrap();
        protocol["subprotocols"]
            .as_array_mut()
            .unwrap()
            .push(json!({"type": "Delay", "duration": 1, "unit": "seconds"}));
        let document = json!({
            "protocols": [{"letter": "A", "color": "#45847b", "label": "p", "protocol": protocol}],
            "protocolAssignments": {"A1": "A"}
        });

        let mut catalog = ProtocolCatalog::new(plate());
        let report = import_value(&mut catalog, document).unwrap();
        assert!(report.is_clean(), "{report:?}");
        let imported = &catalog.get("A").unwrap().protocol;
        assert_eq!(imported, &valid_protocol("p"));
        let wire = imported.wire_subprotocols();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[1].kind(), crate::model::PulseKind::Delay);
    }

    #[test]
    fn test_import_flags_and_rejects() {
        let mut unknown = legacy_entry();
        unknown["label"] = json!("unknown");
        unknown["protocol"]["detailed_pulses"][0]["type"] = json!("Triphasic");

        let mut invalid = legacy_entry();
        invalid["letter"] = json!("B");
        invalid["label"] = json!("too strong");
        invalid["protocol"]["detailed_pulses"][0]["pulse_settings"]["phase_one_charge"] =
            json!(500);

        let document = json!({
            "protocols": [unknown, invalid, {"label": "empty"}],
            "protocol_assignments": {"A1": "A", "B1": "B"}
        });
        let mut catalog = ProtocolCatalog::new(plate());
        let report = import_value(&mut catalog, document).unwrap();

        let rejected: Vec<_> = report.rejected.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(rejected, ["unknown", "empty"]);
        assert!(report.rejected[0].error.contains("Triphasic"));
        assert_eq!(report.invalid_protocols, vec!["too strong"]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(report.imported[0].letter, "A");
        assert_eq!(report.unassigned_wells, vec!["A1"]);
        assert_eq!(catalog.protocol_assignments()["B1"], Some("A".to_string()));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_malformed_files() {
        let mut catalog = ProtocolCatalog::new(plate());
        assert!(matches!(
            import_document(&mut catalog, "[]"),
            Err(Error::MalformedProtocol(_))
        ));
        assert!(matches!(
            import_document(&mut catalog, "{\"protocols\": 3}"),
            Err(Error::MalformedProtocol(_))
        ));
        assert!(matches!(
            import_document(&mut catalog, "not json"),
            Err(Error::Json(_))
        ));
        assert!(catalog.is_empty());
    }
}
