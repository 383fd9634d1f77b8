// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Letter and color labels for the protocols of one session, and the wells
//! they are assigned to.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use labware::WellTitle;
use serde::{Deserialize, Serialize};

use crate::constants::{ALPHABET, COLOR_PALETTE};
use crate::model::Protocol;
use crate::{Error, Result};

/// Letter code of allocation slot `slot`.
///
/// The alphabet repeats with growing run length: `A..Z`, then `AA..ZZ`,
/// then `AAA..ZZZ` and so on.
pub fn protocol_letter(slot: usize) -> String {
    let letter = char::from(ALPHABET[slot % ALPHABET.len()]);
    std::iter::repeat_n(letter, slot / ALPHABET.len() + 1).collect()
}

pub fn protocol_color(slot: usize) -> &'static str {
    COLOR_PALETTE[slot % COLOR_PALETTE.len()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolAssignment {
    pub letter: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolEntry {
    pub letter: String,
    pub color: String,
    pub label: String,
    pub protocol: Protocol,
}

/// The protocols of a session keyed by letter, in creation order.
///
/// Slots are consumed strictly in order and never handed out twice, so a
/// removed protocol's letter stays retired.
#[derive(Debug, Clone)]
pub struct ProtocolCatalog {
    entries: IndexMap<String, ProtocolEntry>,
    next_slot: usize,
    plate: WellTitle,
    assignments: BTreeMap<usize, String>,
}

impl ProtocolCatalog {
    pub fn new(plate: WellTitle) -> Self {
        ProtocolCatalog {
            entries: IndexMap::new(),
            next_slot: 0,
            plate,
            assignments: BTreeMap::new(),
        }
    }

    /// The letter and color the next added protocol will receive.
    pub fn next_assignment(&self) -> ProtocolAssignment {
        ProtocolAssignment {
            letter: protocol_letter(self.next_slot),
            color: protocol_color(self.next_slot).to_string(),
        }
    }

    pub fn add_protocol(&mut self, label: impl Into<String>, protocol: Protocol) -> &ProtocolEntry {
        let ProtocolAssignment { letter, color } = self.next_assignment();
        self.next_slot += 1;
        let label = label.into();
        stim_log::info!("Added protocol '{}' as {}", label, letter);
        let (idx, _) = self.entries.insert_full(
            letter.clone(),
            ProtocolEntry {
                letter,
                color,
                label,
                protocol,
            },
        );
        &self.entries[idx]
    }

    /// Replace label and protocol of an entry, keeping its letter and color.
    pub fn edit_protocol(
        &mut self,
        letter: &str,
        label: impl Into<String>,
        protocol: Protocol,
    ) -> Result<&ProtocolEntry> {
        let entry = self
            .entries
            .get_mut(letter)
            .ok_or_else(|| Error::UnknownProtocol(letter.to_string()))?;
        entry.label = label.into();
        entry.protocol = protocol;
        Ok(entry)
    }

    /// Remove an entry and clear every well assigned to it.
    pub fn remove_protocol(&mut self, letter: &str) -> Result<ProtocolEntry> {
        let entry = self
            .entries
            .shift_remove(letter)
            .ok_or_else(|| Error::UnknownProtocol(letter.to_string()))?;
        self.assignments.retain(|_, assigned| assigned != letter);
        Ok(entry)
    }

    pub fn get(&self, letter: &str) -> Option<&ProtocolEntry> {
        self.entries.get(letter)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ProtocolEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn plate(&self) -> &WellTitle {
        &self.plate
    }

    pub fn assign_well(&mut self, well_index: usize, letter: &str) -> Result<()> {
        if !self.entries.contains_key(letter) {
            return Err(Error::UnknownProtocol(letter.to_string()));
        }
        if well_index >= self.plate.num_wells() {
            return Err(labware::Error::WellOutOfRange {
                name: format!("#{well_index}"),
                num_rows: self.plate.num_rows(),
                num_columns: self.plate.num_columns(),
            }
            .into());
        }
        self.assignments.insert(well_index, letter.to_string());
        Ok(())
    }

    pub fn assign_well_by_name(&mut self, well_name: &str, letter: &str) -> Result<()> {
        let well_index = self.plate.get_well_idx_from_well_name(well_name)?;
        self.assign_well(well_index, letter)
    }

    /// Clear a well, returning the letter it was assigned to.
    pub fn unassign_well(&mut self, well_index: usize) -> Option<String> {
        self.assignments.remove(&well_index)
    }

    /// Letter assigned to every well of the plate, keyed by unpadded well
    /// name in well index order.
    pub fn protocol_assignments(&self) -> IndexMap<String, Option<String>> {
        self.plate
            .well_names(false)
            .enumerate()
            .map(|(idx, name)| (name, self.assignments.get(&idx).cloned()))
            .collect()
    }
}
