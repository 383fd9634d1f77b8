// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! The stimulation message sent to the instrument.
//!
//! Timing is expressed in whole microseconds and current in whole µA. Voltage
//! stays in mV. Field names are snake_case.

use indexmap::IndexMap;
use serde::Serialize;
use stim_units::milliseconds;

use crate::catalog::ProtocolCatalog;
use crate::model::{Protocol, StimulationType, Subprotocol};
use crate::validators::has_invalid_pulse;
use crate::{Error, Result};

const MICROAMPS_PER_MILLIAMP: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DevicePulse {
    Delay {
        duration: i64,
    },
    Monophasic {
        phase_one_duration: i64,
        phase_one_charge: i64,
        postphase_interval: i64,
        num_cycles: u32,
    },
    Biphasic {
        phase_one_duration: i64,
        phase_one_charge: i64,
        interphase_interval: i64,
        phase_two_duration: i64,
        phase_two_charge: i64,
        postphase_interval: i64,
        num_cycles: u32,
    },
    #[serde(rename = "loop")]
    Loop {
        num_iterations: u32,
        subprotocols: Vec<DevicePulse>,
    },
}

fn to_micros(duration_ms: f64) -> i64 {
    milliseconds(duration_ms).to_microseconds().round_to_integer()
}

fn device_charge(charge: f64, stimulation_type: StimulationType) -> i64 {
    match stimulation_type {
        StimulationType::Current => (charge * MICROAMPS_PER_MILLIAMP).round() as i64,
        StimulationType::Voltage => charge.round() as i64,
    }
}

impl DevicePulse {
    /// Convert one wire-format block. `index` is the block's position and
    /// only used for error reporting.
    pub fn from_subprotocol(
        block: &Subprotocol,
        index: usize,
        stimulation_type: StimulationType,
    ) -> Result<Self> {
        let charge = |value: f64| device_charge(value, stimulation_type);
        let pulse = match block {
            Subprotocol::Delay(delay) => DevicePulse::Delay {
                duration: delay.as_millis().to_microseconds().round_to_integer(),
            },
            Subprotocol::Monophasic(p) => DevicePulse::Monophasic {
                phase_one_duration: to_micros(p.phase_one_duration),
                phase_one_charge: charge(p.phase_one_charge),
                postphase_interval: to_micros(p.postphase_interval),
                num_cycles: p.num_cycles.ok_or(Error::MissingNumCycles { index })?,
            },
            Subprotocol::Biphasic(p) => DevicePulse::Biphasic {
                phase_one_duration: to_micros(p.phase_one_duration),
                phase_one_charge: charge(p.phase_one_charge),
                interphase_interval: to_micros(p.interphase_interval),
                phase_two_duration: to_micros(p.phase_two_duration),
                phase_two_charge: charge(p.phase_two_charge),
                postphase_interval: to_micros(p.postphase_interval),
                num_cycles: p.num_cycles.ok_or(Error::MissingNumCycles { index })?,
            },
            Subprotocol::Loop(l) => DevicePulse::Loop {
                num_iterations: l.num_iterations,
                subprotocols: l
                    .subprotocols
                    .iter()
                    .enumerate()
                    .map(|(idx, b)| DevicePulse::from_subprotocol(b, idx, stimulation_type))
                    .collect::<Result<_>>()?,
            },
        };
        Ok(pulse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceProtocol {
    pub protocol_id: String,
    pub stimulation_type: StimulationType,
    pub run_until_stopped: bool,
    pub subprotocols: Vec<DevicePulse>,
}

impl DeviceProtocol {
    /// Device form of `protocol`, including its trailing rest period.
    pub fn from_protocol(protocol_id: &str, protocol: &Protocol) -> Result<Self> {
        let subprotocols = protocol
            .wire_subprotocols()
            .iter()
            .enumerate()
            .map(|(idx, b)| DevicePulse::from_subprotocol(b, idx, protocol.stimulation_type))
            .collect::<Result<_>>()?;
        Ok(DeviceProtocol {
            protocol_id: protocol_id.to_string(),
            stimulation_type: protocol.stimulation_type,
            run_until_stopped: protocol.run_until_stopped,
            subprotocols,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StimulationMessage {
    pub protocols: Vec<DeviceProtocol>,
    pub protocol_assignments: IndexMap<String, Option<String>>,
}

impl StimulationMessage {
    /// Build the message for every protocol of `catalog`.
    ///
    /// Fails on the first protocol that contains an invalid block.
    pub fn from_catalog(catalog: &ProtocolCatalog) -> Result<Self> {
        let protocols = catalog
            .entries()
            .map(|entry| {
                let protocol = &entry.protocol;
                if has_invalid_pulse(&protocol.detailed_subprotocols, protocol.stimulation_type) {
                    return Err(Error::InvalidProtocol {
                        letter: entry.letter.clone(),
                    });
                }
                DeviceProtocol::from_protocol(&entry.letter, protocol)
            })
            .collect::<Result<_>>()?;
        Ok(StimulationMessage {
            protocols,
            protocol_assignments: catalog.protocol_assignments(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
