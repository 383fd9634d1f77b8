// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Protocol records as edited in the UI and stored in export files.
//!
//! All phase durations are in milliseconds and all charges in mA (current
//! stimulation) or mV (voltage stimulation). Only delays and the total
//! active duration carry their own [`TimeUnit`].

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use stim_units::{Duration, Millisecond, TimeUnit};

use crate::constants::ChargeBounds;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StimulationType {
    #[default]
    #[serde(rename = "C")]
    Current,
    #[serde(rename = "V")]
    Voltage,
}

impl StimulationType {
    pub fn charge_bounds(self) -> ChargeBounds {
        match self {
            StimulationType::Current => ChargeBounds::CURRENT,
            StimulationType::Voltage => ChargeBounds::VOLTAGE,
        }
    }

    pub fn charge_unit(self) -> &'static str {
        match self {
            StimulationType::Current => "mA",
            StimulationType::Voltage => "mV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimedDuration {
    pub duration: f64,
    pub unit: TimeUnit,
}

impl TimedDuration {
    pub fn new(duration: f64, unit: TimeUnit) -> Self {
        Self { duration, unit }
    }

    pub fn as_millis(&self) -> Duration<Millisecond> {
        self.unit.to_millis(self.duration)
    }
}

/// `numCycles` is an integer once derived, `""` while it is not determined.
pub(crate) mod num_cycles_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) => s.serialize_u32(*n),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Float(f64),
            Text(String),
        }

        Ok(match Option::<Raw>::deserialize(d)? {
            None => None,
            Some(Raw::Int(n)) => u32::try_from(n).ok(),
            Some(Raw::Float(f)) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => {
                Some(f as u32)
            }
            Some(Raw::Float(_)) => None,
            Some(Raw::Text(s)) => s.trim().parse::<u32>().ok(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelayBlock {
    pub duration: f64,
    pub unit: TimeUnit,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,
}

impl DelayBlock {
    pub fn new(duration: f64, unit: TimeUnit) -> Self {
        Self {
            duration,
            unit,
            color: String::new(),
        }
    }

    pub fn as_millis(&self) -> Duration<Millisecond> {
        self.unit.to_millis(self.duration)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonophasicPulse {
    pub phase_one_duration: f64,
    pub phase_one_charge: f64,
    pub postphase_interval: f64,
    pub total_active_duration: TimedDuration,
    #[serde(with = "num_cycles_serde")]
    pub num_cycles: Option<u32>,
    pub frequency: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BiphasicPulse {
    pub phase_one_duration: f64,
    pub phase_one_charge: f64,
    pub interphase_interval: f64,
    pub phase_two_duration: f64,
    pub phase_two_charge: f64,
    pub postphase_interval: f64,
    pub total_active_duration: TimedDuration,
    #[serde(with = "num_cycles_serde")]
    pub num_cycles: Option<u32>,
    pub frequency: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopBlock {
    pub num_iterations: u32,
    pub subprotocols: Vec<Subprotocol>,
}

/// One active sub-interval of a pulse cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseComponent {
    pub duration_field: &'static str,
    pub duration: f64,
    /// `None` for the zero-amplitude interphase interval.
    pub charge_field: Option<&'static str>,
    pub charge: f64,
}

impl PhaseComponent {
    pub fn is_interphase(&self) -> bool {
        self.charge_field.is_none()
    }
}

/// Common view of the charge-carrying pulse shapes.
pub trait Pulse {
    fn frequency(&self) -> f64;
    fn num_cycles(&self) -> Option<u32>;
    fn total_active_duration(&self) -> &TimedDuration;
    fn postphase_interval(&self) -> f64;
    /// Phases and interphase interval of one cycle in playback order,
    /// without the trailing postphase interval.
    fn active_components(&self) -> Vec<PhaseComponent>;

    /// `(duration_ms, amplitude)` pairs of one full cycle.
    fn cycle_components(&self) -> Vec<(f64, f64)> {
        let mut components: Vec<(f64, f64)> = self
            .active_components()
            .iter()
            .map(|c| (c.duration, c.charge))
            .collect();
        components.push((self.postphase_interval(), 0.0));
        components
    }
}

impl Pulse for MonophasicPulse {
    fn frequency(&self) -> f64 {
        self.frequency
    }

    fn num_cycles(&self) -> Option<u32> {
        self.num_cycles
    }

    fn total_active_duration(&self) -> &TimedDuration {
        &self.total_active_duration
    }

    fn postphase_interval(&self) -> f64 {
        self.postphase_interval
    }

    fn active_components(&self) -> Vec<PhaseComponent> {
        vec![PhaseComponent {
            duration_field: "phaseOneDuration",
            duration: self.phase_one_duration,
            charge_field: Some("phaseOneCharge"),
            charge: self.phase_one_charge,
        }]
    }
}

impl Pulse for BiphasicPulse {
    fn frequency(&self) -> f64 {
        self.frequency
    }

    fn num_cycles(&self) -> Option<u32> {
        self.num_cycles
    }

    fn total_active_duration(&self) -> &TimedDuration {
        &self.total_active_duration
    }

    fn postphase_interval(&self) -> f64 {
        self.postphase_interval
    }

    fn active_components(&self) -> Vec<PhaseComponent> {
        vec![
            PhaseComponent {
                duration_field: "phaseOneDuration",
                duration: self.phase_one_duration,
                charge_field: Some("phaseOneCharge"),
                charge: self.phase_one_charge,
            },
            PhaseComponent {
                duration_field: "interphaseInterval",
                duration: self.interphase_interval,
                charge_field: None,
                charge: 0.0,
            },
            PhaseComponent {
                duration_field: "phaseTwoDuration",
                duration: self.phase_two_duration,
                charge_field: Some("phaseTwoCharge"),
                charge: self.phase_two_charge,
            },
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PulseKind {
    Delay,
    Monophasic,
    Biphasic,
    Loop,
}

impl Display for PulseKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            PulseKind::Delay => "Delay",
            PulseKind::Monophasic => "Monophasic",
            PulseKind::Biphasic => "Biphasic",
            PulseKind::Loop => "Loop",
        };
        write!(f, "{name}")
    }
}

/// A block of a stimulation protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Subprotocol {
    Delay(DelayBlock),
    Monophasic(MonophasicPulse),
    Biphasic(BiphasicPulse),
    #[serde(alias = "loop")]
    Loop(LoopBlock),
}

impl Subprotocol {
    /// A fresh block of the given kind with every field unset.
    pub fn new_default(kind: PulseKind) -> Self {
        match kind {
            PulseKind::Delay => Subprotocol::Delay(DelayBlock::default()),
            PulseKind::Monophasic => Subprotocol::Monophasic(MonophasicPulse::default()),
            PulseKind::Biphasic => Subprotocol::Biphasic(BiphasicPulse::default()),
            PulseKind::Loop => Subprotocol::Loop(LoopBlock::default()),
        }
    }

    pub fn kind(&self) -> PulseKind {
        match self {
            Subprotocol::Delay(_) => PulseKind::Delay,
            Subprotocol::Monophasic(_) => PulseKind::Monophasic,
            Subprotocol::Biphasic(_) => PulseKind::Biphasic,
            Subprotocol::Loop(_) => PulseKind::Loop,
        }
    }

    /// The charge-carrying view of the block, if it has one.
    pub fn as_pulse(&self) -> Option<&dyn Pulse> {
        match self {
            Subprotocol::Monophasic(p) => Some(p),
            Subprotocol::Biphasic(p) => Some(p),
            Subprotocol::Delay(_) | Subprotocol::Loop(_) => None,
        }
    }

    pub fn color(&self) -> Option<&str> {
        let color = match self {
            Subprotocol::Delay(d) => &d.color,
            Subprotocol::Monophasic(p) => &p.color,
            Subprotocol::Biphasic(p) => &p.color,
            Subprotocol::Loop(_) => return None,
        };
        (!color.is_empty()).then_some(color.as_str())
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        match self {
            Subprotocol::Delay(d) => d.color = color.into(),
            Subprotocol::Monophasic(p) => p.color = color.into(),
            Subprotocol::Biphasic(p) => p.color = color.into(),
            Subprotocol::Loop(_) => {}
        }
    }

    /// The wire-format sibling of a detailed block: identical settings, no
    /// UI colors at any nesting level.
    pub fn to_wire(&self) -> Subprotocol {
        let mut wire = self.clone();
        wire.strip_colors();
        wire
    }

    fn strip_colors(&mut self) {
        match self {
            Subprotocol::Loop(l) => l.subprotocols.iter_mut().for_each(Self::strip_colors),
            other => other.set_color(String::new()),
        }
    }
}

/// A complete protocol as the UI edits it.
///
/// `subprotocols` and `detailed_subprotocols` are two projections of one
/// sequence and must stay index-aligned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stimulation_type: StimulationType,
    #[serde(default)]
    pub rest_duration: f64,
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub run_until_stopped: bool,
    #[serde(default)]
    pub subprotocols: Vec<Subprotocol>,
    #[serde(default)]
    pub detailed_subprotocols: Vec<Subprotocol>,
}

impl Protocol {
    pub fn from_detailed(
        name: impl Into<String>,
        stimulation_type: StimulationType,
        rest_duration: f64,
        time_unit: TimeUnit,
        run_until_stopped: bool,
        detailed_subprotocols: Vec<Subprotocol>,
    ) -> Self {
        let mut protocol = Protocol {
            name: name.into(),
            stimulation_type,
            rest_duration,
            time_unit,
            run_until_stopped,
            subprotocols: vec![],
            detailed_subprotocols: vec![],
        };
        protocol.set_detailed_subprotocols(detailed_subprotocols);
        protocol
    }

    /// Replace the block sequence, re-deriving the wire list from it.
    pub fn set_detailed_subprotocols(&mut self, detailed: Vec<Subprotocol>) {
        self.subprotocols = detailed.iter().map(Subprotocol::to_wire).collect();
        self.detailed_subprotocols = detailed;
    }

    pub fn check_alignment(&self) -> Result<()> {
        if self.subprotocols.len() != self.detailed_subprotocols.len() {
            return Err(Error::MisalignedSubprotocols {
                subprotocols: self.subprotocols.len(),
                detailed: self.detailed_subprotocols.len(),
            });
        }
        for (idx, (wire, detailed)) in self
            .subprotocols
            .iter()
            .zip(&self.detailed_subprotocols)
            .enumerate()
        {
            if wire.kind() != detailed.kind() {
                return Err(Error::new(format!(
                    "Subprotocol {idx} is a {} on the wire but a {} in the detailed list",
                    wire.kind(),
                    detailed.kind()
                )));
            }
        }
        Ok(())
    }

    pub fn rest(&self) -> TimedDuration {
        TimedDuration::new(self.rest_duration, self.time_unit)
    }

    /// The wire list with the rest period appended as a trailing delay.
    ///
    /// Computed on every call, so the rest delay appears exactly once no
    /// matter how often the protocol is serialized.
    pub fn wire_subprotocols(&self) -> Vec<Subprotocol> {
        let mut subprotocols = self.subprotocols.clone();
        if let Some(rest) = crate::waveform::rest_delay(self.rest_duration, self.time_unit) {
            subprotocols.push(rest);
        }
        subprotocols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn biphasic() -> Subprotocol {
        Subprotocol::Biphasic(BiphasicPulse {
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
        })
    }

    #[test]
    fn test_subprotocol_json_shape() {
        let value = serde_json::to_value(biphasic()).unwrap();
        assert_eq!(value["type"], "Biphasic");
        assert_eq!(value["phaseOneDuration"], 10.0);
        assert_eq!(value["totalActiveDuration"]["unit"], "seconds");
        assert_eq!(value["numCycles"], 20);
        assert_eq!(value["color"], "#45847b");

        let back: Subprotocol = serde_json::from_value(value).unwrap();
        assert_eq!(back, biphasic());
    }

    #[test]
    fn test_num_cycles_unset_forms() {
        for raw in [json!(""), json!(null), json!("abc"), json!(-2), json!(1.5)] {
            let block: Subprotocol =
                serde_json::from_value(json!({"type": "Monophasic", "numCycles": raw})).unwrap();
            match block {
                Subprotocol::Monophasic(p) => assert_eq!(p.num_cycles, None, "{raw}"),
                _ => panic!("wrong variant"),
            }
        }
        let block: Subprotocol =
            serde_json::from_value(json!({"type": "Monophasic", "numCycles": "12"})).unwrap();
        assert_eq!(block.as_pulse().unwrap().num_cycles(), Some(12));

        let value = serde_json::to_value(Subprotocol::new_default(PulseKind::Monophasic)).unwrap();
        assert_eq!(value["numCycles"], "");
    }

    #[test]
    fn test_loop_accepts_lowercase_tag() {
        let block: Subprotocol = serde_json::from_value(json!({
            "type": "loop",
            "numIterations": 3,
            "subprotocols": [{"type": "Delay", "duration": 1, "unit": "seconds"}]
        }))
        .unwrap();
        let Subprotocol::Loop(l) = block else {
            panic!("expected loop");
        };
        assert_eq!(l.num_iterations, 3);
        assert_eq!(l.subprotocols[0].kind(), PulseKind::Delay);
    }

    #[test]
    fn test_to_wire_strips_nested_colors() {
        let mut delay = Subprotocol::Delay(DelayBlock::new(1.0, TimeUnit::Seconds));
        delay.set_color("#ffffff");
        let nested = Subprotocol::Loop(LoopBlock {
            num_iterations: 2,
            subprotocols: vec![biphasic(), delay],
        });
        let Subprotocol::Loop(wire) = nested.to_wire() else {
            panic!("expected loop");
        };
        assert!(wire.subprotocols.iter().all(|b| b.color().is_none()));
        assert_eq!(biphasic().color(), Some("#45847b"));
    }

    #[test]
    fn test_active_components() {
        let block = biphasic();
        let pulse = block.as_pulse().unwrap();
        let components = pulse.active_components();
        assert_eq!(components.len(), 3);
        assert!(components[1].is_interphase());
        assert_eq!(
            pulse.cycle_components(),
            vec![(10.0, 50.0), (5.0, 0.0), (10.0, -50.0), (25.0, 0.0)]
        );
    }

    #[test]
    fn test_protocol_alignment() {
        let protocol = Protocol::from_detailed(
            "test",
            StimulationType::Current,
            0.0,
            TimeUnit::Milliseconds,
            true,
            vec![biphasic()],
        );
        assert!(protocol.check_alignment().is_ok());
        assert_eq!(protocol.subprotocols[0].color(), None);

        let mut broken = protocol.clone();
        broken.subprotocols.clear();
        assert!(matches!(
            broken.check_alignment(),
            Err(Error::MisalignedSubprotocols {
                subprotocols: 0,
                detailed: 1
            })
        ));

        let mut swapped = protocol;
        swapped.subprotocols[0] = Subprotocol::new_default(PulseKind::Delay);
        assert!(swapped.check_alignment().is_err());
    }

    #[test]
    fn test_stimulation_type_codes() {
        assert_eq!(serde_json::to_value(StimulationType::Voltage).unwrap(), "V");
        let parsed: StimulationType = serde_json::from_value(json!("C")).unwrap();
        assert_eq!(parsed, StimulationType::Current);
        assert_eq!(parsed.charge_unit(), "mA");
    }
}
