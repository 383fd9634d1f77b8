// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Upgrade of protocols stored in the legacy flat "pulses" schema.
//!
//! Legacy protocols have no `subprotocols` key. Each entry of their
//! `detailedPulses` list splits its settings over `pulseSettings`,
//! `stimSettings` and `repeat`:
//!
//! ```json
//! {
//!   "type": "Biphasic",
//!   "pulseSettings": {"phaseOneDuration": 10, "phaseOneCharge": 50, ...},
//!   "stimSettings": {"totalActiveDuration": {"duration": 1, "unit": "seconds"}, "frequency": 20},
//!   "repeat": {"color": "#45847b", "numberOfRepeats": 20}
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;
use stim_units::TimeUnit;

use crate::model::{
    BiphasicPulse, DelayBlock, MonophasicPulse, Protocol, StimulationType, Subprotocol, TimedDuration,
};
use crate::pulse::{calculate_num_cycles, get_pulse_duration};
use crate::waveform::rest_delay;
use crate::{Error, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyProtocol {
    name: String,
    stimulation_type: StimulationType,
    rest_duration: f64,
    time_unit: TimeUnit,
    #[serde(default = "default_run_until_stopped")]
    run_until_stopped: bool,
    detailed_pulses: Vec<Value>,
}

fn default_run_until_stopped() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyPulse {
    pulse_settings: LegacyPulseSettings,
    stim_settings: LegacyStimSettings,
    repeat: LegacyRepeat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyPulseSettings {
    phase_one_duration: Option<f64>,
    phase_one_charge: Option<f64>,
    interphase_interval: Option<f64>,
    phase_two_duration: Option<f64>,
    phase_two_charge: Option<f64>,
    #[serde(alias = "repeatDelayInterval")]
    postphase_interval: Option<f64>,
    frequency: Option<f64>,
    duration: Option<f64>,
    unit: Option<TimeUnit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyStimSettings {
    total_active_duration: Option<LegacyActiveDuration>,
    frequency: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyActiveDuration {
    Timed(TimedDuration),
    Millis(f64),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyRepeat {
    color: String,
    number_of_repeats: Option<u32>,
}

macro_rules! copy_settings {
    ($target:expr, $source:expr, [$($field:ident),+ $(,)?]) => {
        $(
            if let Some(value) = $source.$field {
                $target.$field = value;
            }
        )+
    };
}

/// Bring a protocol into the current nested schema.
///
/// Protocols that already carry a `subprotocols` key are parsed as they
/// are, apart from a stored rest delay, so applying the conversion twice is
/// the same as applying it once.
pub fn check_pulse_compatibility(protocol: Value) -> Result<Protocol> {
    let Value::Object(map) = &protocol else {
        return Err(Error::MalformedProtocol(
            "a protocol must be a JSON object".to_string(),
        ));
    };
    if map.contains_key("subprotocols") {
        let mut protocol: Protocol = serde_json::from_value(protocol)?;
        strip_stored_rest_delay(&mut protocol);
        protocol.check_alignment()?;
        return Ok(protocol);
    }

    let legacy: LegacyProtocol = serde_json::from_value(protocol)?;
    let detailed = legacy
        .detailed_pulses
        .into_iter()
        .enumerate()
        .map(|(index, entry)| convert_legacy_pulse(index, entry))
        .collect::<Result<Vec<_>>>()?;
    Ok(Protocol::from_detailed(
        legacy.name,
        legacy.stimulation_type,
        legacy.rest_duration,
        legacy.time_unit,
        legacy.run_until_stopped,
        detailed,
    ))
}

/// Older writers stored the rest period as a trailing wire delay. It is
/// derived from `restDuration` again on output, so drop the stored copy.
fn strip_stored_rest_delay(protocol: &mut Protocol) {
    if protocol.subprotocols.len() != protocol.detailed_subprotocols.len() + 1 {
        return;
    }
    let Some(Subprotocol::Delay(rest)) = rest_delay(protocol.rest_duration, protocol.time_unit)
    else {
        return;
    };
    let stored_rest = matches!(
        protocol.subprotocols.last(),
        Some(Subprotocol::Delay(stored)) if stored.as_millis() == rest.as_millis()
    );
    if stored_rest {
        stim_log::debug!("Dropped stored rest delay of protocol '{}'", protocol.name);
        protocol.subprotocols.pop();
    }
}

/// The pulse kinds the legacy schema knows; it has no loops.
#[derive(Debug, Clone, Copy)]
enum LegacyKind {
    Delay,
    Monophasic,
    Biphasic,
}

fn legacy_pulse_kind(index: usize, entry: &Value) -> Result<LegacyKind> {
    let kind = entry.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "Delay" => Ok(LegacyKind::Delay),
        "Monophasic" => Ok(LegacyKind::Monophasic),
        "Biphasic" => Ok(LegacyKind::Biphasic),
        other => Err(Error::UnknownPulseType {
            index,
            kind: other.to_string(),
        }),
    }
}

fn convert_legacy_pulse(index: usize, entry: Value) -> Result<Subprotocol> {
    let kind = legacy_pulse_kind(index, &entry)?;
    let legacy: LegacyPulse = serde_json::from_value(entry)?;
    let settings = legacy.pulse_settings;

    let mut block = match kind {
        LegacyKind::Delay => {
            Subprotocol::Delay(legacy_delay(index, &settings, &legacy.stim_settings)?)
        }
        LegacyKind::Monophasic => {
            let mut pulse = MonophasicPulse::default();
            copy_settings!(
                pulse,
                settings,
                [phase_one_duration, phase_one_charge, postphase_interval]
            );
            pulse.frequency =
                legacy_frequency(&legacy.stim_settings, &settings, get_pulse_duration(&pulse));
            pulse.total_active_duration =
                legacy_active_duration(&legacy.stim_settings, &legacy.repeat, pulse.frequency);
            pulse.num_cycles = calculate_num_cycles(
                pulse.total_active_duration.unit,
                pulse.total_active_duration.duration,
                pulse.frequency,
            );
            Subprotocol::Monophasic(pulse)
        }
        LegacyKind::Biphasic => {
            let mut pulse = BiphasicPulse::default();
            copy_settings!(
                pulse,
                settings,
                [
                    phase_one_duration,
                    phase_one_charge,
                    interphase_interval,
                    phase_two_duration,
                    phase_two_charge,
                    postphase_interval,
                ]
            );
            pulse.frequency =
                legacy_frequency(&legacy.stim_settings, &settings, get_pulse_duration(&pulse));
            pulse.total_active_duration =
                legacy_active_duration(&legacy.stim_settings, &legacy.repeat, pulse.frequency);
            pulse.num_cycles = calculate_num_cycles(
                pulse.total_active_duration.unit,
                pulse.total_active_duration.duration,
                pulse.frequency,
            );
            Subprotocol::Biphasic(pulse)
        }
    };
    block.set_color(legacy.repeat.color);
    Ok(block)
}

/// Delays keep their length under `duration`, under the active duration of
/// `stimSettings`, or as `phaseOneDuration` in ms, depending on the writer.
fn legacy_delay(
    index: usize,
    settings: &LegacyPulseSettings,
    stim_settings: &LegacyStimSettings,
) -> Result<DelayBlock> {
    if let Some(duration) = settings.duration {
        return Ok(DelayBlock::new(duration, settings.unit.unwrap_or_default()));
    }
    match &stim_settings.total_active_duration {
        Some(LegacyActiveDuration::Timed(timed)) => Ok(DelayBlock::new(timed.duration, timed.unit)),
        Some(LegacyActiveDuration::Millis(ms)) => {
            Ok(DelayBlock::new(*ms, TimeUnit::Milliseconds))
        }
        None => settings
            .phase_one_duration
            .map(|ms| DelayBlock::new(ms, TimeUnit::Milliseconds))
            .ok_or_else(|| Error::MalformedProtocol(format!("delay {index} has no duration"))),
    }
}

/// Explicit frequency if the file has one, else the frequency implied by one
/// cycle's active time plus its postphase interval.
fn legacy_frequency(
    stim_settings: &LegacyStimSettings,
    settings: &LegacyPulseSettings,
    pulse_duration: f64,
) -> f64 {
    if let Some(frequency) = stim_settings.frequency.or(settings.frequency) {
        return frequency;
    }
    let period = pulse_duration + settings.postphase_interval.unwrap_or(0.0);
    if period > 0.0 { 1000.0 / period } else { 0.0 }
}

/// Explicit active duration if the file has one, else the span of
/// `numberOfRepeats` cycles at `frequency`.
fn legacy_active_duration(
    stim_settings: &LegacyStimSettings,
    repeat: &LegacyRepeat,
    frequency: f64,
) -> TimedDuration {
    match &stim_settings.total_active_duration {
        Some(LegacyActiveDuration::Timed(timed)) => *timed,
        Some(LegacyActiveDuration::Millis(ms)) => TimedDuration::new(*ms, TimeUnit::Milliseconds),
        None => {
            let repeats = repeat.number_of_repeats.unwrap_or(0) as f64;
            let duration = if frequency > 0.0 {
                repeats * 1000.0 / frequency
            } else {
                0.0
            };
            TimedDuration::new(duration, TimeUnit::Milliseconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_protocol() -> Value {
        json!({
            "name": "legacy",
            "stimulationType": "C",
            "restDuration": 20,
            "timeUnit": "milliseconds",
            "pulses": [],
            "detailedPulses": [
                {
                    "type": "Biphasic",
                    "pulseSettings": {
                        "phaseOneDuration": 10,
                        "phaseOneCharge": 50,
                        "interphaseInterval": 5,
                        "phaseTwoDuration": 10,
                        "phaseTwoCharge": -50,
                        "postphaseInterval": 25
                    },
                    "stimSettings": {
                        "totalActiveDuration": {"duration": 1, "unit": "seconds"},
                        "frequency": 20
                    },
                    "repeat": {"color": "#45847b", "numberOfRepeats": 20}
                },
                {
                    "type": "Delay",
                    "pulseSettings": {"duration": 300, "unit": "milliseconds"},
                    "repeat": {"color": "#94ad44"}
                },
                {
                    "type": "Monophasic",
                    "pulseSettings": {
                        "phaseOneDuration": 4,
                        "phaseOneCharge": -20,
                        "repeatDelayInterval": 96
                    },
                    "repeat": {"color": "#c12b48", "numberOfRepeats": 5}
                }
            ]
        })
    }

    #[test]
    fn test_legacy_conversion() {
        let protocol = check_pulse_compatibility(legacy_protocol()).unwrap();
        assert_eq!(protocol.name, "legacy");
        assert_eq!(protocol.rest_duration, 20.0);
        assert!(protocol.run_until_stopped);
        assert_eq!(protocol.detailed_subprotocols.len(), 3);
        assert!(protocol.check_alignment().is_ok());

        let Subprotocol::Biphasic(bi) = &protocol.detailed_subprotocols[0] else {
            panic!("expected biphasic");
        };
        assert_eq!(bi.phase_two_charge, -50.0);
        assert_eq!(bi.frequency, 20.0);
        assert_eq!(bi.num_cycles, Some(20));
        assert_eq!(bi.color, "#45847b");

        let Subprotocol::Delay(delay) = &protocol.detailed_subprotocols[1] else {
            panic!("expected delay");
        };
        assert_eq!(delay.duration, 300.0);
        assert_eq!(delay.color, "#94ad44");

        // Frequency and active duration are derived from the old repeat settings.
        let mono = protocol.detailed_subprotocols[2].as_pulse().unwrap();
        assert_eq!(mono.frequency(), 10.0);
        assert_eq!(mono.postphase_interval(), 96.0);
        assert_eq!(mono.total_active_duration().duration, 500.0);
        assert_eq!(mono.num_cycles(), Some(5));

        assert_eq!(protocol.subprotocols[0].color(), None);
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let first = check_pulse_compatibility(legacy_protocol()).unwrap();
        let as_json = serde_json::to_value(&first).unwrap();
        assert!(as_json.get("subprotocols").is_some());
        let second = check_pulse_compatibility(as_json).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_pulse_type_is_rejected() {
        let mut protocol = legacy_protocol();
        protocol["detailedPulses"][1]["type"] = json!("Triphasic");
        let err = check_pulse_compatibility(protocol).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownPulseType { index: 1, ref kind } if kind == "Triphasic"
        ));
    }

    #[test]
    fn test_templates_are_independent() {
        let protocol = check_pulse_compatibility(json!({
            "name": "two",
            "detailedPulses": [
                {"type": "Monophasic", "pulseSettings": {"phaseOneDuration": 3}},
                {"type": "Monophasic", "pulseSettings": {"phaseOneCharge": 7}}
            ]
        }))
        .unwrap();
        let Subprotocol::Monophasic(second) = &protocol.detailed_subprotocols[1] else {
            panic!("expected monophasic");
        };
        assert_eq!(second.phase_one_duration, 0.0);
        assert_eq!(second.phase_one_charge, 7.0);
        assert_eq!(second.num_cycles, None);
    }

    #[test]
    fn test_legacy_delay_duration_sources() {
        let convert = |entry: Value| -> Result<f64> {
            let protocol = check_pulse_compatibility(json!({"detailedPulses": [entry]}))?;
            match &protocol.detailed_subprotocols[0] {
                Subprotocol::Delay(delay) => Ok(delay.as_millis().value()),
                other => panic!("expected delay, got {other:?}"),
            }
        };

        let from_active = convert(json!({
            "type": "Delay",
            "pulseSettings": {"phaseOneDuration": 2000},
            "stimSettings": {"totalActiveDuration": {"duration": 2, "unit": "seconds"}}
        }));
        assert_eq!(from_active.unwrap(), 2000.0);

        let from_phase = convert(json!({
            "type": "Delay",
            "pulseSettings": {"phaseOneDuration": 750}
        }));
        assert_eq!(from_phase.unwrap(), 750.0);

        let missing = convert(json!({"type": "Delay", "repeat": {"color": "#94ad44"}}));
        assert!(matches!(missing, Err(Error::MalformedProtocol(_))));
    }

    #[test]
    fn test_stored_rest_delay_is_dropped() {
        let stored = json!({
            "name": "rest",
            "restDuration": 1,
            "timeUnit": "seconds",
            "subprotocols": [
                {"type": "Delay", "duration": 200, "unit": "milliseconds"},
                {"type": "Delay", "duration": 1000, "unit": "milliseconds"}
            ],
            "detailedSubprotocols": [
                {"type": "Delay", "duration": 200, "unit": "milliseconds", "color": "#94ad44"}
            ]
        });
        let protocol = check_pulse_compatibility(stored.clone()).unwrap();
        assert_eq!(protocol.subprotocols.len(), 1);
        assert_eq!(protocol.wire_subprotocols().len(), 2);

        // A trailing delay that is not the rest period stays and is misaligned.
        let mut other = stored;
        other["subprotocols"][1]["duration"] = json!(500);
        assert!(matches!(
            check_pulse_compatibility(other),
            Err(Error::MisalignedSubprotocols {
                subprotocols: 2,
                detailed: 1
            })
        ));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            check_pulse_compatibility(json!([1, 2])),
            Err(Error::MalformedProtocol(_))
        ));
        assert!(matches!(
            check_pulse_compatibility(json!({"subprotocols": [{"type": "Delay"}]})),
            Err(Error::MisalignedSubprotocols { .. })
        ));
    }
}
