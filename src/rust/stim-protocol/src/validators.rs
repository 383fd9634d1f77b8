// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Per-field validation of pulse settings.
//!
//! Every check returns a message, empty when the value is valid. Inputs are
//! the raw strings of the form fields; all context a check depends on is
//! passed in explicitly.

use indexmap::IndexMap;
use stim_units::TimeUnit;

use crate::constants::{
    ChargeBounds, DURATION_TOLERANCE_MS, MAX_FREQUENCY_HZ, MAX_PULSE_DURATION_MS,
    MAX_SUBPROTOCOL_DURATION_MS, MIN_PHASE_DURATION_US, MIN_SUBPROTOCOL_DURATION_MS, messages,
};
use crate::model::{Pulse, StimulationType, Subprotocol};
use crate::pulse::{get_max_pulse_duration_for_freq, get_pulse_duration};
use crate::settings::EngineSettings;

enum Field {
    Empty,
    NotANumber,
    Value(f64),
}

fn parse_field(value: &str) -> Field {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Field::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Field::Value(v),
        _ => Field::NotANumber,
    }
}

macro_rules! parsed_or_return {
    ($value:expr) => {
        match parse_field($value) {
            Field::Empty => return messages::REQUIRED.to_string(),
            Field::NotANumber => return messages::NOT_A_NUMBER.to_string(),
            Field::Value(v) => v,
        }
    };
}

pub fn check_num_cycles_validity(num_cycles: &str) -> String {
    let trimmed = num_cycles.trim();
    if trimmed.is_empty() {
        return messages::REQUIRED.to_string();
    }
    match trimmed.parse::<i64>() {
        Ok(n) if n > 0 => String::new(),
        _ => messages::NUM_CYCLES.to_string(),
    }
}

/// Zero is rejected along with everything else outside the two bands.
pub fn check_pulse_charge_validity(value: &str, stimulation_type: StimulationType) -> String {
    let charge = parsed_or_return!(value);
    charge_error(charge, stimulation_type.charge_bounds())
}

fn charge_error(charge: f64, bounds: ChargeBounds) -> String {
    if bounds.contains(charge) {
        String::new()
    } else {
        messages::charge_band(bounds.min, bounds.max)
    }
}

/// `total_pulse_duration` is the sum of all phase and interphase durations
/// of the cycle the field belongs to, including this one.
pub fn check_pulse_duration_validity(
    value: &str,
    is_interphase_duration: bool,
    max_pulse_duration_for_freq: f64,
    total_pulse_duration: f64,
) -> String {
    let duration = parsed_or_return!(value);
    pulse_duration_error(
        duration,
        is_interphase_duration,
        max_pulse_duration_for_freq,
        total_pulse_duration,
    )
}

fn pulse_duration_error(
    duration: f64,
    is_interphase_duration: bool,
    max_pulse_duration_for_freq: f64,
    total_pulse_duration: f64,
) -> String {
    let min_duration_ms = MIN_PHASE_DURATION_US / 1000.0;
    let zero_interphase = is_interphase_duration && duration == 0.0;
    if duration < min_duration_ms && !zero_interphase {
        messages::min_phase_duration(MIN_PHASE_DURATION_US)
    } else if total_pulse_duration > max_pulse_duration_for_freq + DURATION_TOLERANCE_MS {
        messages::max_pulse_duration(max_pulse_duration_for_freq)
    } else {
        String::new()
    }
}

pub fn check_active_duration_validity(
    value: &str,
    selected_unit: TimeUnit,
    total_pulse_duration: f64,
) -> String {
    let duration = parsed_or_return!(value);
    active_duration_error(duration, selected_unit, total_pulse_duration)
}

fn active_duration_error(duration: f64, unit: TimeUnit, total_pulse_duration: f64) -> String {
    let duration_ms = unit.to_millis(duration).value();
    let min_duration_ms = MIN_SUBPROTOCOL_DURATION_MS.max(total_pulse_duration);
    if duration_ms < min_duration_ms {
        messages::min_subprotocol_duration(min_duration_ms)
    } else if duration_ms > MAX_SUBPROTOCOL_DURATION_MS {
        messages::MAX_SUBPROTOCOL_DURATION.to_string()
    } else {
        String::new()
    }
}

/// Outcome of a frequency check.
///
/// A valid frequency also fixes the maximum active time of one cycle, which
/// the caller feeds into [`check_pulse_duration_validity`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyValidation {
    pub message: String,
    pub max_pulse_duration_for_freq: Option<f64>,
}

impl FrequencyValidation {
    pub fn is_valid(&self) -> bool {
        self.message.is_empty()
    }

    /// The cap to validate phase durations against; the absolute cap while
    /// the frequency is invalid.
    pub fn max_pulse_duration(&self) -> f64 {
        self.max_pulse_duration_for_freq
            .unwrap_or(MAX_PULSE_DURATION_MS)
    }

    /// Message shown on a phase duration exceeding the cap.
    pub fn max_pulse_duration_message(&self) -> String {
        messages::max_pulse_duration(self.max_pulse_duration())
    }
}

pub fn check_pulse_frequency_validity(value: &str) -> FrequencyValidation {
    match parse_field(value) {
        Field::Empty => FrequencyValidation {
            message: messages::REQUIRED.to_string(),
            max_pulse_duration_for_freq: None,
        },
        Field::NotANumber => FrequencyValidation {
            message: messages::NOT_A_NUMBER.to_string(),
            max_pulse_duration_for_freq: None,
        },
        Field::Value(frequency) => frequency_validation(frequency),
    }
}

fn frequency_validation(frequency: f64) -> FrequencyValidation {
    if frequency <= 0.0 || frequency > MAX_FREQUENCY_HZ {
        FrequencyValidation {
            message: messages::FREQUENCY.to_string(),
            max_pulse_duration_for_freq: None,
        }
    } else {
        FrequencyValidation {
            message: String::new(),
            max_pulse_duration_for_freq: Some(get_max_pulse_duration_for_freq(frequency)),
        }
    }
}

pub fn check_delay_pulse_validity(value: &str, selected_unit: TimeUnit) -> String {
    match parse_field(value) {
        Field::Empty => messages::REQUIRED.to_string(),
        Field::NotANumber => messages::NOT_POSITIVE.to_string(),
        Field::Value(duration) => delay_error(duration, selected_unit),
    }
}

fn delay_error(duration: f64, unit: TimeUnit) -> String {
    if duration < 0.0 {
        return messages::NOT_POSITIVE.to_string();
    }
    let duration_ms = unit.to_millis(duration).value();
    if duration_ms < MIN_SUBPROTOCOL_DURATION_MS {
        messages::min_subprotocol_duration(MIN_SUBPROTOCOL_DURATION_MS)
    } else if duration_ms > MAX_SUBPROTOCOL_DURATION_MS {
        messages::MAX_SUBPROTOCOL_DURATION.to_string()
    } else if (duration_ms - duration_ms.round()).abs() > DURATION_TOLERANCE_MS {
        messages::WHOLE_MILLISECONDS.to_string()
    } else {
        String::new()
    }
}

/// Validation messages of every invalid field of one block, keyed by the
/// camelCase field name. Empty when the block is valid.
///
/// Loops report only their own iteration count; their children are checked
/// by [`has_invalid_pulse`].
pub fn block_errors(
    block: &Subprotocol,
    stimulation_type: StimulationType,
) -> IndexMap<&'static str, String> {
    let mut errors = IndexMap::new();
    match block {
        Subprotocol::Delay(delay) => {
            errors.insert("duration", delay_error(delay.duration, delay.unit));
        }
        Subprotocol::Monophasic(pulse) => {
            pulse_errors(pulse, stimulation_type, &mut errors);
        }
        Subprotocol::Biphasic(pulse) => {
            pulse_errors(pulse, stimulation_type, &mut errors);
        }
        Subprotocol::Loop(l) => {
            if l.num_iterations == 0 {
                errors.insert("numIterations", messages::NUM_CYCLES.to_string());
            }
        }
    }
    errors.retain(|_, msg| !msg.is_empty());
    errors
}

fn pulse_errors(
    pulse: &dyn Pulse,
    stimulation_type: StimulationType,
    errors: &mut IndexMap<&'static str, String>,
) {
    let frequency = frequency_validation(pulse.frequency());
    let max_pulse_duration = frequency.max_pulse_duration();
    let total_pulse_duration = get_pulse_duration(pulse);
    let bounds = stimulation_type.charge_bounds();

    for component in pulse.active_components() {
        errors.insert(
            component.duration_field,
            pulse_duration_error(
                component.duration,
                component.is_interphase(),
                max_pulse_duration,
                total_pulse_duration,
            ),
        );
        if let Some(charge_field) = component.charge_field {
            errors.insert(charge_field, charge_error(component.charge, bounds));
        }
    }
    errors.insert("postphaseInterval", postphase_error(pulse.postphase_interval()));
    errors.insert("frequency", frequency.message);
    let num_cycles = pulse
        .num_cycles()
        .map(|n| n.to_string())
        .unwrap_or_default();
    errors.insert("numCycles", check_num_cycles_validity(&num_cycles));
    let active = pulse.total_active_duration();
    errors.insert(
        "totalActiveDuration",
        active_duration_error(active.duration, active.unit, total_pulse_duration),
    );
}

fn postphase_error(postphase_interval: f64) -> String {
    if postphase_interval >= 0.0 {
        String::new()
    } else {
        messages::NEGATIVE.to_string()
    }
}

/// Whether any block, including blocks nested in loops, is invalid.
///
/// Loops nested deeper than the configured limit count as invalid.
pub fn has_invalid_pulse(subprotocols: &[Subprotocol], stimulation_type: StimulationType) -> bool {
    has_invalid_pulse_with(subprotocols, stimulation_type, &EngineSettings::default())
}

pub fn has_invalid_pulse_with(
    subprotocols: &[Subprotocol],
    stimulation_type: StimulationType,
    settings: &EngineSettings,
) -> bool {
    fn walk(
        blocks: &[Subprotocol],
        stimulation_type: StimulationType,
        depth: usize,
        max_depth: usize,
    ) -> bool {
        blocks.iter().any(|block| {
            if !block_errors(block, stimulation_type).is_empty() {
                return true;
            }
            match block {
                Subprotocol::Loop(l) if depth >= max_depth => !l.subprotocols.is_empty(),
                Subprotocol::Loop(l) => walk(&l.subprotocols, stimulation_type, depth + 1, max_depth),
                _ => false,
            }
        })
    }
    walk(subprotocols, stimulation_type, 0, settings.max_loop_depth())
}
