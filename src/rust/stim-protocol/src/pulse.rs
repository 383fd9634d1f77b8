// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Quantities derived from pulse settings, shared by the converter and the validators.

use stim_units::TimeUnit;

use crate::constants::{MAX_DUTY_CYCLE, MAX_PULSE_DURATION_MS};
use crate::model::{Pulse, Subprotocol};

/// Longest allowed active time of one cycle at `frequency`, in whole milliseconds.
///
/// One cycle may occupy at most 80% of the inter-cycle period and never more
/// than 50 ms.
pub fn get_max_pulse_duration_for_freq(frequency: f64) -> f64 {
    (1000.0 / frequency * MAX_DUTY_CYCLE)
        .floor()
        .min(MAX_PULSE_DURATION_MS)
}

/// Active time of one cycle of `pulse` in milliseconds: all phases plus the
/// interphase interval, without the postphase interval.
pub fn get_pulse_duration(pulse: &dyn Pulse) -> f64 {
    pulse.active_components().iter().map(|c| c.duration).sum()
}

/// Active time of one period of `block` in milliseconds.
///
/// For delays this is the delay itself. Loops have no single period and
/// return `None`.
pub fn get_total_active_duration(block: &Subprotocol) -> Option<f64> {
    match block {
        Subprotocol::Delay(d) => Some(d.as_millis().value()),
        Subprotocol::Monophasic(p) => Some(get_pulse_duration(p)),
        Subprotocol::Biphasic(p) => Some(get_pulse_duration(p)),
        Subprotocol::Loop(_) => None,
    }
}

/// Number of cycles that fit into `total_active_duration` at `frequency`.
///
/// Returns `None`, the unset state, if the result is not a finite
/// non-negative number (e.g. a zero frequency).
pub fn calculate_num_cycles(unit: TimeUnit, total_active_duration: f64, frequency: f64) -> Option<u32> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }
    let cycles = unit.to_millis(total_active_duration).value() / 1000.0 * frequency;
    if cycles.is_finite() && cycles >= 0.0 && cycles <= u32::MAX as f64 {
        Some(cycles.round() as u32)
    } else {
        None
    }
}

/// Zero-amplitude gap completing one period at `frequency` after
/// `pulse_duration` milliseconds of activity.
pub fn calculate_postphase_interval(frequency: f64, pulse_duration: f64) -> f64 {
    if !(frequency.is_finite() && frequency > 0.0) {
        return 0.0;
    }
    (1000.0 / frequency - pulse_duration).max(0.0)
}
