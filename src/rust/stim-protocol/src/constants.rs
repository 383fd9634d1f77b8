// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Numeric bounds, validation messages and the protocol color palette.

pub const MIN_PHASE_DURATION_US: f64 = 20.0;
/// Absolute cap on one cycle's active time, regardless of frequency.
pub const MAX_PULSE_DURATION_MS: f64 = 50.0;
/// Fraction of the inter-cycle period one cycle may be active.
pub const MAX_DUTY_CYCLE: f64 = 0.8;
pub const MAX_FREQUENCY_HZ: f64 = 100.0;

pub const MIN_CHARGE_MA: f64 = 1.0;
pub const MAX_CHARGE_MA: f64 = 100.0;
pub const MIN_CHARGE_MV: f64 = 1.0;
pub const MAX_CHARGE_MV: f64 = 1200.0;

pub const MIN_SUBPROTOCOL_DURATION_MS: f64 = 100.0;
pub const MAX_SUBPROTOCOL_DURATION_MS: f64 = 24.0 * 60.0 * 60e3;

/// Comparison slack for sums of user-entered millisecond values.
pub(crate) const DURATION_TOLERANCE_MS: f64 = 1e-9;

pub mod messages {
    pub const REQUIRED: &str = "Required";
    pub const NOT_A_NUMBER: &str = "Must be a number";
    pub const NOT_POSITIVE: &str = "Must be a positive number";
    pub const NEGATIVE: &str = "Must be a number >= 0";
    pub const NUM_CYCLES: &str = "Must be a whole number > 0";
    pub const FREQUENCY: &str = "Must be a positive number <= 100";
    pub const MAX_SUBPROTOCOL_DURATION: &str = "Must be <= 24hrs";
    pub const WHOLE_MILLISECONDS: &str = "Must be a whole number of ms";

    pub fn min_phase_duration(min_us: f64) -> String {
        format!("Duration must be >= {min_us}μs")
    }

    pub fn max_pulse_duration(max_ms: f64) -> String {
        format!("Total active duration must be <= {max_ms}ms")
    }

    pub fn min_subprotocol_duration(min_ms: f64) -> String {
        format!("Must be >= {min_ms}ms")
    }

    pub fn charge_band(min: f64, max: f64) -> String {
        format!("Must be within [-{min}, -{max}] or [{min}, {max}]")
    }
}

/// Valid magnitudes of a phase charge; the sign is free.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeBounds {
    pub min: f64,
    pub max: f64,
}

impl ChargeBounds {
    pub const CURRENT: ChargeBounds = ChargeBounds {
        min: MIN_CHARGE_MA,
        max: MAX_CHARGE_MA,
    };
    pub const VOLTAGE: ChargeBounds = ChargeBounds {
        min: MIN_CHARGE_MV,
        max: MAX_CHARGE_MV,
    };

    pub fn contains(&self, charge: f64) -> bool {
        (self.min..=self.max).contains(&charge.abs())
    }
}

/// Protocol colors, handed out in creation order.
pub const COLOR_PALETTE: [&str; 26] = [
    "#45847b", "#94ad44", "#c12b48", "#5c39a0", "#e7b040", "#2a7ab0", "#d35f2d", "#7d9a9b",
    "#9b3d8a", "#3fa35c", "#b8860b", "#4a5fc1", "#e06c84", "#1d8e8e", "#8c6d3f", "#6c8ed1",
    "#a83232", "#5f9e3a", "#c779d0", "#2e4b6b", "#d9a05b", "#4bb3a3", "#7a4fa3", "#b35c1e",
    "#3b7d3b", "#d1495b",
];

pub const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
