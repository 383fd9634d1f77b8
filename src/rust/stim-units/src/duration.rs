// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use num_traits::Float;
use std::fmt::Result as FormatterResult;
use std::fmt::{Debug, Display, Formatter};

/// Conversion factor from milliseconds to microseconds.
pub const MICROS_PER_MILLI: f64 = 1000.0;

/// A duration tagged with a zero-sized unit type.
///
/// Pulse timing fields are stored in milliseconds while the device expects
/// microseconds; keeping the unit in the type makes it impossible to mix the two.
///
/// # Examples
/// ```rust
/// use stim_units::duration::milliseconds;
///
/// let phase = milliseconds(1.5);
/// assert_eq!(phase.to_microseconds().value(), 1500.0);
/// ```
#[derive(Clone, Copy)]
pub struct Duration<U, T = f64> {
    value: T,
    unit: U,
}

impl<U, T: Copy> Duration<U, T> {
    pub fn value(&self) -> T {
        self.value
    }
}

impl<T: Float, U> PartialEq for Duration<U, T> {
    fn eq(&self, other: &Self) -> bool {
        let a = self.value;
        let b = other.value;
        if a.is_zero() && b.is_zero() {
            true
        } else {
            a == b
        }
    }
}

impl<T: Debug, U: Display> Debug for Duration<U, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatterResult {
        f.debug_struct("Duration")
            .field("value", &self.value)
            .field("unit", &self.unit.to_string())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Millisecond;

impl Display for Millisecond {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatterResult {
        write!(f, "ms")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Microsecond;

impl Display for Microsecond {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatterResult {
        write!(f, "µs")
    }
}

pub const fn milliseconds<T>(value: T) -> Duration<Millisecond, T> {
    Duration {
        value,
        unit: Millisecond,
    }
}

pub const fn microseconds<T>(value: T) -> Duration<Microsecond, T> {
    Duration {
        value,
        unit: Microsecond,
    }
}

impl Duration<Millisecond, f64> {
    pub fn to_microseconds(self) -> Duration<Microsecond, f64> {
        microseconds(self.value * MICROS_PER_MILLI)
    }
}

impl Duration<Microsecond, f64> {
    /// Whole microseconds, as the device accepts them.
    pub fn round_to_integer(self) -> i64 {
        self.value.round() as i64
    }
}
