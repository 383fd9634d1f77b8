// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Time units used by stimulation protocols.
//!
//! [`TimeUnit`] is the runtime unit a user picks for a field, [`duration::Duration`]
//! carries a compile-time unit for values that cross the device boundary.

pub mod duration;
pub mod time_unit;

pub use duration::{Duration, Microsecond, Millisecond, microseconds, milliseconds};
pub use time_unit::{ParseTimeUnitError, TIME_CONVERSION_TO_MILLIS, TimeUnit};
