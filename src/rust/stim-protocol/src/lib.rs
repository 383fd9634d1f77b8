// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Stimulation protocol engine.
//!
//! Validates user-entered pulse settings, upgrades protocols stored in older
//! schemas, flattens protocols into plottable waveforms and converts them into
//! the message the stimulation hardware accepts.

pub mod casing;
pub mod catalog;
pub mod compatibility;
pub mod constants;
pub mod device_message;
pub mod error;
pub mod model;
pub mod pulse;
pub mod settings;
pub mod transfer;
pub mod validators;
pub mod waveform;

pub use catalog::{ProtocolCatalog, ProtocolEntry};
pub use compatibility::check_pulse_compatibility;
pub use device_message::{DeviceProtocol, DevicePulse, StimulationMessage};
pub use error::{Error, Result};
pub use model::{Protocol, PulseKind, StimulationType, Subprotocol};
pub use settings::EngineSettings;
pub use transfer::{ImportReport, export_document, import_document};
pub use validators::{block_errors, has_invalid_pulse};
pub use waveform::{FlattenedWaveform, flatten};
