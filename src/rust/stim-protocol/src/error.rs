// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unknown pulse type '{kind}' at position {index}")]
    UnknownPulseType { index: usize, kind: String },

    #[error("Malformed protocol: {0}")]
    MalformedProtocol(String),

    #[error("Loop nesting depth {depth} exceeds the limit of {limit}")]
    LoopDepthExceeded { depth: usize, limit: usize },

    #[error("Waveform would expand to {points} points, the limit is {limit}")]
    WaveformTooLarge { points: usize, limit: usize },

    #[error(
        "Subprotocol lists are misaligned: {subprotocols} wire entries vs {detailed} detailed entries"
    )]
    MisalignedSubprotocols { subprotocols: usize, detailed: usize },

    #[error("Unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("Protocol '{letter}' contains invalid pulses")]
    InvalidProtocol { letter: String },

    #[error("Number of cycles is not set for subprotocol {index}")]
    MissingNumCycles { index: usize },

    #[error(transparent)]
    Labware(#[from] labware::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}
