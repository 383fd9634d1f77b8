// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Plate geometry.
//!
//! Wells are numbered column-major: index 0 is `A1`, index 1 is `B1`, and the
//! index of `A2` equals the number of rows.

mod well_title;

pub use well_title::{MAX_NUM_COLUMNS, MAX_NUM_ROWS, WellTitle};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid number of {dimension}: {value}. Must be within [1, {max}]")]
    InvalidDimension {
        dimension: &'static str,
        value: usize,
        max: usize,
    },

    #[error("Invalid well name '{0}'")]
    InvalidWellName(String),

    #[error("Well '{name}' is outside a plate with {num_rows} rows and {num_columns} columns")]
    WellOutOfRange {
        name: String,
        num_rows: usize,
        num_columns: usize,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
