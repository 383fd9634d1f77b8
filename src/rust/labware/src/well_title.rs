// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::{Error, Result};

/// Rows of a 1536-well plate.
pub const MAX_NUM_ROWS: usize = 18;
/// Columns of a 1536-well plate.
pub const MAX_NUM_COLUMNS: usize = 36;

/// Converts between well indices, row/column pairs and names like `"B3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WellTitle {
    num_rows: usize,
    num_columns: usize,
}

impl WellTitle {
    pub fn new(num_rows: usize, num_columns: usize) -> Result<Self> {
        if !(1..=MAX_NUM_ROWS).contains(&num_rows) {
            return Err(Error::InvalidDimension {
                dimension: "rows",
                value: num_rows,
                max: MAX_NUM_ROWS,
            });
        }
        if !(1..=MAX_NUM_COLUMNS).contains(&num_columns) {
            return Err(Error::InvalidDimension {
                dimension: "columns",
                value: num_columns,
                max: MAX_NUM_COLUMNS,
            });
        }
        Ok(Self {
            num_rows,
            num_columns,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn num_wells(&self) -> usize {
        self.num_rows * self.num_columns
    }

    /// `row` and `column` must lie on the plate.
    pub fn get_well_name_from_row_and_column(&self, row: usize, column: usize, pad: bool) -> String {
        debug_assert!(
            row < self.num_rows && column < self.num_columns,
            "Well ({row}, {column}) is outside a {}x{} plate",
            self.num_rows,
            self.num_columns
        );
        let row_letter = char::from(b'A' + row as u8);
        if pad {
            format!("{row_letter}{:02}", column + 1)
        } else {
            format!("{row_letter}{}", column + 1)
        }
    }

    pub fn get_row_and_column_from_well_index(&self, well_index: usize) -> (usize, usize) {
        (well_index % self.num_rows, well_index / self.num_rows)
    }

    pub fn get_well_name_from_well_index(&self, well_index: usize, pad: bool) -> String {
        let (row, column) = self.get_row_and_column_from_well_index(well_index);
        self.get_well_name_from_row_and_column(row, column, pad)
    }

    pub fn get_well_idx_from_row_and_column(&self, row: usize, column: usize) -> usize {
        column * self.num_rows + row
    }

    /// Parse a padded or unpadded well name back into its index.
    pub fn get_well_idx_from_well_name(&self, name: &str) -> Result<usize> {
        let invalid = || Error::InvalidWellName(name.to_string());
        let mut chars = name.trim().chars();
        let row_letter = chars.next().filter(char::is_ascii_uppercase).ok_or_else(invalid)?;
        let column_str = chars.as_str();
        if column_str.is_empty() || !column_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let column: usize = column_str.parse().map_err(|_| invalid())?;
        let row = (row_letter as u8 - b'A') as usize;
        if column == 0 || row >= self.num_rows || column > self.num_columns {
            return Err(Error::WellOutOfRange {
                name: name.to_string(),
                num_rows: self.num_rows,
                num_columns: self.num_columns,
            });
        }
        Ok(self.get_well_idx_from_row_and_column(row, column - 1))
    }

    /// All well names in index order.
    pub fn well_names(&self, pad: bool) -> impl Iterator<Item = String> + '_ {
        (0..self.num_wells()).map(move |idx| self.get_well_name_from_well_index(idx, pad))
    }
}
