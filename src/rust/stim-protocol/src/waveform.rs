// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Flattening of protocol blocks into a plottable step waveform.
//!
//! Every component of a cycle becomes a step: one point at the running time
//! with the component amplitude, one point after its duration with the same
//! amplitude. Times are accumulated in milliseconds and only rescaled to the
//! display unit at the end.

use serde::Serialize;
use stim_units::{TimeUnit, milliseconds};

use crate::model::{DelayBlock, Protocol, Subprotocol};
use crate::settings::EngineSettings;
use crate::{Error, Result};

/// A highlight range `[start, end)` over the point indices of one block.
pub type ColorAssignment = (String, [usize; 2]);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenedWaveform {
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub color_assignments: Vec<ColorAssignment>,
    /// Start and end of the trailing rest period in display units,
    /// `[NaN, NaN]` when there is no rest.
    pub delay_block: [f64; 2],
    /// The rest period as a delay block, to be appended to the wire list.
    pub rest_pulse: Option<Subprotocol>,
}

impl FlattenedWaveform {
    pub fn has_rest(&self) -> bool {
        self.rest_pulse.is_some()
    }
}

/// The rest period of a protocol as a trailing delay block, `None` if it is
/// not a positive duration.
pub fn rest_delay(rest_duration: f64, rest_unit: TimeUnit) -> Option<Subprotocol> {
    (rest_duration > 0.0).then(|| Subprotocol::Delay(DelayBlock::new(rest_duration, rest_unit)))
}

fn leaf_repeats(block: &Subprotocol) -> usize {
    match block {
        Subprotocol::Delay(_) => 1,
        // Unset cycle counts produce no visible waveform.
        other => other
            .as_pulse()
            .and_then(|p| p.num_cycles())
            .unwrap_or(0) as usize,
    }
}

fn leaf_components(block: &Subprotocol) -> Vec<(f64, f64)> {
    match block {
        Subprotocol::Delay(delay) => vec![(delay.as_millis().value(), 0.0)],
        other => other
            .as_pulse()
            .map(|p| p.cycle_components())
            .unwrap_or_default(),
    }
}

/// Number of points `blocks` expand to, saturating on overflow.
fn count_points(blocks: &[Subprotocol], depth: usize, settings: &EngineSettings) -> Result<usize> {
    if depth > settings.max_loop_depth() {
        return Err(Error::LoopDepthExceeded {
            depth,
            limit: settings.max_loop_depth(),
        });
    }
    let mut points: usize = 0;
    for block in blocks {
        let block_points = match block {
            Subprotocol::Loop(l) => count_points(&l.subprotocols, depth + 1, settings)?
                .saturating_mul(l.num_iterations as usize),
            leaf => leaf_repeats(leaf).saturating_mul(2 * leaf_components(leaf).len()),
        };
        points = points.saturating_add(block_points);
    }
    Ok(points)
}

struct WaveformBuilder {
    x_values: Vec<f64>,
    y_values: Vec<f64>,
    color_assignments: Vec<ColorAssignment>,
}

impl WaveformBuilder {
    fn with_capacity(points: usize) -> Self {
        let mut x_values = Vec::with_capacity(points);
        let mut y_values = Vec::with_capacity(points);
        x_values.push(0.0);
        y_values.push(0.0);
        Self {
            x_values,
            y_values,
            color_assignments: vec![],
        }
    }

    fn last_x(&self) -> f64 {
        self.x_values.last().copied().unwrap_or(0.0)
    }

    fn push_blocks(&mut self, blocks: &[Subprotocol]) {
        for block in blocks {
            match block {
                Subprotocol::Loop(l) => {
                    for _ in 0..l.num_iterations {
                        self.push_blocks(&l.subprotocols);
                    }
                }
                leaf => self.push_leaf(leaf),
            }
        }
    }

    fn push_leaf(&mut self, block: &Subprotocol) {
        let starting_index = self.x_values.len() - 1;
        let repeats = leaf_repeats(block);
        let components = leaf_components(block);
        for _ in 0..repeats {
            for &(duration, amplitude) in &components {
                let start = self.last_x();
                self.x_values.extend([start, start + duration]);
                self.y_values.extend([amplitude, amplitude]);
            }
        }
        if repeats > 0 && !components.is_empty() {
            // Return to baseline at the end of every block.
            if let Some(last) = self.y_values.last_mut() {
                *last = 0.0;
            }
        }
        let ending_index = self.x_values.len();
        let color = block.color().unwrap_or_default().to_string();
        self.color_assignments
            .push((color, [starting_index, ending_index]));
    }
}

/// Expand `blocks` into a step waveform with x values in `display_unit`.
///
/// Loops are unrolled, each occurrence of a block gets its own color range.
/// A positive `rest_duration` is reported as a delay range after the last
/// point and as a delay block for the wire list.
pub fn flatten(
    blocks: &[Subprotocol],
    rest_duration: f64,
    rest_unit: TimeUnit,
    display_unit: TimeUnit,
    settings: &EngineSettings,
) -> Result<FlattenedWaveform> {
    let points = count_points(blocks, 0, settings)?.saturating_add(1);
    if points > settings.max_waveform_points() {
        return Err(Error::WaveformTooLarge {
            points,
            limit: settings.max_waveform_points(),
        });
    }
    stim_log::diagnostic!("Flattening {} blocks into {} points", blocks.len(), points);

    let mut builder = WaveformBuilder::with_capacity(points);
    builder.push_blocks(blocks);
    let WaveformBuilder {
        mut x_values,
        y_values,
        color_assignments,
    } = builder;

    for x in x_values.iter_mut() {
        *x = display_unit.from_millis(milliseconds(*x));
    }

    let rest = display_unit.from_millis(rest_unit.to_millis(rest_duration));
    let last_x = x_values.last().copied().unwrap_or(0.0);
    let (delay_block, rest_pulse) = match rest_delay(rest_duration, rest_unit) {
        Some(pulse) if rest != 0.0 => ([last_x, last_x + rest], Some(pulse)),
        _ => ([f64::NAN, f64::NAN], None),
    };

    Ok(FlattenedWaveform {
        x_values,
        y_values,
        color_assignments,
        delay_block,
        rest_pulse,
    })
}

impl Protocol {
    /// Flatten the detailed blocks of this protocol, followed by its rest period.
    pub fn flatten(
        &self,
        display_unit: TimeUnit,
        settings: &EngineSettings,
    ) -> Result<FlattenedWaveform> {
        flatten(
            &self.detailed_subprotocols,
            self.rest_duration,
            self.time_unit,
            display_unit,
            settings,
        )
    }
}
