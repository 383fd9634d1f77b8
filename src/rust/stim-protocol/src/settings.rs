// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Limits applied when expanding nested protocols.

pub const DEFAULT_MAX_LOOP_DEPTH: usize = 8;
pub const DEFAULT_MAX_WAVEFORM_POINTS: usize = 2_000_000;

const LOOP_DEPTH_RANGE: std::ops::RangeInclusive<usize> = 1..=32;
/// The origin plus one closing point.
const MIN_WAVEFORM_POINTS: usize = 2;

#[derive(Debug, Clone)]
pub struct SanitizationChange {
    pub field: &'static str,
    pub original: String,
    pub sanitized: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    max_loop_depth: usize,
    max_waveform_points: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings::new(DEFAULT_MAX_LOOP_DEPTH, DEFAULT_MAX_WAVEFORM_POINTS)
    }
}

impl EngineSettings {
    pub fn new(max_loop_depth: usize, max_waveform_points: usize) -> Self {
        EngineSettings {
            max_loop_depth,
            max_waveform_points,
        }
    }

    /// Deepest loop nesting accepted by validation and flattening.
    pub fn max_loop_depth(&self) -> usize {
        self.max_loop_depth
    }

    /// Upper bound on the number of points of a flattened waveform.
    pub fn max_waveform_points(&self) -> usize {
        self.max_waveform_points
    }

    pub fn sanitize(&mut self) -> Vec<SanitizationChange> {
        let mut changes = vec![];
        let depth = self
            .max_loop_depth
            .clamp(*LOOP_DEPTH_RANGE.start(), *LOOP_DEPTH_RANGE.end());
        if depth != self.max_loop_depth {
            changes.push(SanitizationChange {
                field: "max_loop_depth",
                original: self.max_loop_depth.to_string(),
                sanitized: depth.to_string(),
                reason: format!(
                    "Loop depth must be within [{}, {}]",
                    LOOP_DEPTH_RANGE.start(),
                    LOOP_DEPTH_RANGE.end()
                ),
            });
            self.max_loop_depth = depth;
        }
        if self.max_waveform_points < MIN_WAVEFORM_POINTS {
            changes.push(SanitizationChange {
                field: "max_waveform_points",
                original: self.max_waveform_points.to_string(),
                sanitized: MIN_WAVEFORM_POINTS.to_string(),
                reason: format!("A waveform has at least {MIN_WAVEFORM_POINTS} points"),
            });
            self.max_waveform_points = MIN_WAVEFORM_POINTS;
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let mut settings = EngineSettings::default();
        assert!(settings.sanitize().is_empty());
        assert_eq!(settings.max_loop_depth(), DEFAULT_MAX_LOOP_DEPTH);
        assert_eq!(settings.max_waveform_points(), DEFAULT_MAX_WAVEFORM_POINTS);
    }

    #[test]
    fn test_sanitize() {
        let mut settings = EngineSettings::new(100, 0);
        let changes = settings.sanitize();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, "max_loop_depth");
        assert_eq!(changes[0].original, "100");
        assert_eq!(changes[0].sanitized, "32");
        assert_eq!(changes[1].field, "max_waveform_points");
        assert_eq!(settings, EngineSettings::new(32, 2));

        let mut settings = EngineSettings::new(0, 10);
        settings.sanitize();
        assert_eq!(settings.max_loop_depth(), 1);
    }
}
