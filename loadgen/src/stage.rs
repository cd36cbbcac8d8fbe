use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A stage as written in a config file. The target is signed so that a
/// negative value is reported as a config error instead of a parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: i64,
}

impl StageConfig {
    #[must_use]
    pub fn new(duration: Duration, target: i64) -> Self {
        Self { duration, target }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    #[must_use]
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// Converts raw stages, rejecting negative targets.
pub fn stages_from_config(raw: &[StageConfig]) -> Result<Vec<Stage>, ConfigError> {
    raw.iter()
        .enumerate()
        .map(|(index, s)| {
            let target = usize::try_from(s.target).map_err(|_| ConfigError::NegativeTarget {
                index,
                target: s.target,
            })?;
            Ok(Stage::new(s.duration, target))
        })
        .collect()
}

/// Maps elapsed run time onto the ramp schedule.
///
/// Stage `i` owns the half-open window `[start_i, start_i + duration_i)`.
/// Once the last window has passed the run is complete and [`target_at`]
/// returns `None`.
///
/// [`target_at`]: StageController::target_at
#[derive(Debug, Clone)]
pub struct StageController {
    stages: Vec<Stage>,
    // Cumulative end offset of each stage
    ends: Vec<Duration>,
}

impl StageController {
    pub fn new(stages: Vec<Stage>) -> Result<Self, ConfigError> {
        if stages.is_empty() {
            return Err(ConfigError::EmptyStages);
        }
        let mut ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for (index, stage) in stages.iter().enumerate() {
            if stage.duration.is_zero() {
                return Err(ConfigError::ZeroDuration { index });
            }
            acc += stage.duration;
            ends.push(acc);
        }
        Ok(Self { stages, ends })
    }

    #[must_use]
    pub fn stage_index_at(&self, elapsed: Duration) -> Option<usize> {
        // First stage whose end lies strictly after `elapsed`
        let idx = self.ends.partition_point(|end| *end <= elapsed);
        (idx < self.stages.len()).then_some(idx)
    }

    #[must_use]
    pub fn target_at(&self, elapsed: Duration) -> Option<usize> {
        self.stage_index_at(elapsed).map(|idx| self.stages[idx].target)
    }

    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.ends.last().copied().unwrap_or_default()
    }

    #[must_use]
    pub fn max_target(&self) -> usize {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn ramp_up_then_down() {
        let ctl = StageController::new(vec![Stage::new(secs(10), 5), Stage::new(secs(10), 0)])
            .unwrap();
        assert_eq!(ctl.target_at(secs(0)), Some(5));
        assert_eq!(ctl.target_at(secs(5)), Some(5));
        assert_eq!(ctl.target_at(secs(10)), Some(0));
        assert_eq!(ctl.target_at(secs(15)), Some(0));
        assert_eq!(ctl.target_at(secs(20)), None);
        assert_eq!(ctl.target_at(secs(25)), None);
        assert_eq!(ctl.total_duration(), secs(20));
    }

    #[test]
    fn single_stage_is_a_plateau() {
        let ctl = StageController::new(vec![Stage::new(secs(15 * 60), 500)]).unwrap();
        assert_eq!(ctl.target_at(Duration::ZERO), Some(500));
        assert_eq!(ctl.target_at(secs(14 * 60 + 59)), Some(500));
        assert_eq!(ctl.target_at(secs(15 * 60)), None);
        assert_eq!(ctl.max_target(), 500);
    }

    #[test]
    fn stage_index_tracks_windows() {
        let ctl = StageController::new(vec![
            Stage::new(secs(1), 1),
            Stage::new(secs(2), 4),
            Stage::new(secs(3), 2),
        ])
        .unwrap();
        assert_eq!(ctl.stage_index_at(Duration::from_millis(999)), Some(0));
        assert_eq!(ctl.stage_index_at(secs(1)), Some(1));
        assert_eq!(ctl.stage_index_at(secs(5)), Some(2));
        assert_eq!(ctl.stage_index_at(secs(6)), None);
    }

    #[test]
    fn rejects_empty_and_zero_length() {
        assert!(matches!(
            StageController::new(Vec::new()),
            Err(ConfigError::EmptyStages)
        ));
        assert!(matches!(
            StageController::new(vec![Stage::new(secs(1), 1), Stage::new(Duration::ZERO, 3)]),
            Err(ConfigError::ZeroDuration { index: 1 })
        ));
    }

    #[test]
    fn rejects_negative_target() {
        let raw = vec![StageConfig::new(secs(5), 3), StageConfig::new(secs(5), -2)];
        assert!(matches!(
            stages_from_config(&raw),
            Err(ConfigError::NegativeTarget { index: 1, target: -2 })
        ));
    }
}
