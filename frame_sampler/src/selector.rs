use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four frame-extraction algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    TimeIntervals,
    MotionBased,
    Keyframes,
    Adaptive,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::TimeIntervals,
        Strategy::MotionBased,
        Strategy::Keyframes,
        Strategy::Adaptive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::TimeIntervals => "time_intervals",
            Strategy::MotionBased => "motion_based",
            Strategy::Keyframes => "keyframes",
            Strategy::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown strategy '{s}', expected one of: {}",
                    Strategy::ALL.map(|st| st.as_str()).join(", ")
                )
            })
    }
}

/// Decision boundaries of [`SelectorThresholds::select`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectorThresholds {
    /// Videos longer than this (seconds) are sampled on a clock.
    pub long_video_seconds: f64,
    pub high_motion: f64,
    pub high_motion_variance: f64,
    pub low_motion: f64,
}

impl Default for SelectorThresholds {
    fn default() -> Self {
        Self {
            long_video_seconds: 1800.0,
            high_motion: 3000.0,
            high_motion_variance: 1_000_000.0,
            low_motion: 500.0,
        }
    }
}

impl SelectorThresholds {
    /// First matching rule wins: long video, bursty motion, static
    /// content, anything else.
    pub fn select(&self, avg_motion: f64, motion_variance: f64, duration_seconds: f64) -> Strategy {
        if duration_seconds > self.long_video_seconds {
            Strategy::TimeIntervals
        } else if avg_motion > self.high_motion && motion_variance > self.high_motion_variance {
            Strategy::MotionBased
        } else if avg_motion < self.low_motion {
            Strategy::Keyframes
        } else {
            Strategy::Adaptive
        }
    }
}

pub fn select_strategy(avg_motion: f64, motion_variance: f64, duration_seconds: f64) -> Strategy {
    SelectorThresholds::default().select(avg_motion, motion_variance, duration_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_videos_always_use_intervals() {
        for (motion, variance) in [(0.0, 0.0), (4000.0, 2e6), (200.0, 10.0), (1500.0, 500.0)] {
            assert_eq!(select_strategy(motion, variance, 2000.0), Strategy::TimeIntervals);
            assert_eq!(select_strategy(motion, variance, 2400.0), Strategy::TimeIntervals);
        }
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(select_strategy(4000.0, 2_000_000.0, 100.0), Strategy::MotionBased);
        assert_eq!(select_strategy(200.0, 0.0, 100.0), Strategy::Keyframes);
        assert_eq!(select_strategy(1500.0, 500.0, 100.0), Strategy::Adaptive);
        // High motion without the variance falls through to adaptive.
        assert_eq!(select_strategy(4000.0, 10.0, 100.0), Strategy::Adaptive);
        // Boundaries are strict.
        assert_eq!(select_strategy(500.0, 0.0, 1800.0), Strategy::Adaptive);
    }

    #[test]
    fn test_strategy_names() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
            assert_eq!(
                serde_json::to_string(&strategy).unwrap(),
                format!("\"{strategy}\"")
            );
        }
        assert!("ORB".parse::<Strategy>().is_err());
    }
}
