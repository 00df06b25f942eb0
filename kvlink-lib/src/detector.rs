use crate::registry::DeviceClass;
use crate::state::{DetectorMatches, ScreenState};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Source of screen samples for the status reporter.
///
/// Called once per reporter cycle. Implementations must come back in bounded
/// time; a detector that cannot tell should answer
/// [`ScreenState::Disappeared`].
pub trait ScreenDetector: Send {
    fn sample_screen_state(&mut self) -> impl Future<Output = ScreenState> + Send;
}

/// Minimum confidence per template for it to count as a match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchThresholds {
    pub fail: f32,
    pub pass: f32,
    pub front: f32,
    pub nfc_model: f32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            fail: 0.6,
            pass: 0.6,
            front: 0.4,
            nfc_model: 0.6,
        }
    }
}

/// Best confidence an external matcher found for each template, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchScores {
    pub fail: Option<f32>,
    pub pass: Option<f32>,
    pub front: Option<f32>,
    pub nfc_model: Option<f32>,
}

impl MatchScores {
    pub fn to_matches(&self, thresholds: &MatchThresholds) -> DetectorMatches {
        let hit = |score: Option<f32>, threshold: f32| score.is_some_and(|s| s >= threshold);
        DetectorMatches {
            fail: hit(self.fail, thresholds.fail),
            pass: hit(self.pass, thresholds.pass),
            front: hit(self.front, thresholds.front),
            nfc_model: hit(self.nfc_model, thresholds.nfc_model),
        }
    }

    pub fn resolve(&self, thresholds: &MatchThresholds, class: DeviceClass) -> ScreenState {
        self.to_matches(thresholds).resolve(class)
    }
}
