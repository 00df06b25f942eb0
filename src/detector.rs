use kvlink_lib::{DeviceClass, MatchScores, MatchThresholds, ScreenDetector, ScreenState};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, trace};

/// Reads template confidences written by an external screen matcher.
///
/// The file holds one `<template> <confidence>` pair per line, where the
/// template is `fail`, `pass`, `front`, `nfc` or the configured NFC model
/// name. Blank lines and `#` comments are skipped. The file is re-read on
/// every sample; if it is missing, unreadable or slow, the screen counts as
/// disappeared.
pub struct FileDetector {
    path: PathBuf,
    thresholds: MatchThresholds,
    class: DeviceClass,
    nfc_model: Option<String>,
    read_timeout: Duration,
}

impl FileDetector {
    pub fn new(path: PathBuf, thresholds: MatchThresholds, class: DeviceClass, read_timeout: Duration) -> Self {
        Self {
            path,
            thresholds,
            class,
            nfc_model: None,
            read_timeout,
        }
    }

    pub fn with_nfc_model(mut self, model: Option<String>) -> Self {
        self.nfc_model = model;
        self
    }

    async fn read_scores(&self) -> Option<MatchScores> {
        match tokio::time::timeout(self.read_timeout, tokio::fs::read_to_string(&self.path)).await {
            Ok(Ok(text)) => Some(parse_scores(&text, self.nfc_model.as_deref())),
            Ok(Err(e)) => {
                debug!(path = ?self.path, error = %e, "Score file unreadable");
                None
            }
            Err(_) => {
                debug!(path = ?self.path, "Score file read timed out");
                None
            }
        }
    }
}

impl ScreenDetector for FileDetector {
    async fn sample_screen_state(&mut self) -> ScreenState {
        let Some(scores) = self.read_scores().await else {
            return ScreenState::Disappeared;
        };
        let state = scores.resolve(&self.thresholds, self.class);
        trace!(?scores, %state, "Sampled screen");
        state
    }
}

/// Collect the best confidence per template. Unknown templates and
/// unparsable lines are ignored.
pub fn parse_scores(text: &str, nfc_model: Option<&str>) -> MatchScores {
    let mut scores = MatchScores::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(template), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.parse::<f32>() else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }

        let slot = match template.to_ascii_lowercase().as_str() {
            "fail" => &mut scores.fail,
            "pass" => &mut scores.pass,
            "front" => &mut scores.front,
            "nfc" => &mut scores.nfc_model,
            _ if nfc_model.is_some_and(|m| m.eq_ignore_ascii_case(template)) => &mut scores.nfc_model,
            _ => continue,
        };
        *slot = Some(slot.map_or(value, |best| best.max(value)));
    }
    scores
}
