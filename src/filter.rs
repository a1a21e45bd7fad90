//! Post-recognition filtering of transcript slices.
//!
//! Rejects text the recognizer produces on noise or silence: configured
//! blocklist phrases, punctuation-only output, and low-energy repeats of the
//! previous short utterance within a recency window.

use std::time::Duration;

use log::debug;
use tokio::time::Instant;

pub struct TranscriptGate {
    blocklist: Vec<String>,
    short_high_rms: f32,
    repeat_window: Duration,
    last_accepted: Option<(String, Instant)>,
}

impl TranscriptGate {
    pub fn new(blocklist: &[String], short_high_rms: f32, repeat_window_ms: u64) -> Self {
        Self {
            blocklist: blocklist
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            short_high_rms,
            repeat_window: Duration::from_millis(repeat_window_ms),
            last_accepted: None,
        }
    }

    /// Decide whether a transcript slice should reach the assembler.
    /// Accepting updates the recent-text memory used by the repeat gate.
    pub fn accept(&mut self, text: &str, window_rms: f32, now: Instant) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }

        let lower = trimmed.to_lowercase();
        if self.blocklist.iter().any(|p| *p == lower) {
            debug!("dropping blocklisted transcript: {:?}", trimmed);
            return false;
        }

        if !trimmed.chars().any(|c| c.is_alphanumeric()) {
            debug!("dropping punctuation-only transcript: {:?}", trimmed);
            return false;
        }

        // A short, quiet utterance identical to the one just accepted is
        // almost always the recognizer re-reading the overlap region.
        let word_count = trimmed.split_whitespace().count();
        if word_count <= 2 && window_rms < self.short_high_rms {
            if let Some((last, at)) = &self.last_accepted {
                if last == trimmed && now.duration_since(*at) < self.repeat_window {
                    debug!("dropping repeated short transcript: {:?}", trimmed);
                    return false;
                }
            }
        }

        self.last_accepted = Some((trimmed.to_string(), now));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> TranscriptGate {
        TranscriptGate::new(&["thank you for watching".to_string()], 1200.0, 7000)
    }

    #[test]
    fn test_blocklist_case_insensitive() {
        let mut g = gate();
        let now = Instant::now();
        assert!(!g.accept("Thank You For Watching", 2000.0, now));
        assert!(g.accept("thank you for watching this", 2000.0, now));
    }

    #[test]
    fn test_punctuation_only_dropped() {
        let mut g = gate();
        let now = Instant::now();
        assert!(!g.accept(".", 2000.0, now));
        assert!(!g.accept("...", 2000.0, now));
        assert!(!g.accept("  ", 2000.0, now));
        assert!(g.accept("ok.", 2000.0, now));
    }

    #[test]
    fn test_short_quiet_repeat_dropped() {
        let mut g = gate();
        let now = Instant::now();
        assert!(g.accept("uh", 500.0, now));
        assert!(!g.accept("uh", 500.0, now + Duration::from_millis(1000)));
    }

    #[test]
    fn test_repeat_outside_window_accepted() {
        let mut g = gate();
        let now = Instant::now();
        assert!(g.accept("uh", 500.0, now));
        assert!(g.accept("uh", 500.0, now + Duration::from_millis(8000)));
    }

    #[test]
    fn test_loud_repeat_accepted() {
        let mut g = gate();
        let now = Instant::now();
        assert!(g.accept("yes", 500.0, now));
        assert!(g.accept("yes", 1500.0, now + Duration::from_millis(1000)));
    }

    #[test]
    fn test_long_repeat_accepted() {
        let mut g = gate();
        let now = Instant::now();
        assert!(g.accept("I think we should go", 500.0, now));
        assert!(g.accept("I think we should go", 500.0, now + Duration::from_millis(1000)));
    }
}
