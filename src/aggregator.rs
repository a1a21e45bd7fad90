//! Per-track accumulation of audio frames into recognition windows.
//!
//! Frames are buffered until roughly `target_ms` of audio is available, then
//! combined into a single window with the tail of the previous window
//! prepended. The overlap recovers words straddling window boundaries; the
//! sentence assembler removes the resulting repetition downstream.

use log::trace;

use crate::audio::{rms, AudioFrame, AudioWindow};

pub struct FrameAggregator {
    target_ms: u64,
    overlap_ms: u64,
    vad_threshold: f32,
    pending: Vec<i16>,
    pending_ms: u64,
    prev_tail: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl FrameAggregator {
    pub fn new(target_ms: u64, overlap_ms: u64, vad_threshold: f32) -> Self {
        Self {
            target_ms,
            overlap_ms,
            vad_threshold,
            pending: Vec::new(),
            pending_ms: 0,
            prev_tail: Vec::new(),
            sample_rate: 0,
            channels: 1,
        }
    }

    /// Feed one frame; returns a window when enough audio has accumulated
    /// and the window passes the RMS voice-activity gate.
    pub fn push(&mut self, frame: &AudioFrame) -> Option<AudioWindow> {
        if frame.muted {
            // Muted audio invalidates both the accumulation and the saved
            // tail; no stale overlap may cross an unmute boundary.
            self.pending.clear();
            self.pending_ms = 0;
            self.prev_tail.clear();
            return None;
        }
        if frame.samples.is_empty() {
            return None;
        }

        self.sample_rate = frame.sample_rate;
        self.channels = frame.channels.max(1);
        self.pending.extend_from_slice(&frame.samples);
        self.pending_ms += frame.duration_ms();

        if self.pending_ms < self.target_ms {
            return None;
        }

        let mut combined = Vec::with_capacity(self.prev_tail.len() + self.pending.len());
        combined.extend_from_slice(&self.prev_tail);
        combined.append(&mut self.pending);
        self.pending_ms = 0;

        let tail_len = (self.overlap_ms * self.sample_rate as u64 / 1000) as usize
            * self.channels as usize;
        let tail_start = combined.len().saturating_sub(tail_len);
        self.prev_tail = combined[tail_start..].to_vec();

        let level = rms(&combined);
        if level < self.vad_threshold {
            trace!("dropping silent window (rms {:.0})", level);
            return None;
        }

        Some(AudioWindow {
            samples: combined,
            sample_rate: self.sample_rate,
            channels: self.channels,
            emitted_at_ms: chrono::Utc::now().timestamp_millis(),
            rms: level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(amplitude: i16, ms: u64) -> AudioFrame {
        AudioFrame {
            samples: vec![amplitude; (16 * ms) as usize],
            sample_rate: 16000,
            channels: 1,
            muted: false,
        }
    }

    #[test]
    fn test_accumulates_until_target() {
        let mut agg = FrameAggregator::new(100, 20, 0.0);
        assert!(agg.push(&frame(1000, 20)).is_none());
        assert!(agg.push(&frame(1000, 20)).is_none());
        assert!(agg.push(&frame(1000, 20)).is_none());
        assert!(agg.push(&frame(1000, 20)).is_none());
        let window = agg.push(&frame(1000, 20)).unwrap();
        assert_eq!(window.duration_ms(), 100);
    }

    #[test]
    fn test_tail_prepended_to_next_window() {
        let mut agg = FrameAggregator::new(100, 20, 0.0);
        for _ in 0..5 {
            agg.push(&frame(1000, 20));
        }
        // Second window carries 20ms of tail from the first.
        for _ in 0..4 {
            assert!(agg.push(&frame(2000, 20)).is_none());
        }
        let window = agg.push(&frame(2000, 20)).unwrap();
        assert_eq!(window.duration_ms(), 120);
        assert_eq!(window.samples[0], 1000);
        assert_eq!(*window.samples.last().unwrap(), 2000);
    }

    #[test]
    fn test_silent_window_dropped_but_tail_kept() {
        let mut agg = FrameAggregator::new(100, 20, 800.0);
        for _ in 0..4 {
            agg.push(&frame(10, 20));
        }
        assert!(agg.push(&frame(10, 20)).is_none());
        // The tail survived the drop: the next (loud) window includes it.
        for _ in 0..4 {
            agg.push(&frame(3000, 20));
        }
        let window = agg.push(&frame(3000, 20)).unwrap();
        assert_eq!(window.duration_ms(), 120);
        assert_eq!(window.samples[0], 10);
    }

    #[test]
    fn test_mute_discards_accumulation_and_tail() {
        let mut agg = FrameAggregator::new(100, 20, 0.0);
        for _ in 0..5 {
            agg.push(&frame(1000, 20));
        }
        agg.push(&frame(1000, 20));
        let mut muted = frame(0, 20);
        muted.muted = true;
        assert!(agg.push(&muted).is_none());

        for _ in 0..4 {
            assert!(agg.push(&frame(2000, 20)).is_none());
        }
        let window = agg.push(&frame(2000, 20)).unwrap();
        // No tail, no leftover frames from before the mute.
        assert_eq!(window.duration_ms(), 100);
        assert_eq!(window.samples[0], 2000);
    }

    #[test]
    fn test_window_rms_reported() {
        let mut agg = FrameAggregator::new(100, 0, 0.0);
        for _ in 0..4 {
            agg.push(&frame(1500, 20));
        }
        let window = agg.push(&frame(1500, 20)).unwrap();
        assert!((window.rms - 1500.0).abs() < 1.0);
    }
}
