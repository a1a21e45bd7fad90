//! PCM16 audio primitives shared across the pipeline.
//!
//! The conferencing SDK delivers fixed-cadence [`AudioFrame`]s; the
//! aggregator turns them into [`AudioWindow`]s sized for recognition.

use serde::{Deserialize, Serialize};

/// A fixed-duration block of PCM16 audio delivered by the conferencing SDK.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrame {
    /// Signed 16-bit little-endian samples, channel-interleaved.
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Whether the publishing participant had the track muted when this
    /// frame was produced.
    pub muted: bool,
}

impl AudioFrame {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / (self.sample_rate as u64 * self.channels as u64)
    }
}

/// A target-sized, overlap-prepended PCM buffer ready for recognition.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Wall clock (epoch milliseconds) when the window was emitted.
    pub emitted_at_ms: i64,
    /// RMS amplitude of the whole window, tail included.
    pub rms: f32,
}

impl AudioWindow {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / (self.sample_rate as u64 * self.channels as u64)
    }
}

/// Root-mean-square amplitude of a PCM16 buffer. Zero for empty input.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Wrap PCM16 samples in a RIFF/WAVE container for upload.
///
/// Produces the 44-byte header (PCM format, 16 bits per sample) followed by
/// the raw little-endian samples.
pub fn encode_wav(pcm: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(44 + pcm.len() * 2);
    let data_len = (pcm.len() * 2) as u32;
    let total_len = 36 + data_len;

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&total_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2 * channels as u32).to_le_bytes()); // byte rate
    out.extend_from_slice(&(2 * channels).to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    // data chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for sample in pcm {
        out.extend_from_slice(&sample.to_le_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_empty() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_constant_signal() {
        let samples = vec![1000i16; 480];
        assert!((rms(&samples) - 1000.0).abs() < 0.01);
    }

    #[test]
    fn test_rms_alternating_signal() {
        let samples: Vec<i16> = (0..480).map(|i| if i % 2 == 0 { 2000 } else { -2000 }).collect();
        assert!((rms(&samples) - 2000.0).abs() < 0.01);
    }

    #[test]
    fn test_wav_header_layout() {
        let pcm = vec![0i16; 16000];
        let wav = encode_wav(&pcm, 16000, 1);

        assert_eq!(wav.len(), 44 + 32000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");
        // data size
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 32000);
        // sample rate
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 16000);
        // byte rate = rate * 2 * channels
        assert_eq!(u32::from_le_bytes([wav[28], wav[29], wav[30], wav[31]]), 32000);
    }

    #[test]
    fn test_wav_samples_little_endian() {
        let wav = encode_wav(&[0x0102i16], 16000, 1);
        assert_eq!(&wav[44..46], &[0x02, 0x01]);
    }

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame {
            samples: vec![0; 960],
            sample_rate: 48000,
            channels: 1,
            muted: false,
        };
        assert_eq!(frame.duration_ms(), 20);
    }
}
