//! Environment-driven configuration for the captioning agent.

use std::env;
use std::time::Duration;

use log::warn;

use crate::sentence::AssemblerConfig;

const DEFAULT_WEAK_END_WORDS: &[&str] = &[
    "doing", "going", "is", "are", "was", "were", "about", "with", "to", "for", "like",
];

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Audio accumulated per recognition window, in milliseconds.
    pub buffer_target_ms: u64,
    /// Tail of the previous window prepended to the next one.
    pub overlap_ms: u64,
    /// Windows with RMS below this are dropped as silence.
    pub vad_threshold: f32,
    /// Short utterances louder than this bypass the repeat gate.
    pub short_high_rms: f32,
    /// Recency window for the short-repeat gate.
    pub repeat_window_ms: u64,
    /// Transcripts matching one of these exactly (case-insensitive) are
    /// dropped.
    pub blocklist_phrases: Vec<String>,
    /// Words that end a token but rarely a sentence.
    pub weak_end_words: Vec<String>,
    /// Grace delay between strong punctuation and finalization.
    pub punct_grace_ms: u64,
    /// Inactivity delay before the open buffer is flushed.
    pub pause_final_ms: u64,
    /// Minimum buffer length for punctuation-triggered finalization.
    pub min_chars_for_final: usize,
    pub stt_model: String,
    pub translate_model: String,
    /// Mirror captions as chat messages.
    pub send_chat: bool,
    /// Default recognition language hint; per-participant prefs override it.
    pub stt_language: Option<String>,
    /// Default translation target; unset disables translation.
    pub target_language: Option<String>,
    pub openai_api_key: String,
    pub openai_base_url: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            buffer_target_ms: 1800,
            overlap_ms: 300,
            vad_threshold: 800.0,
            short_high_rms: 1200.0,
            repeat_window_ms: 7000,
            blocklist_phrases: Vec::new(),
            weak_end_words: DEFAULT_WEAK_END_WORDS.iter().map(|w| w.to_string()).collect(),
            punct_grace_ms: 900,
            pause_final_ms: 2500,
            min_chars_for_final: 24,
            stt_model: "gpt-4o-transcribe".to_string(),
            translate_model: "gpt-4o-mini".to_string(),
            send_chat: false,
            stt_language: None,
            target_language: None,
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            buffer_target_ms: env_u64("BUFFER_TARGET_MS", d.buffer_target_ms),
            overlap_ms: env_u64("OVERLAP_MS", d.overlap_ms),
            vad_threshold: env_f32("VAD_THRESHOLD", d.vad_threshold),
            short_high_rms: env_f32("SHORT_HIGH_RMS", d.short_high_rms),
            repeat_window_ms: env_u64("REPEAT_WINDOW_MS", d.repeat_window_ms),
            blocklist_phrases: env_list("BLOCKLIST_PHRASES").unwrap_or(d.blocklist_phrases),
            weak_end_words: env_list("WEAK_END_WORDS").unwrap_or(d.weak_end_words),
            punct_grace_ms: env_u64("PUNCT_GRACE_MS", d.punct_grace_ms),
            pause_final_ms: env_u64("PAUSE_FINAL_MS", d.pause_final_ms),
            min_chars_for_final: env_u64("MIN_CHARS_FOR_FINAL", d.min_chars_for_final as u64)
                as usize,
            stt_model: env_str("OPENAI_STT_MODEL").unwrap_or(d.stt_model),
            translate_model: env_str("OPENAI_TRANSLATE_MODEL").unwrap_or(d.translate_model),
            send_chat: env_bool("AGENT_SEND_CHAT", d.send_chat),
            stt_language: env_str("STT_LANGUAGE"),
            target_language: env_str("TARGET_LANGUAGE"),
            openai_api_key: env_str("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env_str("OPENAI_BASE_URL").unwrap_or(d.openai_base_url),
        }
    }

    /// Assembler parameters derived from this configuration.
    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            punct_grace: Duration::from_millis(self.punct_grace_ms),
            pause_final: Duration::from_millis(self.pause_final_ms),
            min_chars_for_final: self.min_chars_for_final,
            weak_end_words: self
                .weak_end_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .collect(),
        }
    }
}

fn env_str(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    match env_str(name) {
        Some(v) => v.parse().unwrap_or_else(|_| {
            warn!("invalid {}={:?}, using {}", name, v, default);
            default
        }),
        None => default,
    }
}

fn env_f32(name: &str, default: f32) -> f32 {
    match env_str(name) {
        Some(v) => v.parse().unwrap_or_else(|_| {
            warn!("invalid {}={:?}, using {}", name, v, default);
            default
        }),
        None => default,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_str(name) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn env_list(name: &str) -> Option<Vec<String>> {
    env_str(name).map(|v| {
        v.split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.buffer_target_ms, 1800);
        assert_eq!(cfg.overlap_ms, 300);
        assert_eq!(cfg.vad_threshold, 800.0);
        assert_eq!(cfg.short_high_rms, 1200.0);
        assert_eq!(cfg.repeat_window_ms, 7000);
        assert_eq!(cfg.punct_grace_ms, 900);
        assert_eq!(cfg.pause_final_ms, 2500);
        assert_eq!(cfg.min_chars_for_final, 24);
        assert_eq!(cfg.stt_model, "gpt-4o-transcribe");
        assert!(!cfg.send_chat);
        assert!(cfg.blocklist_phrases.is_empty());
        assert!(cfg.weak_end_words.contains(&"going".to_string()));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("BUFFER_TARGET_MS", "2400");
        env::set_var("BLOCKLIST_PHRASES", "thank you, bye bye ,");
        env::set_var("AGENT_SEND_CHAT", "true");
        let cfg = AgentConfig::from_env();
        env::remove_var("BUFFER_TARGET_MS");
        env::remove_var("BLOCKLIST_PHRASES");
        env::remove_var("AGENT_SEND_CHAT");

        assert_eq!(cfg.buffer_target_ms, 2400);
        assert_eq!(cfg.blocklist_phrases, vec!["thank you", "bye bye"]);
        assert!(cfg.send_chat);
    }

    #[test]
    fn test_invalid_number_falls_back() {
        env::set_var("PAUSE_FINAL_MS", "soon");
        let cfg = AgentConfig::from_env();
        env::remove_var("PAUSE_FINAL_MS");
        assert_eq!(cfg.pause_final_ms, 2500);
    }

    #[test]
    fn test_assembler_config_lowercases_weak_words() {
        let mut cfg = AgentConfig::default();
        cfg.weak_end_words = vec!["Going".to_string(), " WITH ".to_string()];
        let asm = cfg.assembler_config();
        assert!(asm.weak_end_words.contains("going"));
        assert!(asm.weak_end_words.contains("with"));
    }
}
