//! Wire-level messages exchanged on the `captions` data topic.

use serde::{Deserialize, Serialize};

/// Data-channel topic carrying caption traffic in both directions.
pub const CAPTIONS_TOPIC: &str = "captions";

/// An outbound caption record, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CaptionRecord {
    #[serde(rename = "transcription", rename_all = "camelCase")]
    Transcription {
        speaker: String,
        text: String,
        sentence_id: u64,
        #[serde(rename = "final")]
        is_final: bool,
        timestamp: i64,
    },
    #[serde(rename = "translation", rename_all = "camelCase")]
    Translation {
        speaker: String,
        original_text: String,
        translated_text: String,
        target_language: String,
        sentence_id: u64,
        timestamp: i64,
    },
}

impl CaptionRecord {
    pub fn transcription(speaker: &str, text: &str, sentence_id: u64, is_final: bool) -> Self {
        Self::Transcription {
            speaker: speaker.to_string(),
            text: text.to_string(),
            sentence_id,
            is_final,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn translation(
        speaker: &str,
        original_text: &str,
        translated_text: &str,
        target_language: &str,
        sentence_id: u64,
    ) -> Self {
        Self::Translation {
            speaker: speaker.to_string(),
            original_text: original_text.to_string(),
            translated_text: translated_text.to_string(),
            target_language: target_language.to_string(),
            sentence_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// An inbound data message from a remote participant. Unknown message types
/// are tolerated and ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "language_prefs", rename_all = "camelCase")]
    LanguagePrefs {
        participant_id: String,
        #[serde(default)]
        stt_language: Option<String>,
        #[serde(default)]
        target_language: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Per-participant language preferences, received over the data channel.
/// Absent fields fall back to the session defaults.
#[derive(Debug, Clone, Default)]
pub struct ParticipantPrefs {
    pub stt_language: Option<String>,
    pub target_language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_wire_shape() {
        let record = CaptionRecord::Transcription {
            speaker: "p1".to_string(),
            text: "Hello world.".to_string(),
            sentence_id: 3,
            is_final: true,
            timestamp: 1700000000000,
        };
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "transcription");
        assert_eq!(json["speaker"], "p1");
        assert_eq!(json["text"], "Hello world.");
        assert_eq!(json["sentenceId"], 3);
        assert_eq!(json["final"], true);
        assert_eq!(json["timestamp"], 1700000000000i64);
    }

    #[test]
    fn test_translation_wire_shape() {
        let record = CaptionRecord::Translation {
            speaker: "p1".to_string(),
            original_text: "Hello world.".to_string(),
            translated_text: "Hola mundo.".to_string(),
            target_language: "es".to_string(),
            sentence_id: 3,
            timestamp: 1700000000000,
        };
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "translation");
        assert_eq!(json["originalText"], "Hello world.");
        assert_eq!(json["translatedText"], "Hola mundo.");
        assert_eq!(json["targetLanguage"], "es");
        assert_eq!(json["sentenceId"], 3);
    }

    #[test]
    fn test_language_prefs_parsed() {
        let payload = r#"{"type":"language_prefs","participantId":"p7","targetLanguage":"fr"}"#;
        match serde_json::from_str::<InboundMessage>(payload).unwrap() {
            InboundMessage::LanguagePrefs {
                participant_id,
                stt_language,
                target_language,
            } => {
                assert_eq!(participant_id, "p7");
                assert_eq!(stt_language, None);
                assert_eq!(target_language.as_deref(), Some("fr"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_tolerated() {
        let payload = r#"{"type":"reaction","emoji":"wave"}"#;
        assert!(matches!(
            serde_json::from_str::<InboundMessage>(payload).unwrap(),
            InboundMessage::Unknown
        ));
    }
}
