//! Outbound publication of caption records.

use std::sync::Arc;

use log::warn;

use crate::messages::{CaptionRecord, CAPTIONS_TOPIC};
use crate::room::RoomHandle;

/// Publishes caption records on the room data channel, optionally mirroring
/// them as chat lines. Publication is fire-and-forget: failures are logged
/// and never block the pipeline.
pub struct CaptionPublisher {
    room: Arc<dyn RoomHandle>,
    send_chat: bool,
}

impl CaptionPublisher {
    pub fn new(room: Arc<dyn RoomHandle>, send_chat: bool) -> Self {
        Self { room, send_chat }
    }

    pub async fn publish(&self, record: &CaptionRecord) {
        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize caption record: {}", e);
                return;
            }
        };
        if let Err(e) = self.room.publish_data(CAPTIONS_TOPIC, payload).await {
            warn!("failed to publish caption record: {}", e);
        }

        if self.send_chat {
            let line = match record {
                CaptionRecord::Transcription { speaker, text, .. } => {
                    format!("[Transcript] {}: {}", speaker, text)
                }
                CaptionRecord::Translation {
                    speaker,
                    translated_text,
                    ..
                } => format!("[Translation] {}: {}", speaker, translated_text),
            };
            if let Err(e) = self.room.send_chat(&line).await {
                warn!("failed to mirror caption to chat: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRoom {
        data: Mutex<Vec<(String, Vec<u8>)>>,
        chat: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RoomHandle for RecordingRoom {
        async fn publish_data(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
            self.data.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }

        async fn send_chat(&self, message: &str) -> Result<()> {
            self.chat.lock().unwrap().push(message.to_string());
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publishes_json_on_captions_topic() {
        let room = Arc::new(RecordingRoom::default());
        let publisher = CaptionPublisher::new(room.clone(), false);

        publisher
            .publish(&CaptionRecord::transcription("p1", "Hello.", 1, true))
            .await;

        let data = room.data.lock().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].0, CAPTIONS_TOPIC);
        let json: serde_json::Value = serde_json::from_slice(&data[0].1).unwrap();
        assert_eq!(json["type"], "transcription");
        assert_eq!(json["final"], true);
        assert!(room.chat.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_mirror_when_enabled() {
        let room = Arc::new(RecordingRoom::default());
        let publisher = CaptionPublisher::new(room.clone(), true);

        publisher
            .publish(&CaptionRecord::transcription("p1", "Hello.", 1, true))
            .await;
        publisher
            .publish(&CaptionRecord::translation("p1", "Hello.", "Hola.", "es", 1))
            .await;

        let chat = room.chat.lock().unwrap();
        assert_eq!(chat.len(), 2);
        assert_eq!(chat[0], "[Transcript] p1: Hello.");
        assert_eq!(chat[1], "[Translation] p1: Hola.");
    }
}
