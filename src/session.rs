//! Room session orchestration.
//!
//! A [`CaptionSession`] owns the connection to one room: it reacts to track
//! subscriptions by spawning speaker pipelines, applies `language_prefs`
//! data messages, and flushes every open sentence before disconnecting. The
//! [`SessionManager`] keys sessions by room name for the control surface.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::aggregator::FrameAggregator;
use crate::audio::AudioFrame;
use crate::config::AgentConfig;
use crate::filter::TranscriptGate;
use crate::messages::{InboundMessage, ParticipantPrefs, CAPTIONS_TOPIC};
use crate::pipeline::{self, Slice};
use crate::publish::CaptionPublisher;
use crate::room::{RoomConnector, RoomEvent, RoomHandle, SpeakerId};
use crate::sentence::SentenceAssembler;
use crate::stt::SpeechToText;
use crate::translate::Translator;

pub(crate) type SharedPrefs = Arc<RwLock<HashMap<SpeakerId, ParticipantPrefs>>>;

/// Session-level language fallbacks, from the start request or environment.
#[derive(Debug, Clone, Default)]
pub struct LanguageDefaults {
    pub stt_language: Option<String>,
    pub target_language: Option<String>,
}

fn agent_metadata() -> String {
    serde_json::json!({ "role": "agent", "subtype": "captions" }).to_string()
}

struct SpeakerPipelines {
    track_task: JoinHandle<()>,
    speaker_task: JoinHandle<()>,
}

pub struct CaptionSession {
    room_name: String,
    room: Arc<dyn RoomHandle>,
    events: mpsc::Receiver<RoomEvent>,
    cfg: Arc<AgentConfig>,
    stt: Arc<dyn SpeechToText>,
    translator: Arc<dyn Translator>,
    publisher: Arc<CaptionPublisher>,
    defaults: LanguageDefaults,
    prefs: SharedPrefs,
    speakers: HashMap<SpeakerId, SpeakerPipelines>,
    running_rx: watch::Receiver<bool>,
}

impl CaptionSession {
    /// Join the room and spawn the session event loop.
    pub async fn start(
        connector: &dyn RoomConnector,
        room_name: &str,
        cfg: Arc<AgentConfig>,
        stt: Arc<dyn SpeechToText>,
        translator: Arc<dyn Translator>,
        defaults: LanguageDefaults,
    ) -> Result<SessionHandle> {
        let (room, events) = connector
            .connect(room_name, &agent_metadata())
            .await
            .with_context(|| format!("failed to join room {}", room_name))?;

        let publisher = Arc::new(CaptionPublisher::new(room.clone(), cfg.send_chat));
        let (stop_tx, running_rx) = watch::channel(true);

        let session = CaptionSession {
            room_name: room_name.to_string(),
            room,
            events,
            cfg,
            stt,
            translator,
            publisher,
            defaults,
            prefs: Arc::new(RwLock::new(HashMap::new())),
            speakers: HashMap::new(),
            running_rx,
        };
        let task = tokio::spawn(session.run());

        Ok(SessionHandle {
            room_name: room_name.to_string(),
            stop_tx,
            task,
        })
    }

    async fn run(mut self) {
        info!("captioning session for {} started", self.room_name);
        let mut running = self.running_rx.clone();
        loop {
            tokio::select! {
                changed = running.changed() => {
                    if changed.is_err() || !*running.borrow() {
                        break;
                    }
                }
                event = self.events.recv() => match event {
                    Some(RoomEvent::TrackSubscribed { speaker, frames }) => {
                        self.attach_speaker(speaker, frames);
                    }
                    Some(RoomEvent::TrackUnsubscribed { speaker }) => {
                        self.detach_speaker(&speaker).await;
                    }
                    Some(RoomEvent::DataReceived { topic, payload }) => {
                        self.handle_data(&topic, &payload);
                    }
                    Some(RoomEvent::Disconnected) | None => break,
                },
            }
        }
        self.shutdown().await;
    }

    fn attach_speaker(&mut self, speaker: SpeakerId, frames: mpsc::Receiver<AudioFrame>) {
        if self.speakers.contains_key(&speaker) {
            warn!("audio track for {} already attached, ignoring", speaker);
            return;
        }
        info!("attaching caption pipeline for {}", speaker);

        let (slice_tx, slice_rx) = mpsc::channel::<Slice>(64);
        let aggregator = FrameAggregator::new(
            self.cfg.buffer_target_ms,
            self.cfg.overlap_ms,
            self.cfg.vad_threshold,
        );
        let gate = TranscriptGate::new(
            &self.cfg.blocklist_phrases,
            self.cfg.short_high_rms,
            self.cfg.repeat_window_ms,
        );
        let assembler = SentenceAssembler::new(self.cfg.assembler_config());

        let track_task = tokio::spawn(pipeline::run_track_pipeline(
            speaker.clone(),
            frames,
            aggregator,
            self.stt.clone(),
            self.prefs.clone(),
            self.defaults.clone(),
            slice_tx,
            self.running_rx.clone(),
        ));
        let speaker_task = tokio::spawn(pipeline::run_speaker_task(
            speaker.clone(),
            slice_rx,
            assembler,
            gate,
            self.publisher.clone(),
            self.translator.clone(),
            self.prefs.clone(),
            self.defaults.clone(),
        ));

        self.speakers.insert(
            speaker,
            SpeakerPipelines {
                track_task,
                speaker_task,
            },
        );
    }

    /// Tear down one speaker's pipelines. Aborting the track loop drops its
    /// slice sender, which makes the speaker loop flush any open sentence as
    /// final before it exits.
    async fn detach_speaker(&mut self, speaker: &str) {
        if let Some(pipelines) = self.speakers.remove(speaker) {
            info!("detaching caption pipeline for {}", speaker);
            pipelines.track_task.abort();
            let _ = pipelines.speaker_task.await;
        }
    }

    fn handle_data(&self, topic: &str, payload: &[u8]) {
        if topic != CAPTIONS_TOPIC {
            return;
        }
        match serde_json::from_slice::<InboundMessage>(payload) {
            Ok(InboundMessage::LanguagePrefs {
                participant_id,
                stt_language,
                target_language,
            }) => {
                debug!(
                    "language prefs for {}: stt={:?} target={:?}",
                    participant_id, stt_language, target_language
                );
                let mut prefs = self.prefs.write().unwrap();
                let entry = prefs.entry(participant_id).or_default();
                if stt_language.is_some() {
                    entry.stt_language = stt_language;
                }
                if target_language.is_some() {
                    entry.target_language = target_language;
                }
            }
            Ok(InboundMessage::Unknown) => {}
            Err(e) => debug!("ignoring malformed data message: {}", e),
        }
    }

    async fn shutdown(&mut self) {
        info!("captioning session for {} stopping", self.room_name);
        for (_, pipelines) in self.speakers.drain() {
            pipelines.track_task.abort();
            let _ = pipelines.speaker_task.await;
        }
        if let Err(e) = self.room.disconnect().await {
            warn!("error disconnecting from {}: {}", self.room_name, e);
        }
        info!("captioning session for {} stopped", self.room_name);
    }
}

/// Handle to a running session, owned by the [`SessionManager`].
pub struct SessionHandle {
    room_name: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    /// Stop the session: pipelines drain, open sentences flush as final, and
    /// the room is disconnected before this returns.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(false);
        if let Err(e) = self.task.await {
            warn!("session task for {} failed: {}", self.room_name, e);
        }
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Keys running sessions by room name; backs the HTTP control surface.
pub struct SessionManager {
    cfg: Arc<AgentConfig>,
    connector: Arc<dyn RoomConnector>,
    stt: Arc<dyn SpeechToText>,
    translator: Arc<dyn Translator>,
    sessions: tokio::sync::Mutex<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        cfg: AgentConfig,
        connector: Arc<dyn RoomConnector>,
        stt: Arc<dyn SpeechToText>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            cfg: Arc::new(cfg),
            connector,
            stt,
            translator,
            sessions: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Start captioning a room. Already-running rooms are left untouched; a
    /// failed join leaves no session behind.
    pub async fn start(
        &self,
        room_name: &str,
        target_language: Option<String>,
        stt_language: Option<String>,
    ) -> Result<StartOutcome> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(room_name) {
            info!("captioning already running for {}", room_name);
            return Ok(StartOutcome::AlreadyRunning);
        }

        let defaults = LanguageDefaults {
            stt_language: stt_language.or_else(|| self.cfg.stt_language.clone()),
            target_language: target_language.or_else(|| self.cfg.target_language.clone()),
        };
        let handle = CaptionSession::start(
            self.connector.as_ref(),
            room_name,
            self.cfg.clone(),
            self.stt.clone(),
            self.translator.clone(),
            defaults,
        )
        .await?;
        sessions.insert(room_name.to_string(), handle);
        Ok(StartOutcome::Started)
    }

    /// Stop captioning a room. Returns whether a session was running.
    pub async fn stop(&self, room_name: &str) -> bool {
        let handle = self.sessions.lock().await.remove(room_name);
        match handle {
            Some(handle) => {
                handle.stop().await;
                true
            }
            None => {
                info!("no captioning session for {}", room_name);
                false
            }
        }
    }

    pub async fn active_rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Stop every active session, flushing open sentences.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, SessionHandle)> =
            self.sessions.lock().await.drain().collect();
        for (_, handle) in handles {
            handle.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_metadata_identifies_captions_agent() {
        let metadata: serde_json::Value = serde_json::from_str(&agent_metadata()).unwrap();
        assert_eq!(metadata["role"], "agent");
        assert_eq!(metadata["subtype"], "captions");
    }

    #[test]
    fn test_language_defaults_start_unset() {
        let defaults = LanguageDefaults::default();
        assert!(defaults.stt_language.is_none());
        assert!(defaults.target_language.is_none());
    }
}
