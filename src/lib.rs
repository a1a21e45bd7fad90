//! Server-side captioning agent for multi-party real-time audio conferences.
//!
//! For each requested room the agent joins as a participant, subscribes to
//! every remote audio track, transcribes the speech incrementally through a
//! remote STT endpoint, assembles per-speaker sentences with interim/final
//! tracking, optionally translates finalized sentences, and publishes
//! caption records back into the room on the `captions` data topic.
//!
//! The conferencing SDK is consumed through the traits in [`room`]; hosts
//! embed the agent next to whatever room backend they run.

pub mod aggregator;
pub mod audio;
pub mod config;
pub mod filter;
pub mod messages;
mod pipeline;
pub mod publish;
pub mod room;
pub mod sentence;
pub mod server;
pub mod session;
pub mod stt;
pub mod translate;

pub use audio::{AudioFrame, AudioWindow};
pub use config::AgentConfig;
pub use messages::{CaptionRecord, InboundMessage, ParticipantPrefs, CAPTIONS_TOPIC};
pub use room::{RoomConnector, RoomEvent, RoomHandle, SpeakerId, StubRoomConnector};
pub use session::{LanguageDefaults, SessionManager, StartOutcome};
pub use stt::{OpenAiStt, SpeechToText};
pub use translate::{OpenAiTranslator, Translator};
