//! Per-speaker pipeline tasks.
//!
//! Each subscribed audio track runs two tasks: a track loop that turns
//! frames into windows and windows into transcript slices, and a speaker
//! loop that owns the sentence state and its timers. Timers are select arms
//! of the speaker loop, so a firing timer is linearized against slice
//! arrival and the pause-wins-over-grace rule needs no locking.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

use crate::aggregator::FrameAggregator;
use crate::audio::AudioFrame;
use crate::filter::TranscriptGate;
use crate::messages::CaptionRecord;
use crate::publish::CaptionPublisher;
use crate::room::SpeakerId;
use crate::sentence::{Emission, SentenceAssembler};
use crate::session::{LanguageDefaults, SharedPrefs};
use crate::stt::SpeechToText;
use crate::translate::Translator;

/// A transcript slice accepted for a speaker, annotated with the energy of
/// the window it came from.
#[derive(Debug)]
pub(crate) struct Slice {
    pub text: String,
    pub rms: f32,
}

/// Track loop: frames -> windows -> STT -> slices.
///
/// Exits when the frame channel closes or the session's running flag flips;
/// dropping its slice sender is what tells the speaker loop to flush.
pub(crate) async fn run_track_pipeline(
    speaker: SpeakerId,
    mut frames: mpsc::Receiver<AudioFrame>,
    mut aggregator: FrameAggregator,
    stt: Arc<dyn SpeechToText>,
    prefs: SharedPrefs,
    defaults: LanguageDefaults,
    slices: mpsc::Sender<Slice>,
    mut running: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            changed = running.changed() => {
                if changed.is_err() || !*running.borrow() {
                    break;
                }
                continue;
            }
        };

        let Some(window) = aggregator.push(&frame) else {
            continue;
        };

        let language = {
            let prefs = prefs.read().unwrap();
            prefs
                .get(&speaker)
                .and_then(|p| p.stt_language.clone())
                .or_else(|| defaults.stt_language.clone())
        };

        match stt.transcribe(&window, language.as_deref()).await {
            Ok(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                let slice = Slice {
                    text,
                    rms: window.rms,
                };
                if slices.send(slice).await.is_err() {
                    break;
                }
            }
            // The next window carries any missed content forward thanks to
            // the overlap, so a failed window is simply dropped.
            Err(e) => warn!("transcription failed for {}: {}", speaker, e),
        }
    }
    debug!("track pipeline for {} exited", speaker);
}

/// Speaker loop: slices and timers -> emissions -> publication.
///
/// When the slice channel closes the open sentence, if any, is flushed as
/// final before the task exits.
pub(crate) async fn run_speaker_task(
    speaker: SpeakerId,
    mut slices: mpsc::Receiver<Slice>,
    mut assembler: SentenceAssembler,
    mut gate: TranscriptGate,
    publisher: Arc<CaptionPublisher>,
    translator: Arc<dyn Translator>,
    prefs: SharedPrefs,
    defaults: LanguageDefaults,
) {
    loop {
        let deadline = assembler.next_deadline();
        tokio::select! {
            slice = slices.recv() => match slice {
                Some(slice) => {
                    let now = Instant::now();
                    if gate.accept(&slice.text, slice.rms, now) {
                        assembler.append(&slice.text, now);
                    }
                }
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(emission) = assembler.on_deadline(Instant::now()) {
                    emit(&speaker, emission, &publisher, translator.as_ref(), &prefs, &defaults).await;
                }
            }
        }
    }

    if let Some(emission) = assembler.flush(true) {
        emit(&speaker, emission, &publisher, translator.as_ref(), &prefs, &defaults).await;
    }
    debug!("speaker task for {} exited", speaker);
}

/// Publish one emission; finals additionally go through translation.
async fn emit(
    speaker: &str,
    emission: Emission,
    publisher: &CaptionPublisher,
    translator: &dyn Translator,
    prefs: &SharedPrefs,
    defaults: &LanguageDefaults,
) {
    let record =
        CaptionRecord::transcription(speaker, &emission.text, emission.sentence_id, emission.is_final);
    publisher.publish(&record).await;

    if !emission.is_final {
        return;
    }

    let (recognition, target) = {
        let prefs = prefs.read().unwrap();
        let p = prefs.get(speaker);
        (
            p.and_then(|p| p.stt_language.clone())
                .or_else(|| defaults.stt_language.clone()),
            p.and_then(|p| p.target_language.clone())
                .or_else(|| defaults.target_language.clone()),
        )
    };
    let Some(target) = target else {
        return;
    };
    // When no STT hint is configured, recognition runs in English.
    let recognition = recognition.unwrap_or_else(|| "en".to_string());
    if same_language(&recognition, &target) {
        debug!(
            "skipping translation for {} sentence {}: already {}",
            speaker, emission.sentence_id, target
        );
        return;
    }

    match translator.translate(&emission.text, &target).await {
        Ok(translated) => {
            let record = CaptionRecord::translation(
                speaker,
                &emission.text,
                &translated,
                &target,
                emission.sentence_id,
            );
            publisher.publish(&record).await;
        }
        Err(e) => warn!(
            "translation failed for {} sentence {}: {}",
            speaker, emission.sentence_id, e
        ),
    }
}

/// Compare primary language subtags, so "en-US" and "en" count as the same
/// language.
pub(crate) fn same_language(a: &str, b: &str) -> bool {
    fn primary(tag: &str) -> String {
        tag.split(['-', '_'])
            .next()
            .unwrap_or(tag)
            .trim()
            .to_lowercase()
    }
    primary(a) == primary(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_language_primary_subtag() {
        assert!(same_language("en", "en"));
        assert!(same_language("en-US", "en"));
        assert!(same_language("pt_BR", "pt"));
        assert!(!same_language("en", "es"));
        assert!(same_language("ES", "es-MX"));
    }
}
