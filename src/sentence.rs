//! Per-speaker sentence assembly.
//!
//! Successive transcript slices from overlapping audio windows are merged
//! into a growing sentence buffer. A sentence becomes final either when it
//! ends in strong punctuation and a short grace delay passes without a
//! continuation, or when the speaker pauses long enough. Interim emissions
//! keep captions flowing while a sentence is still open.
//!
//! The assembler is a pure state machine: time is injected, and timer
//! deadlines are exposed for the owning task to sleep on, so firing is
//! linearized against slice arrival.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;

/// Punctuation that may close a sentence.
const STRONG_ENDINGS: &[char] = &['.', '!', '?', '…', ')', ']', '"', '。', '！', '？'];

/// Longest word overlap considered when merging consecutive slices.
const MAX_OVERLAP_WORDS: usize = 6;

/// Maximum normalized growth for a slice to count as a restatement of the
/// whole buffer rather than new material.
const RESTATEMENT_MAX_GROWTH: usize = 80;

// Same character class normalize() keeps, so word counts agree between the
// normalized and the original form of a slice.
fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[\p{Alphabetic}\p{N}']+").expect("static word pattern"))
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Delay between a strong sentence ending and finalization, giving a
    /// trailing continuation a chance to extend the sentence.
    pub punct_grace: Duration,
    /// Inactivity delay after which the open buffer is flushed.
    pub pause_final: Duration,
    /// Minimum buffer length for punctuation-triggered finalization.
    pub min_chars_for_final: usize,
    /// Lowercased words that end a token but rarely a sentence.
    pub weak_end_words: HashSet<String>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            punct_grace: Duration::from_millis(900),
            pause_final: Duration::from_millis(2500),
            min_chars_for_final: 24,
            weak_end_words: [
                "doing", "going", "is", "are", "was", "were", "about", "with", "to", "for",
                "like",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
        }
    }
}

/// One caption emission: the current sentence text, its id, and whether the
/// id is now closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub text: String,
    pub sentence_id: u64,
    pub is_final: bool,
}

#[derive(Debug)]
pub struct SentenceAssembler {
    cfg: AssemblerConfig,
    buffer: String,
    sentence_id: Option<u64>,
    next_sentence_id: u64,
    pause_deadline: Option<Instant>,
    grace_deadline: Option<Instant>,
    last_interim: Option<String>,
}

impl SentenceAssembler {
    pub fn new(cfg: AssemblerConfig) -> Self {
        Self {
            cfg,
            buffer: String::new(),
            sentence_id: None,
            next_sentence_id: 0,
            pause_deadline: None,
            grace_deadline: None,
            last_interim: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Merge an accepted transcript slice into the open sentence and re-arm
    /// the timers.
    pub fn append(&mut self, slice: &str, now: Instant) {
        let slice = slice.trim();
        if slice.is_empty() {
            return;
        }

        self.buffer = merge_overlapping(&self.buffer, slice);
        self.pause_deadline = Some(now + self.cfg.pause_final);

        if self.ends_strong() {
            // Keep an already-armed grace deadline; the sentence ending has
            // not moved backwards.
            if self.grace_deadline.is_none() {
                self.grace_deadline = Some(now + self.cfg.punct_grace);
            }
        } else {
            // The continuation removed the strong ending.
            self.grace_deadline = None;
        }
    }

    /// The next instant at which [`Self::on_deadline`] should be called.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.pause_deadline, self.grace_deadline) {
            (Some(p), Some(g)) => Some(p.min(g)),
            (p, g) => p.or(g),
        }
    }

    /// Handle an elapsed timer. The pause timer wins over a pending grace
    /// timer: a real pause finalizes immediately.
    pub fn on_deadline(&mut self, now: Instant) -> Option<Emission> {
        let pause_due = self.pause_deadline.map_or(false, |d| d <= now);
        let grace_due = self.grace_deadline.map_or(false, |d| d <= now);

        if pause_due {
            self.pause_deadline = None;
            if self.grace_deadline.is_some() {
                return self.flush(true);
            }
            return self.emit_interim();
        }
        if grace_due {
            self.grace_deadline = None;
            return self.flush(true);
        }
        None
    }

    /// Publish the open buffer. A final flush closes the sentence id; a
    /// non-final one leaves buffer and id in place for further appends.
    pub fn flush(&mut self, is_final: bool) -> Option<Emission> {
        let text = self.buffer.trim();
        if text.is_empty() {
            return None;
        }
        let text = text.to_string();
        self.pause_deadline = None;

        let id = match self.sentence_id {
            Some(id) => id,
            None => {
                self.next_sentence_id += 1;
                self.sentence_id = Some(self.next_sentence_id);
                self.next_sentence_id
            }
        };

        if is_final {
            self.buffer.clear();
            self.sentence_id = None;
            self.grace_deadline = None;
            self.last_interim = None;
        }

        Some(Emission {
            text,
            sentence_id: id,
            is_final,
        })
    }

    fn emit_interim(&mut self) -> Option<Emission> {
        if self.last_interim.as_deref() == Some(self.buffer.trim()) {
            // Nothing new since the last interim publication.
            return None;
        }
        let emission = self.flush(false)?;
        self.last_interim = Some(emission.text.clone());
        Some(emission)
    }

    fn ends_strong(&self) -> bool {
        let text = self.buffer.trim_end();
        let Some(last) = text.chars().last() else {
            return false;
        };
        if !STRONG_ENDINGS.contains(&last) {
            return false;
        }
        if text.chars().count() < self.cfg.min_chars_for_final {
            return false;
        }
        last_word(text).map_or(true, |w| !self.cfg.weak_end_words.contains(&w))
    }
}

fn last_word(text: &str) -> Option<String> {
    word_pattern()
        .find_iter(text)
        .last()
        .map(|m| m.as_str().to_lowercase())
}

/// Lowercase, strip everything but alphanumerics and apostrophes, collapse
/// whitespace. Overlap comparison happens on this form.
fn normalize(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop the first `n` word tokens from `text`, cutting only at token
/// boundaries.
fn skip_words(text: &str, n: usize) -> &str {
    let mut end = 0;
    for (i, m) in word_pattern().find_iter(text).enumerate() {
        if i + 1 == n {
            end = m.end();
            break;
        }
    }
    text[end..].trim_start()
}

/// Merge a new transcript slice into the buffer, deduplicating the overlap
/// the tail-prepended audio windows produce.
pub(crate) fn merge_overlapping(buffer: &str, slice: &str) -> String {
    let buffer = buffer.trim();
    let slice = slice.trim();
    if buffer.is_empty() {
        return slice.to_string();
    }
    if slice.is_empty() {
        return buffer.to_string();
    }

    let nb = normalize(buffer);
    let ns = normalize(slice);

    // A slice that restates the whole buffer (the recognizer refining its
    // own output over the overlapped window) replaces it outright.
    if !nb.is_empty()
        && ns.starts_with(&nb)
        && (ns.len() == nb.len() || ns.as_bytes()[nb.len()] == b' ')
        && ns.len() - nb.len() < RESTATEMENT_MAX_GROWTH
    {
        return slice.to_string();
    }

    let nb_words: Vec<&str> = nb.split_whitespace().collect();
    let ns_words: Vec<&str> = ns.split_whitespace().collect();
    let max_k = MAX_OVERLAP_WORDS.min(nb_words.len()).min(ns_words.len());
    for k in (1..=max_k).rev() {
        if nb_words[nb_words.len() - k..] == ns_words[..k] {
            return join_after_overlap(buffer, skip_words(slice, k));
        }
    }

    format!("{} {}", buffer, slice)
}

/// Join the unshared remainder of a slice onto the buffer. Punctuation left
/// dangling at the cut is attached to the overlap word it belongs to rather
/// than duplicated or floated on its own.
fn join_after_overlap(buffer: &str, rest: &str) -> String {
    let Some(first) = rest.chars().next() else {
        return buffer.to_string();
    };
    if first.is_alphanumeric() || first == '\'' {
        return format!("{} {}", buffer, rest);
    }
    let buffer_ends_word = buffer
        .chars()
        .last()
        .map_or(false, |c| c.is_alphanumeric() || c == '\'');
    if buffer_ends_word {
        // "lazy dog" + ". Then" -> "lazy dog. Then"
        return format!("{}{}", buffer, rest);
    }
    // Both sides carry the joining punctuation; keep the buffer's copy.
    // "hello," + ", world" -> "hello, world"
    let stripped = rest
        .trim_start_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .trim_start();
    if stripped.is_empty() {
        buffer.to_string()
    } else {
        format!("{} {}", buffer, stripped)
    }
}
