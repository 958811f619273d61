//! Segmenter
//!
//! Consumes an incremental text stream and cuts maximal sentence-like
//! segments at sentence-final punctuation. The first segment of a turn uses
//! a broader punctuation set to minimize time-to-first-audio. Bracketed
//! stage directions are absorbed as they complete: their content never
//! reaches synthesis, but the cursor advances over their positions so they
//! are never re-emitted.

use voice_dialog_core::strip_punctuation_and_emoji;

use crate::filter;

/// Broad set used for the first segment of a turn
const FIRST_SENTENCE_PUNCTUATION: &[char] = &[
    '，', '～', '~', '、', ',', '。', '.', '？', '?', '！', '!', '；', ';', '：',
];

/// Sentence-final set used after the first cut
const SENTENCE_PUNCTUATION: &[char] = &['。', '.', '？', '?', '！', '!', '；', ';', '：'];

/// Outcome of a cut attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cut {
    /// No cut point yet; await more text
    Pending,
    /// A segment was consumed but filtered to nothing speakable; the cursor
    /// advanced so the pipeline does not loop
    Silent,
    /// A speakable segment
    Spoken(String),
}

/// Incremental sentence cutter, one per connection
#[derive(Debug)]
pub struct Segmenter {
    /// Ordered concatenation of received chunks
    buffer: Vec<char>,
    /// Char-offset cursor past emitted content
    processed_chars: usize,
    /// Bracket substrings already absorbed
    brackets_seen: Vec<String>,
    /// Text preceding absorbed brackets, prepended to the next emission
    before_text: Vec<String>,
    is_first_sentence: bool,
    stop_requested: bool,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            processed_chars: 0,
            brackets_seen: Vec::new(),
            before_text: Vec::new(),
            is_first_sentence: true,
            stop_requested: false,
        }
    }

    /// Append a chunk to the buffer
    pub fn push(&mut self, chunk: &str) {
        self.buffer.extend(chunk.chars());
    }

    /// Allow the next cut attempt to flush a punctuation-less tail
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Clear all state; called on FIRST
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.processed_chars = 0;
        self.brackets_seen.clear();
        self.before_text.clear();
        self.is_first_sentence = true;
        self.stop_requested = false;
    }

    pub fn processed_chars(&self) -> usize {
        self.processed_chars
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer currently holds a bracket without its partner
    pub fn has_unpaired_brackets(&self) -> bool {
        has_unpaired_brackets(&self.buffer)
    }

    /// Attempt to cut the next spoken segment
    pub fn try_emit(&mut self) -> Cut {
        // A bracket straddling a chunk boundary must not be emitted.
        if has_unpaired_brackets(&self.buffer) {
            return Cut::Pending;
        }

        let paired = paired_brackets(&self.buffer);
        if !paired.is_empty() && self.brackets_seen.len() < paired.len() {
            // Absorb the newest bracket: stash the text before it, then move
            // the cursor just past the bracket.
            let newest_len = paired
                .last()
                .map(|b| b.chars().count())
                .unwrap_or_default();
            let skip = self
                .buffer
                .len()
                .saturating_sub(self.processed_chars + newest_len);
            let before: String = self.buffer[self.processed_chars..self.processed_chars + skip]
                .iter()
                .collect();
            self.before_text.push(before);
            self.processed_chars =
                (self.processed_chars + skip + newest_len).min(self.buffer.len());
            self.brackets_seen = paired;
        }

        let mut current = self.before_text.concat();
        current.extend(self.buffer[self.processed_chars..].iter());

        if is_blank_after_removing_quotes(&current) {
            return Cut::Pending;
        }

        let punctuation = if self.is_first_sentence {
            FIRST_SENTENCE_PUNCTUATION
        } else {
            SENTENCE_PUNCTUATION
        };

        let current_chars: Vec<char> = current.chars().collect();
        if let Some(pos) = leftmost_cut(&current_chars, punctuation) {
            let raw: String = current_chars[..=pos].iter().collect();
            let raw_len = pos + 1;
            let before_total: usize = self.before_text.iter().map(|s| s.chars().count()).sum();
            // The before-text prefix was already counted into the cursor when
            // its bracket was absorbed; subtract it so it is not counted twice.
            self.processed_chars = (self.processed_chars + raw_len)
                .saturating_sub(before_total)
                .min(self.buffer.len());
            self.before_text.clear();
            self.is_first_sentence = false;

            match spoken_text(&raw) {
                Some(spoken) => Cut::Spoken(spoken),
                None => Cut::Silent,
            }
        } else if self.stop_requested && !current.is_empty() {
            self.processed_chars = self.buffer.len();
            self.before_text.clear();
            self.brackets_seen.clear();
            self.is_first_sentence = true;

            match filter::remove_parentheses(&current) {
                Some(spoken) => Cut::Spoken(spoken),
                None => Cut::Silent,
            }
        } else {
            Cut::Pending
        }
    }

    /// Flush the residue; called on LAST and before FILE playback
    pub fn drain(&mut self) -> Option<String> {
        let mut current = self.before_text.concat();
        current.extend(self.buffer[self.processed_chars..].iter());

        self.processed_chars = self.buffer.len();
        self.before_text.clear();
        self.brackets_seen.clear();

        if is_blank_after_removing_quotes(&current) {
            return None;
        }
        spoken_text(&current)
    }
}

/// Filter and boundary-strip one raw segment into its spoken form
fn spoken_text(raw: &str) -> Option<String> {
    let filtered = filter::filter(raw)?;
    let stripped = strip_punctuation_and_emoji(&filtered);
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Leftmost qualifying punctuation position
///
/// An ASCII period adjacent to another period is part of an ellipsis and
/// never a cut point.
fn leftmost_cut(chars: &[char], punctuation: &[char]) -> Option<usize> {
    for (i, &c) in chars.iter().enumerate() {
        if !punctuation.contains(&c) {
            continue;
        }
        if c == '.' {
            let prev_dot = i > 0 && chars[i - 1] == '.';
            let next_dot = chars.get(i + 1) == Some(&'.');
            if prev_dot || next_dot {
                continue;
            }
        }
        return Some(i);
    }
    None
}

/// Nothing but quote characters and whitespace left
fn is_blank_after_removing_quotes(text: &str) -> bool {
    text.chars()
        .filter(|c| !matches!(c, '“' | '”' | '\'' | '‘' | '’'))
        .all(char::is_whitespace)
}

/// Whether `text` holds any bracket without a same-family partner
///
/// Mixed `(…）` counts as unpaired; only a close matching the open on top of
/// the stack pairs.
fn has_unpaired_brackets(text: &[char]) -> bool {
    let mut stack: Vec<char> = Vec::new();
    for &c in text {
        match c {
            '(' | '（' => stack.push(c),
            ')' | '）' => {
                let Some(open) = stack.pop() else {
                    return true;
                };
                if (c == ')' && open != '(') || (c == '）' && open != '（') {
                    return true;
                }
            }
            _ => {}
        }
    }
    !stack.is_empty()
}

/// All same-family bracket substrings, in close order
fn paired_brackets(text: &[char]) -> Vec<String> {
    let mut matched = Vec::new();
    let mut stack: Vec<(usize, char)> = Vec::new();

    for (i, &c) in text.iter().enumerate() {
        match c {
            '(' | '（' => stack.push((i, c)),
            ')' | '）' => {
                if let Some((start, open)) = stack.pop() {
                    if (c == ')' && open == '(') || (c == '）' && open == '（') {
                        matched.push(text[start..=i].iter().collect());
                    }
                }
            }
            _ => {}
        }
    }

    matched
}
