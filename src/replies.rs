use crate::records::TweetRecord;
use std::collections::HashMap;

/// Where reply targets are read from. Scans over the Replies timeline use
/// the structured field; free-text scans parse leading `@` mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionSource {
    StructuredReply,
    TextMentions,
}

/// Per-handle reply counter. Counts only grow; discovery order is kept so
/// equal counts never get reshuffled between runs over the same input.
#[derive(Debug)]
pub struct ReplyTally {
    self_handle: String,
    index: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl ReplyTally {
    /// `self_handle` (with or without `@`) is excluded from the tally.
    pub fn new(self_handle: &str) -> Self {
        Self {
            self_handle: normalize(self_handle),
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Record the qualifying reply targets of one tweet. Returns how many
    /// occurrences were counted.
    pub fn observe(&mut self, tweet: &TweetRecord, source: MentionSource) -> usize {
        match source {
            MentionSource::StructuredReply => match tweet.in_reply_to.as_deref() {
                Some(target) => self.add(target) as usize,
                None => 0,
            },
            MentionSource::TextMentions => leading_mentions(&tweet.text)
                .into_iter()
                .filter(|handle| self.add(handle))
                .count(),
        }
    }

    fn add(&mut self, handle: &str) -> bool {
        let key = normalize(handle);
        if key.is_empty() || key == self.self_handle {
            return false;
        }
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries
                    .push((handle.trim_start_matches('@').to_string(), 1));
            }
        }
        true
    }

    /// Sum of all counts; equals the number of qualifying occurrences seen.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handles whose count meets the threshold, in discovery order.
    pub fn filter_min(&self, min: u64) -> Vec<(String, u64)> {
        self.entries
            .iter()
            .filter(|(_, n)| *n >= min)
            .cloned()
            .collect()
    }

    /// Same filter, ordered by count descending; equal counts keep
    /// discovery order (stable sort).
    pub fn most_common(&self, min: u64) -> Vec<(String, u64)> {
        let mut filtered = self.filter_min(min);
        filtered.sort_by(|a, b| b.1.cmp(&a.1));
        filtered
    }
}

fn normalize(handle: &str) -> String {
    handle.trim_start_matches('@').to_lowercase()
}

/// Parse `@` mention tokens from tweet text that opens with a mention.
/// Handles are the platform's `[A-Za-z0-9_]` alphabet; trailing punctuation
/// is not part of the handle.
fn leading_mentions(text: &str) -> Vec<String> {
    if !text.starts_with('@') {
        return Vec::new();
    }
    text.split_whitespace()
        .filter_map(|word| word.strip_prefix('@'))
        .map(|raw| {
            raw.chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|handle| !handle.is_empty())
        .collect()
}
