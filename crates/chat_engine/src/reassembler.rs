use std::collections::BTreeMap;

use chat_core::{ResultFragment, SequenceId, STREAM_ORIGIN};

/// Restores logical fragment order from arbitrary arrival order.
///
/// Fragments are bucketed by sequence id in an ordered map. Duplicate ids
/// (producer retries) keep their relative insertion order inside one bucket,
/// matching what a stable sort of the arrival buffer would yield. Keeping the
/// span of distinct ids makes the contiguity check O(1) amortized instead of
/// a re-sort per arrival.
#[derive(Debug, Default)]
pub struct FragmentReassembler {
    by_sequence: BTreeMap<SequenceId, Vec<ResultFragment>>,
    saw_terminal_marker: bool,
}

impl FragmentReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers one fragment in arrival order.
    pub fn accept(&mut self, fragment: ResultFragment) {
        if fragment.is_stop_marker() {
            self.saw_terminal_marker = true;
        }
        self.by_sequence
            .entry(fragment.sequence_id)
            .or_default()
            .push(fragment);
    }

    /// True when the buffer is non-empty and the sorted ids form a contiguous
    /// run starting at the minimum id. A gap means the stream is still in
    /// flight (or a fragment was dropped); a gapped buffer is never treated as
    /// an acceptable assembly.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let (Some((&first, _)), Some((&last, _))) = (
            self.by_sequence.first_key_value(),
            self.by_sequence.last_key_value(),
        ) else {
            return false;
        };

        last - first + 1 == self.by_sequence.len() as u64
    }

    /// True when a buffered fragment marked the end of the stream: the final
    /// sentinel or an explicit stop/length finish.
    #[must_use]
    pub fn has_terminal_marker(&self) -> bool {
        self.saw_terminal_marker
    }

    /// True when the buffered run begins at the stream origin. A lone
    /// high-numbered fragment is contiguous by itself, so finalization must
    /// also anchor at the origin before trusting `is_complete`.
    #[must_use]
    pub fn starts_at_origin(&self) -> bool {
        self.by_sequence
            .first_key_value()
            .is_some_and(|(&first, _)| first == STREAM_ORIGIN)
    }

    /// Buffered fragments in logical order.
    #[must_use]
    pub fn ordered(&self) -> Vec<&ResultFragment> {
        self.by_sequence.values().flatten().collect()
    }

    /// The leading gap-free run of fragments starting at the stream origin.
    ///
    /// Used for best-effort saves on cancellation: content past a gap, or a
    /// run that never included the origin, is never assembled.
    #[must_use]
    pub fn contiguous_prefix(&self) -> Vec<&ResultFragment> {
        let mut prefix = Vec::new();
        let mut expected = STREAM_ORIGIN;

        for (&id, bucket) in &self.by_sequence {
            if id != expected {
                break;
            }
            prefix.extend(bucket.iter());
            expected = id + 1;
        }

        prefix
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_sequence.is_empty()
    }

    /// Number of buffered fragments, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_sequence.values().map(Vec::len).sum()
    }

    /// Drops all transient state ahead of the next turn.
    pub fn clear(&mut self) {
        self.by_sequence.clear();
        self.saw_terminal_marker = false;
    }
}
