//! Gradient tape
//!
//! A thread-local record of operations applied to gradient-tracked
//! tensors. The forward pass only appends entries; consuming them to run
//! a backward pass belongs to the autodiff engine built on top of this
//! tape.

use std::cell::RefCell;

use crate::tensor::TensorMeta;

/// One recorded forward operation.
#[derive(Debug, Clone, PartialEq)]
pub struct TapeEntry {
    pub op_name: String,
    pub input_metas: Vec<TensorMeta>,
    pub output_metas: Vec<TensorMeta>,
}

/// Append-only record of gradient-tracked operations.
#[derive(Debug, Default)]
pub struct GradTape {
    entries: Vec<TapeEntry>,
}

impl GradTape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: TapeEntry) {
        tracing::trace!(op = entry.op_name.as_str(), "taped operation");
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TapeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain the tape, handing ownership of the entries to the caller.
    pub fn take(&mut self) -> Vec<TapeEntry> {
        std::mem::take(&mut self.entries)
    }
}

thread_local! {
    static THREAD_TAPE: RefCell<GradTape> = RefCell::new(GradTape::new());
}

/// Append an entry to this thread's tape.
pub fn record_entry(entry: TapeEntry) {
    THREAD_TAPE.with(|tape| tape.borrow_mut().record(entry));
}

/// Number of entries on this thread's tape.
pub fn taped_entry_count() -> usize {
    THREAD_TAPE.with(|tape| tape.borrow().len())
}

/// Drain this thread's tape.
pub fn take_taped_entries() -> Vec<TapeEntry> {
    THREAD_TAPE.with(|tape| tape.borrow_mut().take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{DType, Shape};

    fn entry(op: &str) -> TapeEntry {
        let meta = TensorMeta::new(Shape::new([2]), DType::F32);
        TapeEntry {
            op_name: op.to_string(),
            input_metas: vec![meta.clone()],
            output_metas: vec![meta],
        }
    }

    #[test]
    fn test_tape_records_in_order() {
        let mut tape = GradTape::new();
        tape.record(entry("a"));
        tape.record(entry("b"));
        assert_eq!(tape.len(), 2);
        assert_eq!(tape.entries()[0].op_name, "a");
        assert_eq!(tape.entries()[1].op_name, "b");
    }

    #[test]
    fn test_take_drains_tape() {
        let mut tape = GradTape::new();
        tape.record(entry("a"));
        let taken = tape.take();
        assert_eq!(taken.len(), 1);
        assert!(tape.is_empty());
    }

    #[test]
    fn test_thread_local_tape_round_trip() {
        take_taped_entries();
        record_entry(entry("copy"));
        assert_eq!(taped_entry_count(), 1);
        let entries = take_taped_entries();
        assert_eq!(entries[0].op_name, "copy");
        assert_eq!(taped_entry_count(), 0);
    }
}
