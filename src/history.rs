//! # Undo/Redo History
//!
//! Each surface owns one [`HistoryManager`]: an append-only log of
//! serialized object lists with a cursor.
//!
//! ## Recording (`record`)
//!
//! 1. If a restore is in progress ([`EditorMode::Restoring`]) nothing happens.
//!    Applying a snapshot fires the same change notifications as a user edit;
//!    recording them would push the restored state back onto the log.
//! 2. Every snapshot after the cursor is dropped. Redo past a fresh edit is
//!    impossible.
//! 3. The new snapshot is appended and the cursor moves to it.
//! 4. If the log exceeds its capacity the oldest snapshot is evicted, so the
//!    cursor never exceeds `capacity - 1`.
//!
//! ## Undoing and Redoing
//!
//! `undo`/`redo` move the cursor by one, switch to `Restoring`, and hand back
//! a [`Restore`] carrying the snapshot to apply. The caller applies it and
//! then calls [`HistoryManager::finish_restore`] once rendering has settled,
//! or [`HistoryManager::abort_restore`] if the snapshot could not be applied.
//!
//! The cursor lives only here. Callers read it through
//! [`HistoryManager::current_index`] and never keep their own copy.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::MailcraftError;
use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::document::GraphicObject;

/// Whether the change-notification path may record history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditorMode {
    #[default]
    Idle,
    /// A snapshot is being applied; `record` is a no-op.
    Restoring,
}

/// A serialized copy of one surface's object list.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Monotonic across the lifetime of the manager, never reused.
    pub step: u64,
    pub objects: String,
    pub recorded_at: DateTime<Utc>,
}

impl Snapshot {
    /// Decode the stored object list.
    pub fn decode(&self) -> Result<Vec<GraphicObject>, MailcraftError> {
        serde_json::from_str(&self.objects).map_err(|e| MailcraftError::CorruptSnapshot {
            step: self.step,
            reason: e.to_string(),
        })
    }
}

/// Result of [`HistoryManager::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { index: usize },
    /// Skipped because a restore is in progress.
    Suppressed,
}

/// An undo or redo in flight.
#[derive(Debug, Clone)]
pub struct Restore {
    pub snapshot: Snapshot,
    /// Cursor position before the move, for [`HistoryManager::abort_restore`].
    pub previous_index: usize,
}

/// Bounded snapshot log with cursor and restore guard.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    snapshots: VecDeque<Snapshot>,
    cursor: Option<usize>,
    mode: EditorMode,
    capacity: usize,
    next_step: u64,
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            cursor: None,
            mode: EditorMode::Idle,
            capacity: capacity.max(1),
            next_step: 0,
        }
    }

    /// Record the current object list.
    pub fn record(&mut self, objects: &[GraphicObject]) -> Result<RecordOutcome, MailcraftError> {
        if self.mode == EditorMode::Restoring {
            tracing::debug!("history record suppressed during restore");
            return Ok(RecordOutcome::Suppressed);
        }
        let serialized = serde_json::to_string(objects)?;
        Ok(self.record_serialized(serialized))
    }

    /// Record an already-serialized object list.
    pub fn record_serialized(&mut self, objects: String) -> RecordOutcome {
        if self.mode == EditorMode::Restoring {
            return RecordOutcome::Suppressed;
        }

        if let Some(cursor) = self.cursor {
            self.snapshots.truncate(cursor + 1);
        }

        self.snapshots.push_back(Snapshot {
            step: self.next_step,
            objects,
            recorded_at: Utc::now(),
        });
        self.next_step += 1;

        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        let index = self.snapshots.len() - 1;
        self.cursor = Some(index);

        tracing::debug!(index, step = self.next_step - 1, len = self.snapshots.len(), "history recorded");
        RecordOutcome::Recorded { index }
    }

    /// Step back. `Ok(None)` when already at the oldest snapshot.
    pub fn undo(&mut self) -> Result<Option<Restore>, MailcraftError> {
        match self.cursor {
            Some(cursor) if cursor > 0 => self.move_to(cursor, cursor - 1).map(Some),
            _ => Ok(None),
        }
    }

    /// Step forward. `Ok(None)` when already at the newest snapshot.
    pub fn redo(&mut self) -> Result<Option<Restore>, MailcraftError> {
        match self.cursor {
            Some(cursor) if cursor + 1 < self.snapshots.len() => self.move_to(cursor, cursor + 1).map(Some),
            _ => Ok(None),
        }
    }

    fn move_to(&mut self, from: usize, to: usize) -> Result<Restore, MailcraftError> {
        let snapshot = self
            .snapshots
            .get(to)
            .cloned()
            .ok_or(MailcraftError::MissingHistoryEntry {
                index: to,
                len: self.snapshots.len(),
            })?;
        self.cursor = Some(to);
        self.mode = EditorMode::Restoring;
        tracing::debug!(from, to, step = snapshot.step, "history restore started");
        Ok(Restore {
            snapshot,
            previous_index: from,
        })
    }

    /// The restored snapshot has been applied and has settled.
    pub fn finish_restore(&mut self) {
        if self.mode == EditorMode::Restoring {
            tracing::debug!(index = ?self.cursor, "history restore settled");
        }
        self.mode = EditorMode::Idle;
    }

    /// The snapshot could not be applied: put the cursor back and release the guard.
    pub fn abort_restore(&mut self, restore: &Restore) {
        if restore.previous_index < self.snapshots.len() {
            self.cursor = Some(restore.previous_index);
        }
        self.mode = EditorMode::Idle;
    }

    /// Drop all snapshots and record `objects` as the initial state.
    pub fn reset(&mut self, objects: &[GraphicObject]) -> Result<(), MailcraftError> {
        self.snapshots.clear();
        self.cursor = None;
        self.mode = EditorMode::Idle;
        self.record(objects).map(|_| ())
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn is_restoring(&self) -> bool {
        self.mode == EditorMode::Restoring
    }

    /// The authoritative cursor. `None` only before the first record.
    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|c| self.snapshots.get(c))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.snapshots.len())
    }

    /// Oldest snapshot still in the log.
    pub fn oldest(&self) -> Option<&Snapshot> {
        self.snapshots.front()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_snapshot(&mut self, index: usize) {
        if let Some(s) = self.snapshots.get_mut(index) {
            s.objects = "{not json".into();
        }
    }

    #[cfg(test)]
    pub(crate) fn force_cursor(&mut self, index: usize) {
        self.cursor = Some(index);
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state(n: usize) -> Vec<GraphicObject> {
        (0..n)
            .map(|i| {
                let mut obj = GraphicObject::text(format!("item {}", i));
                obj.id = format!("obj-{}", i);
                obj
            })
            .collect()
    }

    fn apply(history: &mut HistoryManager, restore: Option<Restore>) -> Option<Vec<GraphicObject>> {
        let restore = restore?;
        let objects = restore.snapshot.decode().unwrap();
        history.finish_restore();
        Some(objects)
    }

    #[test]
    fn test_empty_history_is_noop() {
        let mut history = HistoryManager::default();
        assert!(history.undo().unwrap().is_none());
        assert!(history.redo().unwrap().is_none());
        assert_eq!(history.current_index(), None);
    }

    #[test]
    fn test_undo_redo_inverse() {
        let mut history = HistoryManager::default();
        for n in 0..=5 {
            history.record(&state(n)).unwrap();
        }
        let final_json = history.current().unwrap().objects.clone();

        for n in (0..5).rev() {
            let r = history.undo().unwrap();
            assert_eq!(apply(&mut history, r).unwrap(), state(n));
        }
        assert!(history.undo().unwrap().is_none());

        for _ in 0..5 {
            let r = history.redo().unwrap();
            apply(&mut history, r).unwrap();
        }
        assert!(history.redo().unwrap().is_none());
        assert_eq!(history.current().unwrap().objects, final_json);
    }

    #[test]
    fn test_truncation_after_undo() {
        let mut history = HistoryManager::default();
        for n in 0..4 {
            history.record(&state(n)).unwrap();
        }
        for _ in 0..2 {
            let r = history.undo().unwrap();
            apply(&mut history, r);
        }
        history.record(&state(9)).unwrap();
        assert!(history.redo().unwrap().is_none());
        assert_eq!(history.len(), 3);
        assert_eq!(history.current_index(), Some(2));
    }

    #[test]
    fn test_bounded_window() {
        let mut history = HistoryManager::new(100);
        for n in 0..150 {
            history.record(&state(n % 3)).unwrap();
        }
        assert_eq!(history.len(), 100);
        assert_eq!(history.current_index(), Some(99));
        assert_eq!(history.oldest().unwrap().step, 50);
        assert_eq!(history.current().unwrap().step, 149);
    }

    #[test]
    fn test_record_suppressed_while_restoring() {
        let mut history = HistoryManager::default();
        history.record(&state(0)).unwrap();
        history.record(&state(1)).unwrap();

        let restore = history.undo().unwrap().unwrap();
        assert!(history.is_restoring());
        assert_eq!(history.record(&state(7)).unwrap(), RecordOutcome::Suppressed);
        assert_eq!(history.len(), 2);

        assert_eq!(restore.snapshot.decode().unwrap(), state(0));
        history.finish_restore();
        assert_eq!(history.mode(), EditorMode::Idle);
        assert!(matches!(history.record(&state(2)).unwrap(), RecordOutcome::Recorded { index: 1 }));
    }

    #[test]
    fn test_abort_restore_restores_cursor() {
        let mut history = HistoryManager::default();
        history.record(&state(0)).unwrap();
        history.record(&state(1)).unwrap();
        history.corrupt_snapshot(0);

        let restore = history.undo().unwrap().unwrap();
        assert!(matches!(
            restore.snapshot.decode(),
            Err(MailcraftError::CorruptSnapshot { step: 0, .. })
        ));
        history.abort_restore(&restore);
        assert_eq!(history.current_index(), Some(1));
        assert!(!history.is_restoring());
    }

    #[test]
    fn test_missing_entry_is_error_not_panic() {
        let mut history = HistoryManager::default();
        history.record(&state(0)).unwrap();
        history.force_cursor(5);
        let err = history.undo().unwrap_err();
        assert!(matches!(err, MailcraftError::MissingHistoryEntry { index: 4, len: 1 }));
        assert!(!history.is_restoring());
    }

    #[test]
    fn test_steps_are_monotonic_after_truncation() {
        let mut history = HistoryManager::default();
        history.record(&state(0)).unwrap();
        history.record(&state(1)).unwrap();
        let r = history.undo().unwrap();
        apply(&mut history, r);
        history.record(&state(2)).unwrap();
        assert_eq!(history.current().unwrap().step, 2);
    }
}
