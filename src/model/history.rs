//! Undo/redo delta log for ROI set edits

use super::roi::Roi;

/// One reversible change to a ROI set
///
/// `index` is the position in the set's creation-ordered list at the time
/// of the edit, so a delete followed by undo restores the original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Create { index: usize, roi: Roi },
    Delete { index: usize, roi: Roi },
    Modify { index: usize, before: Roi, after: Roi },
}

/// Append-only edit stack with a redo tail
#[derive(Debug, Clone, Default)]
pub struct EditLog {
    done: Vec<Edit>,
    undone: Vec<Edit>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new edit; the redo stack is discarded
    pub fn record(&mut self, edit: Edit) {
        self.done.push(edit);
        self.undone.clear();
    }

    /// Pop the latest edit to undo and remember it for redo
    pub(crate) fn take_undo(&mut self) -> Option<Edit> {
        let edit = self.done.pop()?;
        self.undone.push(edit.clone());
        Some(edit)
    }

    /// Pop the latest undone edit to replay
    pub(crate) fn take_redo(&mut self) -> Option<Edit> {
        let edit = self.undone.pop()?;
        self.done.push(edit.clone());
        Some(edit)
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Number of edits that can currently be undone
    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }
}
