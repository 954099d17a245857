//! Notehead highlighting for the committed cursor position

use crate::surface::RenderSurface;
use crate::timeline::Pointer;
use crate::types::NoteheadId;

/// A reversible recolor of the noteheads under one pointer
///
/// The cursor keeps the last performed operation in its snapshot and
/// restores it before performing the next one, so at most one position is
/// highlighted at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct ColoringOperation {
    noteheads: Vec<NoteheadId>,
    color: String,
}

impl ColoringOperation {
    pub fn new(noteheads: Vec<NoteheadId>, color: impl Into<String>) -> Self {
        Self {
            noteheads,
            color: color.into(),
        }
    }

    /// Every notehead of every voice entry starting at `pointer`
    pub fn for_pointer(pointer: &Pointer, color: impl Into<String>) -> Self {
        let noteheads = pointer
            .entries
            .iter()
            .flat_map(|entry| entry.noteheads.iter().copied())
            .collect();
        Self::new(noteheads, color)
    }

    pub fn noteheads(&self) -> &[NoteheadId] {
        &self.noteheads
    }

    pub fn perform(&self, surface: &dyn RenderSurface) {
        for id in &self.noteheads {
            surface.set_notehead_color(*id, Some(&self.color));
        }
    }

    pub fn restore(&self, surface: &dyn RenderSurface) {
        for id in &self.noteheads {
            surface.set_notehead_color(*id, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessLayout, HeadlessSurface};

    #[test]
    fn test_perform_and_restore() {
        let surface = HeadlessSurface::new(HeadlessLayout::default());
        let op = ColoringOperation::new(vec![NoteheadId(3), NoteheadId(4)], "#00ffd9");

        op.perform(&surface);
        assert_eq!(surface.notehead_color(NoteheadId(3)).as_deref(), Some("#00ffd9"));
        assert_eq!(surface.colored_noteheads().len(), 2);

        op.restore(&surface);
        assert!(surface.colored_noteheads().is_empty());
    }
}
