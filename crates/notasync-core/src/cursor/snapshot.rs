use std::rc::Rc;

use crate::timeline::Pointer;

use super::coloring::ColoringOperation;

/// The pointer a cursor last committed to, with the highlight it applied
#[derive(Debug, Clone)]
pub struct CursorSnapshot {
    pub pointer: Rc<Pointer>,
    pub coloring: Option<ColoringOperation>,
}

impl CursorSnapshot {
    pub fn new(pointer: Rc<Pointer>, coloring: Option<ColoringOperation>) -> Self {
        Self { pointer, coloring }
    }

    pub fn index(&self) -> usize {
        self.pointer.index
    }

    pub fn measure_index(&self) -> usize {
        self.pointer.measure_index
    }

    pub fn measure_line(&self) -> usize {
        self.pointer.measure_line
    }
}
