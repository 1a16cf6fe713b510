//! The seam to whatever draws the maze.
//!
//! Every call happens on the owning thread. Edits only ever target cells the presentation
//! layer has been told about: a cell is removed only after it was created, and created at most
//! once while shown.

use std::fmt::Write;

use crate::cells::Cartesian2DCoordinate;
use crate::completion::StreamKind;
use crate::grid_dimensions::GridDimensions;
use crate::utils::{self, FnvHashSet};

pub trait Presentation {
    fn on_cell_created(&mut self, kind: StreamKind, cell: Cartesian2DCoordinate);

    fn on_cell_removed(&mut self, kind: StreamKind, cell: Cartesian2DCoordinate);

    fn on_stream_complete(&mut self, _kind: StreamKind) {}

    fn on_stream_error(&mut self, _kind: StreamKind, _message: &str) {}
}

/// A presentation that just remembers what is on screen.
#[derive(Debug, Clone)]
pub struct PresentedCells {
    walls: FnvHashSet<Cartesian2DCoordinate>,
    visited: FnvHashSet<Cartesian2DCoordinate>,
    completed: Vec<StreamKind>,
    errors: Vec<(StreamKind, String)>,
    created: usize,
    removed: usize,
}

impl Default for PresentedCells {
    fn default() -> PresentedCells {
        PresentedCells {
            walls: utils::fnv_hashset(256),
            visited: utils::fnv_hashset(256),
            completed: Vec::new(),
            errors: Vec::new(),
            created: 0,
            removed: 0,
        }
    }
}

impl PresentedCells {
    pub fn new() -> PresentedCells {
        PresentedCells::default()
    }

    pub fn cells(&self, kind: StreamKind) -> &FnvHashSet<Cartesian2DCoordinate> {
        match kind {
            StreamKind::Generation => &self.walls,
            StreamKind::Search => &self.visited,
        }
    }

    fn cells_mut(&mut self, kind: StreamKind) -> &mut FnvHashSet<Cartesian2DCoordinate> {
        match kind {
            StreamKind::Generation => &mut self.walls,
            StreamKind::Search => &mut self.visited,
        }
    }

    pub fn completed(&self) -> &[StreamKind] {
        &self.completed
    }

    pub fn errors(&self) -> &[(StreamKind, String)] {
        &self.errors
    }

    /// Total creations and removals seen.
    pub fn edit_counts(&self) -> (usize, usize) {
        (self.created, self.removed)
    }

    /// `#` for walls, `*` for visited cells, `S`/`E` for marked endpoints.
    pub fn render(&self,
                  dimensions: GridDimensions,
                  endpoints: Option<(Cartesian2DCoordinate, Cartesian2DCoordinate)>)
                  -> String {
        let mut out = String::with_capacity((dimensions.length() + 1) * dimensions.width());
        for coord in dimensions.iter() {
            let glyph = match endpoints {
                Some((start, _)) if start == coord => 'S',
                Some((_, end)) if end == coord => 'E',
                _ if self.walls.contains(&coord) => '#',
                _ if self.visited.contains(&coord) => '*',
                _ => ' ',
            };
            out.push(glyph);
            if coord.x as usize + 1 == dimensions.length() {
                let _ = writeln!(out);
            }
        }
        out
    }
}

impl Presentation for PresentedCells {
    fn on_cell_created(&mut self, kind: StreamKind, cell: Cartesian2DCoordinate) {
        if !self.cells_mut(kind).insert(cell) {
            warn!("{} cell {} created twice", kind, cell);
        }
        self.created += 1;
    }

    fn on_cell_removed(&mut self, kind: StreamKind, cell: Cartesian2DCoordinate) {
        if !self.cells_mut(kind).remove(&cell) {
            warn!("{} cell {} removed while not shown", kind, cell);
        }
        self.removed += 1;
    }

    fn on_stream_complete(&mut self, kind: StreamKind) {
        self.completed.push(kind);
    }

    fn on_stream_error(&mut self, kind: StreamKind, message: &str) {
        self.errors.push((kind, message.to_string()));
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::units::{ColumnLength, RowLength};

    #[test]
    fn rendering_marks_each_kind() {
        let dims = GridDimensions::new(RowLength(3), ColumnLength(2)).unwrap();
        let gc = |x, y| Cartesian2DCoordinate::new(x, y);
        let mut shown = PresentedCells::new();
        shown.on_cell_created(StreamKind::Generation, gc(0, 0));
        shown.on_cell_created(StreamKind::Search, gc(1, 0));
        shown.on_cell_created(StreamKind::Generation, gc(2, 1));
        assert_eq!(shown.render(dims, None), "#* \n  #\n");
        assert_eq!(shown.render(dims, Some((gc(1, 0), gc(0, 1)))), "#S \nE #\n");

        shown.on_cell_removed(StreamKind::Generation, gc(2, 1));
        assert_eq!(shown.cells(StreamKind::Generation).len(), 1);
        assert_eq!(shown.edit_counts(), (3, 1));
    }
}
