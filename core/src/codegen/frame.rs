use crate::lambda::{Capture, VarCell};
use crate::val::Val;

/// Slot kinds of one function frame, fixed at compile time. Variables some
/// closure captures by reference live in cells; everything else is a plain
/// value.
#[derive(Debug, Clone, Default)]
pub(super) struct FrameLayout {
    cells: Box<[bool]>,
}

impl FrameLayout {
    pub(super) fn new(cells: Vec<bool>) -> Self {
        Self { cells: cells.into() }
    }

    #[inline]
    pub(super) fn len(&self) -> usize {
        self.cells.len()
    }

    /// Fresh frame: values start as null, cells are new and unshared.
    pub(super) fn frame(&self) -> Frame {
        let slots = self
            .cells
            .iter()
            .map(|&cell| {
                if cell {
                    Slot::Cell(VarCell::default())
                } else {
                    Slot::Value(Val::Null)
                }
            })
            .collect();
        Frame { slots }
    }
}

enum Slot {
    Value(Val),
    Cell(VarCell),
}

pub(super) struct Frame {
    slots: Vec<Slot>,
}

impl Frame {
    #[inline]
    pub(super) fn get(&self, slot: usize) -> Val {
        match self.slots.get(slot) {
            Some(Slot::Value(v)) => v.clone(),
            Some(Slot::Cell(cell)) => cell.get(),
            None => Val::Null,
        }
    }

    #[inline]
    pub(super) fn set(&mut self, slot: usize, val: Val) {
        match self.slots.get_mut(slot) {
            Some(Slot::Value(v)) => *v = val,
            Some(Slot::Cell(cell)) => cell.set(val),
            None => {}
        }
    }

    /// Gives a cell slot a new, unshared cell; closures holding the old one
    /// keep it.
    pub(super) fn renew(&mut self, slot: usize) {
        if let Some(Slot::Cell(cell)) = self.slots.get_mut(slot) {
            *cell = VarCell::default();
        }
    }

    /// The cell behind `slot`, shared with the caller.
    pub(super) fn cell(&self, slot: usize) -> Option<VarCell> {
        match self.slots.get(slot) {
            Some(Slot::Cell(cell)) => Some(cell.clone()),
            _ => None,
        }
    }

    /// Installs a closure capture: cells replace the slot so writes are
    /// shared, values are copied in.
    pub(super) fn bind(&mut self, slot: usize, capture: &Capture) {
        match capture {
            Capture::Cell(cell) => {
                if let Some(target) = self.slots.get_mut(slot) {
                    *target = Slot::Cell(cell.clone());
                }
            }
            Capture::Value(v) => self.set(slot, v.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_are_fresh_per_frame() {
        let layout = FrameLayout::new(vec![false, true]);
        let mut a = layout.frame();
        let b = layout.frame();
        a.set(1, Val::Int(3));
        assert_eq!(a.get(1), Val::Int(3));
        assert_eq!(b.get(1), Val::Null);
        assert!(a.cell(0).is_none());
        assert!(!a.cell(1).unwrap().ptr_eq(&b.cell(1).unwrap()));
    }

    #[test]
    fn bound_cells_are_shared() {
        let layout = FrameLayout::new(vec![true, false]);
        let shared = VarCell::new(Val::Int(1));
        let mut frame = layout.frame();
        frame.bind(0, &Capture::Cell(shared.clone()));
        frame.bind(1, &Capture::Value(Val::from("v")));
        frame.set(0, Val::Int(2));
        assert_eq!(shared.get(), Val::Int(2));
        assert_eq!(frame.get(1), Val::from("v"));
    }

    #[test]
    fn renewed_cells_detach_earlier_holders() {
        let layout = FrameLayout::new(vec![true, false]);
        let mut frame = layout.frame();
        frame.set(0, Val::Int(1));
        let held = frame.cell(0).unwrap();
        frame.renew(0);
        frame.set(0, Val::Int(2));
        frame.renew(1);
        assert_eq!(held.get(), Val::Int(1));
        assert_eq!(frame.get(0), Val::Int(2));
        assert!(frame.cell(1).is_none());
    }
}
