use rle::{HasLength, MergableSpan, RleKeyed, Searchable, SplitableSpanHelpers};

use crate::LV;

/// A half-open `[start, end)` range of local versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LVRange {
    pub start: LV,
    pub end: LV,
}

impl LVRange {
    pub const fn new(start: LV, end: LV) -> Self { Self { start, end } }

    pub fn last(&self) -> LV {
        debug_assert!(self.end > self.start);
        self.end - 1
    }

    pub fn contains(&self, v: LV) -> bool { v >= self.start && v < self.end }
}

impl From<(LV, LV)> for LVRange {
    fn from((start, end): (LV, LV)) -> Self { LVRange { start, end } }
}

impl HasLength for LVRange {
    fn len(&self) -> usize { self.end - self.start }
}

impl SplitableSpanHelpers for LVRange {
    fn truncate_h(&mut self, at: usize) -> Self {
        let mid = self.start + at;
        let rest = LVRange::new(mid, self.end);
        self.end = mid;
        rest
    }
}

impl MergableSpan for LVRange {
    fn can_append(&self, other: &Self) -> bool { self.end == other.start }
    fn append(&mut self, other: Self) { self.end = other.end; }
}

impl RleKeyed for LVRange {
    fn rle_key(&self) -> usize { self.start }
}

impl Searchable for LVRange {
    type Item = LV;
    fn get_offset(&self, loc: LV) -> Option<usize> {
        if self.contains(loc) { Some(loc - self.start) } else { None }
    }
    fn at_offset(&self, offset: usize) -> LV { self.start + offset }
}

/// Placeholder LVs used by [`crate::branch::merge_changes_into_branch`] are drawn from this
/// reserved range, which real LVs can never reach in practice - a document would need to grow to
/// a quarter of `usize::MAX` operations to collide with it.
pub const UNDERWATER_START: LV = usize::MAX / 4;
