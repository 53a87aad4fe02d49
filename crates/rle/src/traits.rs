use std::fmt::Debug;

/// The number of logical child items a span covers.
pub trait HasLength {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Splitting behaviour for a span. Implementors only need `truncate_h`; `truncate` and
/// `truncate_keeping_right` are derived from it the same way on every span type.
pub trait SplitableSpanHelpers: Clone {
    /// Truncate `self` to the `[0, at)` prefix, returning the `[at, len)` suffix.
    ///
    /// `at` must strictly obey `0 < at < self.len()`.
    fn truncate_h(&mut self, at: usize) -> Self;

    /// The inverse: keep `[at, len)` in `self`, returning the `[0, at)` prefix.
    fn truncate_keeping_right_h(&mut self, at: usize) -> Self {
        let mut other = self.clone();
        *self = other.truncate_h(at);
        other
    }
}

/// Blanket helper so call sites can write `span.truncate(at)` regardless of which of the two
/// underlying primitives a type chose to implement directly.
pub trait SplitableSpan: HasLength + SplitableSpanHelpers {
    fn truncate(&mut self, at: usize) -> Self { self.truncate_h(at) }
    fn truncate_keeping_right(&mut self, at: usize) -> Self { self.truncate_keeping_right_h(at) }
}
impl<T: HasLength + SplitableSpanHelpers> SplitableSpan for T {}

/// See if `other` can be appended onto the end of `self`, and do so. `can_append` is always
/// called immediately before `append`.
pub trait MergableSpan {
    fn can_append(&self, other: &Self) -> bool;
    fn append(&mut self, other: Self);

    /// Append `self` onto the *start* of `other`. Implemented via `append` by default; span types
    /// with cheap prepend (e.g. reverse ranges) may override.
    fn prepend(&mut self, mut other: Self) where Self: Clone {
        other.append(self.clone());
        *self = other;
    }
}

/// A span keyed by a `usize` (an LV, a seq, ...) so a container can binary-search on it.
pub trait RleKeyed {
    fn rle_key(&self) -> usize;
}

/// A span that can report whether it contains a given logical item, and at what offset.
pub trait Searchable {
    type Item: Copy + Debug;
    fn get_offset(&self, loc: Self::Item) -> Option<usize>;
    fn at_offset(&self, offset: usize) -> Self::Item;
}
