//! Small, dependency-light helpers for run-length encoded lists.
//!
//! Nothing in here is specific to any one RLE schema - `HasLength` / `MergableSpan` describe the
//! append predicate, `SplitableSpanHelpers` describes the split predicate, and `Searchable` /
//! `RleKeyed` let a generic container binary-search by key or by contained item.

pub use append_rle::AppendRle;
pub use merge_iter::*;
pub use rle_vec::{KVPair, RleVec};
pub use traits::*;

mod append_rle;
mod merge_iter;
mod rle_vec;
mod traits;
