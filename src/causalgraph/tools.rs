//! The three priority-queue frontier walks: `diff`, `findDominators` and `findConflicting`
//! (spec 4.2). All three share the same shape: a max-heap of LVs tagged with which side(s)
//! reached them, walked backward through `parents` until the queue is exhausted.
//!
//! These call sites only ever pass frontiers (heads, `curVersion`, `branch.version`) as input,
//! and frontier members are always an entry's final LV by construction - so unlike a fully
//! general interior-clipping walk, a popped LV is always `entry.range.last()`. That lets these
//! three functions mark or walk a whole entry at a time instead of tracking sub-entry splits.

use std::collections::{BinaryHeap, HashMap, HashSet};

use rle::AppendRle;

use super::CausalGraph;
use crate::frontier::sort_frontier;
use crate::lvrange::LVRange;
use crate::{Frontier, LV};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffFlag {
    OnlyA,
    OnlyB,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag { A, B, Shared }

fn enqueue(heap: &mut BinaryHeap<LV>, flags: &mut HashMap<LV, Flag>, v: LV, flag: Flag) -> Option<LV> {
    match flags.get(&v).copied() {
        None => {
            flags.insert(v, flag);
            heap.push(v);
            None
        }
        Some(Flag::Shared) => None,
        Some(existing) if existing != flag => {
            flags.insert(v, Flag::Shared);
            Some(v)
        }
        Some(_) => None,
    }
}

fn merge_ranges(mut ranges: Vec<LVRange>) -> Vec<LVRange> {
    ranges.sort_unstable_by_key(|r| r.start);
    let mut out: Vec<LVRange> = Vec::with_capacity(ranges.len());
    for r in ranges {
        out.push_rle(r);
    }
    out
}

pub(super) fn diff(cg: &CausalGraph, a: &[LV], b: &[LV]) -> (Vec<LVRange>, Vec<LVRange>) {
    let mut flags: HashMap<LV, Flag> = HashMap::new();
    let mut heap: BinaryHeap<LV> = BinaryHeap::new();

    for &v in a { enqueue(&mut heap, &mut flags, v, Flag::A); }
    for &v in b { enqueue(&mut heap, &mut flags, v, Flag::B); }

    let mut a_only = Vec::new();
    let mut b_only = Vec::new();

    while let Some(v) = heap.pop() {
        let flag = flags[&v];
        if flag == Flag::Shared {
            continue;
        }
        let entry = cg.entry_containing(v).expect("frontier LV must be known to this graph");
        debug_assert_eq!(v, entry.range.last());

        match flag {
            Flag::A => a_only.push(entry.range),
            Flag::B => b_only.push(entry.range),
            Flag::Shared => unreachable!(),
        }

        for &p in entry.parents.iter() {
            enqueue(&mut heap, &mut flags, p, flag);
        }
    }

    (merge_ranges(a_only), merge_ranges(b_only))
}

pub(super) fn find_dominators(cg: &CausalGraph, versions: &[LV]) -> Frontier {
    let mut uniq: Vec<LV> = versions.to_vec();
    uniq.sort_unstable();
    uniq.dedup();

    if uniq.len() <= 1 {
        return uniq.into_iter().collect();
    }

    // Bit-pack (version, isInput) as `version*2 + (isInput ? 0 : 1)` so a "derived" (walked-to)
    // token always outranks an "input" token at the same version - meaning if some higher input
    // walks down and reaches a version already present in `versions`, that reaches it strictly
    // before the input token for that same version is processed (spec 4.2 "Dominators").
    let mut heap: BinaryHeap<usize> = BinaryHeap::new();
    for &v in &uniq {
        heap.push(v * 2);
    }

    let mut visited: HashSet<LV> = HashSet::new();
    let mut remaining_inputs = uniq.len();
    let mut result = Vec::new();

    while remaining_inputs > 0 {
        let key = heap.pop().expect("heap exhausted before all inputs were resolved");
        let v = key / 2;
        let is_input = key % 2 == 0;

        if visited.contains(&v) {
            if is_input {
                remaining_inputs -= 1;
            }
            continue;
        }
        visited.insert(v);

        if is_input {
            result.push(v);
            remaining_inputs -= 1;
        }

        let entry = cg.entry_containing(v).expect("version must be known to this graph");
        if v > entry.range.start {
            heap.push((v - 1) * 2 + 1);
        } else {
            for &p in entry.parents.iter() {
                heap.push(p * 2 + 1);
            }
        }
    }

    let mut f: Frontier = result.into_iter().collect();
    sort_frontier(&mut f);
    f
}

pub(super) fn find_conflicting<F: FnMut(LVRange, DiffFlag)>(
    cg: &CausalGraph,
    a: &[LV],
    b: &[LV],
    mut visit: F,
) -> Frontier {
    let mut flags: HashMap<LV, Flag> = HashMap::new();
    let mut heap: BinaryHeap<LV> = BinaryHeap::new();
    let mut common_ancestor: Vec<LV> = Vec::new();

    for &v in a {
        if let Some(shared_at) = enqueue(&mut heap, &mut flags, v, Flag::A) {
            common_ancestor.push(shared_at);
        }
    }
    for &v in b {
        if let Some(shared_at) = enqueue(&mut heap, &mut flags, v, Flag::B) {
            common_ancestor.push(shared_at);
        }
    }

    while let Some(v) = heap.pop() {
        let flag = flags[&v];
        if flag == Flag::Shared {
            continue;
        }
        let entry = cg.entry_containing(v).expect("frontier LV must be known to this graph");
        debug_assert_eq!(v, entry.range.last());

        let diff_flag = match flag {
            Flag::A => DiffFlag::OnlyA,
            Flag::B => DiffFlag::OnlyB,
            Flag::Shared => unreachable!(),
        };
        visit(entry.range, diff_flag);

        for &p in entry.parents.iter() {
            if let Some(shared_at) = enqueue(&mut heap, &mut flags, p, flag) {
                common_ancestor.push(shared_at);
            }
        }
    }

    if common_ancestor.is_empty() {
        Frontier::new()
    } else {
        find_dominators(cg, &common_ancestor)
    }
}
