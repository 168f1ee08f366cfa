/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::{FormatAspects, SubresourceRange};

use arrayvec::ArrayVec;
use smallvec::SmallVec;
use thiserror::Error;

use std::fmt::Debug;

/// Inclusive bounds on the subresource grid.
///
/// The x axis is the mip level, the y axis is the array layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RectBounds {
    pub min: [u32; 2],
    pub max: [u32; 2],
}

impl RectBounds {
    pub fn new(min: [u32; 2], max: [u32; 2]) -> Self {
        debug_assert!(min[0] <= max[0] && min[1] <= max[1]);
        Self { min, max }
    }

    /// Bounds of a non-empty subresource range.
    pub fn from_range(range: &SubresourceRange) -> Self {
        Self::new(
            [range.mip_levels.start, range.array_layers.start],
            [range.mip_levels.end - 1, range.array_layers.end - 1],
        )
    }

    pub fn to_range(&self, aspects: FormatAspects) -> SubresourceRange {
        SubresourceRange {
            aspects,
            mip_levels: self.min[0]..self.max[0] + 1,
            array_layers: self.min[1]..self.max[1] + 1,
        }
    }

    pub fn area(&self) -> u64 {
        (self.max[0] - self.min[0] + 1) as u64 * (self.max[1] - self.min[1] + 1) as u64
    }

    pub fn contains_cell(&self, x: u32, y: u32) -> bool {
        self.min[0] <= x && x <= self.max[0] && self.min[1] <= y && y <= self.max[1]
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min[0] <= other.max[0]
            && other.min[0] <= self.max[0]
            && self.min[1] <= other.max[1]
            && other.min[1] <= self.max[1]
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if self.intersects(other) {
            Some(Self {
                min: [self.min[0].max(other.min[0]), self.min[1].max(other.min[1])],
                max: [self.max[0].min(other.max[0]), self.max[1].min(other.max[1])],
            })
        } else {
            None
        }
    }

    /// Parts of `self` not covered by `hole`, in the order
    /// left, right, above, below.
    ///
    /// The left and right pieces span the full height of `self`,
    /// the others only the columns shared with `hole`.
    pub fn subtract(&self, hole: &Self) -> ArrayVec<Self, 4> {
        let mut pieces = ArrayVec::new();
        let clip = match self.intersection(hole) {
            Some(clip) => clip,
            None => {
                pieces.push(*self);
                return pieces;
            }
        };
        if self.min[0] < clip.min[0] {
            pieces.push(Self::new(self.min, [clip.min[0] - 1, self.max[1]]));
        }
        if clip.max[0] < self.max[0] {
            pieces.push(Self::new([clip.max[0] + 1, self.min[1]], self.max));
        }
        if self.min[1] < clip.min[1] {
            pieces.push(Self::new(
                [clip.min[0], self.min[1]],
                [clip.max[0], clip.min[1] - 1],
            ));
        }
        if clip.max[1] < self.max[1] {
            pieces.push(Self::new(
                [clip.min[0], clip.max[1] + 1],
                [clip.max[0], self.max[1]],
            ));
        }
        pieces
    }

    /// Union of two rectangles sharing an edge of the exact same length.
    pub fn merged(&self, other: &Self) -> Option<Self> {
        for axis in 0..2 {
            let other_axis = 1 - axis;
            if self.min[other_axis] != other.min[other_axis]
                || self.max[other_axis] != other.max[other_axis]
            {
                continue;
            }
            if self.max[axis] + 1 == other.min[axis] || other.max[axis] + 1 == self.min[axis] {
                let mut min = self.min;
                let mut max = self.max;
                min[axis] = self.min[axis].min(other.min[axis]);
                max[axis] = self.max[axis].max(other.max[axis]);
                return Some(Self { min, max });
            }
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateRect<S> {
    pub bounds: RectBounds,
    pub state: S,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum PartitionError {
    #[error("rectangle {0:?} lies outside of the grid")]
    OutOfBounds(RectBounds),
    #[error("rectangles {0:?} and {1:?} overlap")]
    Overlap(RectBounds, RectBounds),
    #[error("rectangles {0:?} and {1:?} have the same state and can be merged")]
    Mergeable(RectBounds, RectBounds),
    #[error("rectangles cover {covered} cells out of {expected}")]
    Coverage { covered: u64, expected: u64 },
}

/// Fixed-capacity slot storage for the live rectangles.
#[derive(Debug)]
struct RectPool<S> {
    slots: Vec<Option<StateRect<S>>>,
    free: Vec<usize>,
    live: usize,
}

impl<S> RectPool<S> {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free: (0..capacity).rev().collect(),
            live: 0,
        }
    }

    fn alloc(&mut self, rect: StateRect<S>) -> usize {
        let index = match self.free.pop() {
            Some(index) => index,
            None => panic!(
                "State rectangle pool exhausted ({} slots)",
                self.slots.len()
            ),
        };
        self.slots[index] = Some(rect);
        self.live += 1;
        index
    }

    fn release(&mut self, index: usize) -> Option<StateRect<S>> {
        let rect = self.slots[index].take()?;
        self.free.push(index);
        self.live -= 1;
        Some(rect)
    }

    fn get(&self, index: usize) -> Option<&StateRect<S>> {
        self.slots[index].as_ref()
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut StateRect<S>> {
        self.slots[index].as_mut()
    }

    fn iter(&self) -> impl Iterator<Item = (usize, &StateRect<S>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|rect| (index, rect)))
    }
}

/// Partition of a 2D subresource grid into rectangles of uniform state.
///
/// The live rectangles always cover the grid exactly once, and no two of
/// them could be merged into one. Their count can't exceed the number of
/// cells, which bounds the backing pool.
#[derive(Debug)]
pub struct RectTracker<S> {
    width: u32,
    height: u32,
    pool: RectPool<S>,
}

impl<S: Copy + PartialEq + Debug> RectTracker<S> {
    pub fn new(width: u32, height: u32, initial: S) -> Self {
        assert!(width != 0 && height != 0, "Empty subresource grid");
        let mut pool = RectPool::new((width * height) as usize + 1);
        pool.alloc(StateRect {
            bounds: RectBounds::new([0, 0], [width - 1, height - 1]),
            state: initial,
        });
        Self {
            width,
            height,
            pool,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn full_bounds(&self) -> RectBounds {
        RectBounds::new([0, 0], [self.width - 1, self.height - 1])
    }

    /// Number of live rectangles.
    pub fn len(&self) -> usize {
        self.pool.live
    }

    pub fn is_empty(&self) -> bool {
        self.pool.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateRect<S>> {
        self.pool.iter().map(|(_, rect)| rect)
    }

    /// State of the region, if it is uniform.
    pub fn query(&self, bounds: &RectBounds) -> Option<S> {
        let mut states = self
            .iter()
            .filter(|rect| rect.bounds.intersects(bounds))
            .map(|rect| rect.state);
        let first = states.next()?;
        if states.all(|state| state == first) {
            Some(first)
        } else {
            None
        }
    }

    /// State of a single cell.
    pub fn state_at(&self, x: u32, y: u32) -> Option<S> {
        self.iter()
            .find(|rect| rect.bounds.contains_cell(x, y))
            .map(|rect| rect.state)
    }

    /// Sets the state of every cell in `bounds`.
    ///
    /// `on_intersection` is called with every clipped region that changes
    /// hands, together with its prior state. Bounds are clipped to the grid.
    pub fn transition(
        &mut self,
        bounds: RectBounds,
        state: S,
        mut on_intersection: impl FnMut(RectBounds, S),
    ) {
        let bounds = match bounds.intersection(&self.full_bounds()) {
            Some(bounds) => bounds,
            None => return,
        };

        let intersecting = self
            .pool
            .iter()
            .filter(|&(_, rect)| rect.bounds.intersects(&bounds))
            .map(|(index, _)| index)
            .collect::<SmallVec<[usize; 8]>>();

        let mut changed = SmallVec::<[usize; 8]>::new();
        for index in intersecting {
            let rect = match self.pool.get(index) {
                Some(rect) => *rect,
                None => continue,
            };
            if let Some(overlap) = rect.bounds.intersection(&bounds) {
                on_intersection(overlap, rect.state);
            }

            if rect.bounds == bounds {
                if let Some(congruent) = self.pool.get_mut(index) {
                    congruent.state = state;
                }
                self.merge_all(changed.into_iter().chain(Some(index)).collect());
                return;
            }

            self.pool.release(index);
            for piece in rect.bounds.subtract(&bounds) {
                changed.push(self.pool.alloc(StateRect {
                    bounds: piece,
                    state: rect.state,
                }));
            }
        }

        changed.push(self.pool.alloc(StateRect { bounds, state }));
        self.merge_all(changed);
    }

    /// Merges the given rectangles with their neighbours until
    /// no more merges are possible.
    fn merge_all(&mut self, mut worklist: SmallVec<[usize; 8]>) {
        while let Some(index) = worklist.pop() {
            let rect = match self.pool.get(index) {
                Some(rect) => *rect,
                None => continue,
            };
            let candidate = self.pool.iter().find_map(|(other_index, other)| {
                if other_index == index || other.state != rect.state {
                    return None;
                }
                rect.bounds
                    .merged(&other.bounds)
                    .map(|merged| (other_index, merged))
            });
            if let Some((other_index, merged)) = candidate {
                self.pool.release(other_index);
                if let Some(target) = self.pool.get_mut(index) {
                    target.bounds = merged;
                }
                worklist.push(index);
            }
        }
    }

    /// Validates that the rectangles partition the grid and none
    /// of them can be merged.
    pub fn check_partition(&self) -> Result<(), PartitionError> {
        let full = self.full_bounds();
        let mut covered = 0;
        for (index, rect) in self.pool.iter() {
            if full.intersection(&rect.bounds) != Some(rect.bounds) {
                return Err(PartitionError::OutOfBounds(rect.bounds));
            }
            covered += rect.bounds.area();
            for (other_index, other) in self.pool.iter() {
                if other_index <= index {
                    continue;
                }
                if rect.bounds.intersects(&other.bounds) {
                    return Err(PartitionError::Overlap(rect.bounds, other.bounds));
                }
                if rect.state == other.state && rect.bounds.merged(&other.bounds).is_some() {
                    return Err(PartitionError::Mergeable(rect.bounds, other.bounds));
                }
            }
        }
        let expected = full.area();
        if covered != expected {
            return Err(PartitionError::Coverage { covered, expected });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum S {
        U,
        S1,
        S2,
        S3,
    }

    fn rect(min: [u32; 2], max: [u32; 2]) -> RectBounds {
        RectBounds::new(min, max)
    }

    fn grid(tracker: &RectTracker<S>) -> Vec<Vec<S>> {
        (0..tracker.height())
            .map(|y| {
                (0..tracker.width())
                    .map(|x| tracker.state_at(x, y).unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn subtract_order() {
        let outer = rect([0, 0], [4, 4]);
        let pieces = outer.subtract(&rect([1, 1], [2, 3]));
        assert_eq!(
            pieces.as_slice(),
            &[
                rect([0, 0], [0, 4]),
                rect([3, 0], [4, 4]),
                rect([1, 0], [2, 0]),
                rect([1, 4], [2, 4]),
            ]
        );
        let area: u64 = pieces.iter().map(RectBounds::area).sum();
        assert_eq!(area, outer.area() - 6);
    }

    #[test]
    fn merge_requires_matching_edges() {
        let a = rect([0, 0], [1, 1]);
        assert_eq!(a.merged(&rect([2, 0], [3, 1])), Some(rect([0, 0], [3, 1])));
        assert_eq!(a.merged(&rect([0, 2], [1, 2])), Some(rect([0, 0], [1, 2])));
        assert_eq!(a.merged(&rect([2, 0], [3, 2])), None);
        assert_eq!(a.merged(&rect([3, 0], [3, 1])), None);
    }

    #[test]
    fn two_transitions() {
        let mut tracker = RectTracker::new(4, 4, S::U);
        let mut seen = Vec::new();
        tracker.transition(rect([0, 0], [3, 1]), S::S1, |r, s| seen.push((r, s)));
        assert_eq!(seen, [(rect([0, 0], [3, 1]), S::U)]);
        seen.clear();

        tracker.transition(rect([0, 0], [1, 3]), S::S2, |r, s| seen.push((r, s)));
        seen.sort_by_key(|&(r, _)| r.min);
        assert_eq!(
            seen,
            [
                (rect([0, 0], [1, 1]), S::S1),
                (rect([0, 2], [1, 3]), S::U),
            ]
        );

        use S::*;
        assert_eq!(
            grid(&tracker),
            vec![
                vec![S2, S2, S1, S1],
                vec![S2, S2, S1, S1],
                vec![S2, S2, U, U],
                vec![S2, S2, U, U],
            ]
        );
        // the S2 column is a single rectangle
        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.query(&rect([0, 0], [1, 3])), Some(S2));
        assert_eq!(tracker.query(&rect([2, 0], [3, 1])), Some(S1));
        assert_eq!(tracker.query(&rect([2, 2], [3, 3])), Some(U));
        assert_eq!(tracker.query(&rect([1, 1], [2, 2])), None);
        tracker.check_partition().unwrap();
    }

    #[test]
    fn congruent_overwrite() {
        let mut tracker = RectTracker::new(2, 3, S::U);
        tracker.transition(rect([0, 0], [0, 2]), S::S1, |_, _| {});
        assert_eq!(tracker.len(), 2);
        let mut calls = 0;
        tracker.transition(rect([0, 0], [0, 2]), S::S3, |r, s| {
            calls += 1;
            assert_eq!((r, s), (rect([0, 0], [0, 2]), S::S1));
        });
        assert_eq!(calls, 1);
        assert_eq!(tracker.len(), 2);

        // setting the same state as the neighbour collapses the grid
        tracker.transition(rect([0, 0], [0, 2]), S::U, |_, _| {});
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.query(&tracker.full_bounds()), Some(S::U));
    }

    #[test]
    fn full_cover_resets() {
        let mut tracker = RectTracker::new(3, 3, S::U);
        tracker.transition(rect([1, 1], [1, 1]), S::S1, |_, _| {});
        assert_eq!(tracker.len(), 5);
        tracker.check_partition().unwrap();
        let mut regions = 0;
        tracker.transition(tracker.full_bounds(), S::S2, |_, _| regions += 1);
        assert_eq!(regions, 5);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn bounds_are_clipped() {
        let mut tracker = RectTracker::new(2, 2, S::U);
        tracker.transition(rect([1, 1], [5, 5]), S::S1, |r, _| {
            assert_eq!(r, rect([1, 1], [1, 1]));
        });
        assert_eq!(tracker.state_at(1, 1), Some(S::S1));
        tracker.transition(rect([4, 4], [5, 5]), S::S2, |_, _| panic!("outside"));
        tracker.check_partition().unwrap();
    }

    #[test]
    fn random_transitions_keep_partition() {
        // xorshift, fixed seed
        let mut seed = 0x2545_f491_u32;
        let mut next = move |bound: u32| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed % bound
        };
        let states = [S::U, S::S1, S::S2, S::S3];
        let (width, height) = (5, 7);
        let mut tracker = RectTracker::new(width, height, S::U);
        let mut cells = vec![S::U; (width * height) as usize];

        for _ in 0..500 {
            let (x0, x1) = (next(width), next(width));
            let (y0, y1) = (next(height), next(height));
            let bounds = rect([x0.min(x1), y0.min(y1)], [x0.max(x1), y0.max(y1)]);
            let state = states[next(4) as usize];

            let mut overlap_area = 0;
            tracker.transition(bounds, state, |r, _| overlap_area += r.area());
            assert_eq!(overlap_area, bounds.area());

            for y in bounds.min[1]..=bounds.max[1] {
                for x in bounds.min[0]..=bounds.max[0] {
                    cells[(y * width + x) as usize] = state;
                }
            }
            tracker.check_partition().unwrap();
            assert!(tracker.len() <= (width * height) as usize);
            for y in 0..height {
                for x in 0..width {
                    assert_eq!(tracker.state_at(x, y), Some(cells[(y * width + x) as usize]));
                }
            }
        }
    }

    #[test]
    #[should_panic(expected = "pool exhausted")]
    fn pool_exhaustion_is_fatal() {
        let mut pool = RectPool::new(2);
        for _ in 0..3 {
            pool.alloc(StateRect {
                bounds: rect([0, 0], [0, 0]),
                state: S::U,
            });
        }
    }
}
