/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::{cmp::Ordering, fmt, hash, marker::PhantomData, num::NonZeroU32, ops};

/// An unique index in the arena that a handle points to.
/// The "non-zero" part ensures that an `Option<Handle<T>>` has
/// the same size and representation as `Handle<T>`.
type Index = NonZeroU32;

/// A strongly typed reference to an arena slot.
pub struct Handle<T> {
    index: Index,
    marker: PhantomData<T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Handle {
            index: self.index,
            marker: self.marker,
        }
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl<T> Eq for Handle<T> {}
impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.index.partial_cmp(&other.index)
    }
}
impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}
impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "Handle({})", self.index)
    }
}
impl<T> hash::Hash for Handle<T> {
    fn hash<H: hash::Hasher>(&self, hasher: &mut H) {
        self.index.hash(hasher)
    }
}

impl<T> Handle<T> {
    fn from_position(position: usize) -> Self {
        let index = unsafe { Index::new_unchecked(position as u32 + 1) };
        Handle {
            index,
            marker: PhantomData,
        }
    }

    /// Returns the zero-based index of this handle.
    pub fn index(self) -> usize {
        let index = self.index.get() - 1;
        index as usize
    }
}

/// A bump arena carved into fixed-capacity chunks.
///
/// Items are never removed one by one. [`Arena::clear`] drops every item
/// at once but keeps the chunk allocations around, so an arena that is
/// cleared and refilled with the same number of items never allocates again.
/// Chunks never reallocate, which keeps their items at a stable address
/// while the arena grows.
#[derive(Debug)]
pub struct Arena<T> {
    chunks: Vec<Vec<T>>,
    chunk_capacity: usize,
    /// Chunk currently being filled.
    current: usize,
    len: usize,
}

impl<T> Arena<T> {
    /// Create a new arena. No chunk is allocated until the first append.
    pub fn new(chunk_capacity: usize) -> Self {
        assert_ne!(chunk_capacity, 0, "Arena chunks can't be empty");
        Arena {
            chunks: Vec::new(),
            chunk_capacity,
            current: 0,
            len: 0,
        }
    }

    /// Returns the current number of items stored in this arena.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the arena contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks allocated so far, including the empty ones.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Adds a new value to the arena, returning a typed handle.
    ///
    /// When the current chunk is full, the next one is reused
    /// or a fresh one is allocated.
    pub fn append(&mut self, value: T) -> Handle<T> {
        if self.chunks.is_empty() {
            self.chunks.push(Vec::with_capacity(self.chunk_capacity));
        }
        if self.chunks[self.current].len() == self.chunk_capacity {
            self.current += 1;
            if self.current == self.chunks.len() {
                log::trace!("Allocating arena chunk {}", self.current);
                self.chunks.push(Vec::with_capacity(self.chunk_capacity));
            }
        }
        let chunk = &mut self.chunks[self.current];
        let position = self.current * self.chunk_capacity + chunk.len();
        chunk.push(value);
        self.len += 1;
        Handle::from_position(position)
    }

    /// Drops all the items, keeping the chunk memory for reuse.
    ///
    /// Handles issued before the call are invalidated.
    pub fn clear(&mut self) {
        for chunk in self.chunks.iter_mut() {
            chunk.clear();
        }
        self.current = 0;
        self.len = 0;
    }

    /// Get a mutable reference to an element in the arena.
    pub fn get_mut(&mut self, handle: Handle<T>) -> &mut T {
        let index = handle.index();
        &mut self.chunks[index / self.chunk_capacity][index % self.chunk_capacity]
    }

    /// Returns an iterator over the items in insertion order, with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        let capacity = self.chunk_capacity;
        self.chunks.iter().enumerate().flat_map(move |(c, chunk)| {
            chunk
                .iter()
                .enumerate()
                .map(move |(i, v)| (Handle::from_position(c * capacity + i), v))
        })
    }
}

impl<T> ops::Index<Handle<T>> for Arena<T> {
    type Output = T;
    fn index(&self, handle: Handle<T>) -> &T {
        let index = handle.index();
        &self.chunks[index / self.chunk_capacity][index % self.chunk_capacity]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_rolls_over() {
        let mut arena = Arena::new(2);
        let handles = (0..5).map(|i| arena.append(i)).collect::<Vec<_>>();
        assert_eq!(arena.len(), 5);
        assert_eq!(arena.chunk_count(), 3);
        for (i, &handle) in handles.iter().enumerate() {
            assert_eq!(arena[handle], i);
        }
        let collected = arena.iter().map(|(_, &v)| v).collect::<Vec<_>>();
        assert_eq!(collected, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn clear_reuses_chunks() {
        let mut arena = Arena::new(3);
        for i in 0..7 {
            arena.append(i);
        }
        assert_eq!(arena.chunk_count(), 3);
        arena.clear();
        assert!(arena.is_empty());
        let first = arena.append(10);
        for i in 11..17 {
            arena.append(i);
        }
        assert_eq!(arena.chunk_count(), 3);
        assert_eq!(first.index(), 0);
        assert_eq!(arena[first], 10);
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut arena = Arena::new(4);
        let handle = arena.append(1u8);
        *arena.get_mut(handle) += 1;
        assert_eq!(arena[handle], 2);
    }
}
