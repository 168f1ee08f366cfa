/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::{
    fmt,
    num::NonZeroU64,
    sync::atomic::{AtomicU64, Ordering},
};

/// Device-unique identity of a state object or resource.
///
/// Identities are never reused for the lifetime of a device, so they
/// can key caches and trackers after the object itself is gone.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(NonZeroU64);

impl ObjectId {
    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "ObjectId({})", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct IdentityManager {
    next: AtomicU64,
}

impl IdentityManager {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn alloc(&self) -> ObjectId {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        // starts at 1 and a u64 counter does not wrap in practice
        ObjectId(unsafe { NonZeroU64::new_unchecked(value) })
    }
}

#[test]
fn test_identities_are_unique() {
    let manager = IdentityManager::new();
    let a = manager.alloc();
    let b = manager.alloc();
    assert_ne!(a, b);
    assert!(a < b);
    assert_eq!(a.raw(), 1);
}
