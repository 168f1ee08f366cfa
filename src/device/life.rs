/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::{hal, FastHashMap, ObjectId};

use std::{collections::VecDeque, fmt};

/// Submission counter. Advances once per queue submission.
pub type Epoch = u64;

struct Deletion<C> {
    epoch: Epoch,
    action: Box<dyn FnOnce(&C) + Send>,
}

/// Deferred destruction actions, tagged with the epoch they were scheduled at.
///
/// Actions receive the context (normally the native device) by reference
/// when they run, instead of capturing it.
pub struct DeletionQueue<C> {
    current: Epoch,
    deletions: VecDeque<Deletion<C>>,
}

impl<C> DeletionQueue<C> {
    pub fn new() -> Self {
        Self {
            current: 0,
            deletions: VecDeque::new(),
        }
    }

    pub fn current_epoch(&self) -> Epoch {
        self.current
    }

    /// Moves to the next epoch and returns it.
    pub fn advance_epoch(&mut self) -> Epoch {
        self.current += 1;
        self.current
    }

    pub fn schedule(&mut self, action: impl FnOnce(&C) + Send + 'static) {
        self.deletions.push_back(Deletion {
            epoch: self.current,
            action: Box::new(action),
        });
    }

    /// Runs every action scheduled at or before `until`, in insertion order.
    ///
    /// Returns the number of actions that ran.
    pub fn drain(&mut self, until: Epoch, context: &C) -> usize {
        let mut count = 0;
        while let Some(deletion) = self.deletions.front() {
            if deletion.epoch > until {
                break;
            }
            if let Some(deletion) = self.deletions.pop_front() {
                (deletion.action)(context);
                count += 1;
            }
        }
        count
    }

    pub fn drain_all(&mut self, context: &C) -> usize {
        self.drain(Epoch::MAX, context)
    }

    pub fn len(&self) -> usize {
        self.deletions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
    }
}

impl<C> fmt::Debug for DeletionQueue<C> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("DeletionQueue")
            .field("current", &self.current)
            .field("pending", &self.deletions.len())
            .finish()
    }
}

/// Decides when deferred deletions are safe to run.
///
/// Every queue holds a mark: the epoch its open recording started in.
/// Work scheduled before the oldest mark can't be referenced by any
/// recording that has not been waited on.
#[derive(Debug)]
pub(crate) struct LifeTracker<A: hal::Api> {
    deletions: DeletionQueue<A::Device>,
    queue_marks: FastHashMap<ObjectId, Epoch>,
}

impl<A: hal::Api> LifeTracker<A> {
    pub fn new() -> Self {
        Self {
            deletions: DeletionQueue::new(),
            queue_marks: FastHashMap::default(),
        }
    }

    pub fn current_epoch(&self) -> Epoch {
        self.deletions.current_epoch()
    }

    pub fn pending(&self) -> usize {
        self.deletions.len()
    }

    pub fn register_queue(&mut self, queue: ObjectId) {
        let epoch = self.deletions.current_epoch();
        self.queue_marks.insert(queue, epoch);
    }

    pub fn unregister_queue(&mut self, queue: ObjectId) {
        self.queue_marks.remove(&queue);
    }

    pub fn schedule(&mut self, action: impl FnOnce(&A::Device) + Send + 'static) {
        self.deletions.schedule(action);
    }

    /// Closes the current epoch for a submission, returning the epoch
    /// the next recording starts in.
    pub fn begin_submission(&mut self) -> Epoch {
        self.deletions.advance_epoch()
    }

    /// Records that everything `queue` recorded before `epoch` has completed.
    pub fn retire(&mut self, queue: ObjectId, epoch: Epoch) {
        if let Some(mark) = self.queue_marks.get_mut(&queue) {
            *mark = epoch;
        }
    }

    /// Newest epoch whose deletions no queue can still depend on.
    pub fn reclaim_bound(&self) -> Option<Epoch> {
        match self.queue_marks.values().min() {
            Some(&oldest) => oldest.checked_sub(1),
            None => Some(self.deletions.current_epoch()),
        }
    }

    /// Runs the deletions that became safe.
    pub fn maintain(&mut self, device: &A::Device) -> usize {
        match self.reclaim_bound() {
            Some(bound) => {
                let count = self.deletions.drain(bound, device);
                if count != 0 {
                    log::debug!("Reclaimed {} objects up to epoch {}", count, bound);
                }
                count
            }
            None => 0,
        }
    }

    pub fn drain_all(&mut self, device: &A::Device) -> usize {
        self.deletions.drain_all(device)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::empty;

    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn drain_runs_prefix_in_order() {
        let log = Mutex::new(Vec::new());
        let mut queue = DeletionQueue::<Mutex<Vec<&str>>>::new();
        queue.advance_epoch();
        queue.schedule(|log| log.lock().push("a"));
        queue.schedule(|log| log.lock().push("b"));
        queue.advance_epoch();
        queue.advance_epoch();
        assert_eq!(queue.current_epoch(), 3);
        queue.schedule(|log| log.lock().push("c"));

        assert_eq!(queue.drain(0, &log), 0);
        assert_eq!(queue.drain(1, &log), 2);
        assert_eq!(*log.lock(), ["a", "b"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain(3, &log), 1);
        assert_eq!(*log.lock(), ["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_all_flushes_future_epochs() {
        let counter = Mutex::new(0);
        let mut queue = DeletionQueue::<Mutex<u32>>::new();
        for _ in 0..3 {
            queue.schedule(|counter| *counter.lock() += 1);
            queue.advance_epoch();
        }
        assert_eq!(queue.drain_all(&counter), 3);
        assert_eq!(*counter.lock(), 3);
    }

    fn tracked(life: &mut LifeTracker<empty::Api>, log: &Arc<Mutex<Vec<u32>>>, value: u32) {
        let log = Arc::clone(log);
        life.schedule(move |_| log.lock().push(value));
    }

    #[test]
    fn slowest_queue_bounds_reclamation() {
        let ids = crate::id::IdentityManager::new();
        let device = empty::Device::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut life = LifeTracker::<empty::Api>::new();
        let (fast, slow) = (ids.alloc(), ids.alloc());
        life.register_queue(fast);
        life.register_queue(slow);

        tracked(&mut life, &log, 1);
        assert_eq!(life.reclaim_bound(), None);

        // the fast queue submits twice, the slow one is still recording
        let epoch = life.begin_submission();
        life.retire(fast, epoch);
        tracked(&mut life, &log, 2);
        let epoch = life.begin_submission();
        life.retire(fast, epoch);
        assert_eq!(life.maintain(&device), 0);

        let epoch = life.begin_submission();
        life.retire(slow, epoch);
        assert_eq!(life.reclaim_bound(), Some(1));
        assert_eq!(life.maintain(&device), 2);
        assert_eq!(*log.lock(), [1, 2]);
    }

    #[test]
    fn no_queues_means_nothing_in_flight() {
        let device = empty::Device::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut life = LifeTracker::<empty::Api>::new();
        tracked(&mut life, &log, 5);
        assert_eq!(life.maintain(&device), 1);
        assert_eq!(life.pending(), 0);
    }
}
