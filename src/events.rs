use std::slice;

use crate::error::{EpollError, Invalid};
use crate::event::EpollEvent;

/// A fixed batch of records for [`Epoll::wait`] to fill.
///
/// One zeroed allocation of `capacity` records. After a wait only the first
/// [`len`](Self::len) slots hold what the kernel just wrote; the rest keep
/// whatever an earlier wait left there. The batch is not tied to any
/// instance and can be reused across waits.
///
/// [`Epoll::wait`]: crate::Epoll::wait
#[derive(Debug)]
pub struct EpollEvents {
    records: Box<[EpollEvent]>,
    ready: usize,
}

impl EpollEvents {
    /// Largest batch the kernel accepts: `epoll_wait` refuses a `maxevents`
    /// above `INT_MAX / sizeof(struct epoll_event)`.
    pub const MAX_CAPACITY: usize = i32::MAX as usize / EpollEvent::SIZE;

    pub fn with_capacity(capacity: usize) -> Result<Self, EpollError> {
        if capacity < 1 {
            return Err(EpollError::InvalidArgument(Invalid::ZeroCapacity));
        }
        if capacity > Self::MAX_CAPACITY {
            return Err(EpollError::InvalidArgument(Invalid::CapacityTooLarge));
        }
        Ok(Self {
            records: vec![EpollEvent::default(); capacity].into_boxed_slice(),
            ready: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Number of slots filled by the last wait.
    pub fn len(&self) -> usize {
        self.ready
    }

    pub fn is_empty(&self) -> bool {
        self.ready == 0
    }

    /// Any slot below capacity, fresh or stale.
    pub fn get(&self, index: usize) -> Option<&EpollEvent> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut EpollEvent> {
        self.records.get_mut(index)
    }

    /// The slots filled by the last wait.
    pub fn ready(&self) -> &[EpollEvent] {
        &self.records[..self.ready]
    }

    pub fn iter(&self) -> slice::Iter<'_, EpollEvent> {
        self.ready().iter()
    }

    pub(crate) fn as_native_mut(&mut self) -> *mut libc::epoll_event {
        self.records.as_mut_ptr() as *mut libc::epoll_event
    }

    pub(crate) fn max_events(&self) -> libc::c_int {
        // with_capacity bounds capacity to MAX_CAPACITY
        self.records.len() as libc::c_int
    }

    /// Marks the first `n` slots as written by the kernel.
    pub(crate) fn commit_ready(&mut self, n: usize) {
        debug_assert!(n <= self.records.len());
        self.ready = n.min(self.records.len());
    }
}

impl<'a> IntoIterator for &'a EpollEvents {
    type Item = &'a EpollEvent;
    type IntoIter = slice::Iter<'a, EpollEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
