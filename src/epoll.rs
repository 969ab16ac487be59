use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::error::{EpollError, Invalid, Operation};
use crate::event::EpollEvent;
use crate::events::EpollEvents;
use crate::sys::{self, Syscalls, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD};

/// How an instance is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpollOptions {
    /// Passed to `epoll_create`. Modern kernels ignore it but still insist
    /// on a positive value.
    pub size_hint: i32,
    /// Create through `epoll_create1(EPOLL_CLOEXEC)` so the descriptor does
    /// not leak into exec'd children. `size_hint` is then unused.
    pub close_on_exec: bool,
}

impl Default for EpollOptions {
    fn default() -> Self {
        Self {
            size_hint: 1,
            close_on_exec: false,
        }
    }
}

/// An epoll instance.
///
/// Registration (`add`, `modify`, `remove`) may run on one thread while
/// another blocks in `wait`. Several threads waiting on the same instance is
/// allowed by the kernel, but which of them receives which events is not
/// specified; drive the wait loop from one thread.
///
/// Closing is idempotent, and `Drop` closes an instance still open. Every
/// operation on a closed instance fails with [`EpollError::InstanceClosed`].
/// Closing while another thread is inside a call on the same instance is a
/// race the caller has to rule out.
///
/// A wait interrupted by a signal is restarted. With a positive timeout the
/// restart only gets what is left of the original budget, and a spent budget
/// reads as a timeout.
pub struct Epoll {
    fd: RawFd,
    closed: AtomicBool,
    sys: &'static Syscalls,
}

impl Epoll {
    /// Timeout that blocks until something is ready.
    pub const INFINITE: i32 = -1;
    /// Timeout that checks readiness and returns at once.
    pub const POLL: i32 = 0;

    pub fn new() -> Result<Self, EpollError> {
        Self::with_options(EpollOptions::default())
    }

    pub fn with_options(options: EpollOptions) -> Result<Self, EpollError> {
        Self::create_with(sys::native(), options)
    }

    pub(crate) fn create_with(
        syscalls: &'static Syscalls,
        options: EpollOptions,
    ) -> Result<Self, EpollError> {
        let fd = if options.close_on_exec {
            unsafe { (syscalls.create1)(libc::EPOLL_CLOEXEC) }
        } else {
            if options.size_hint < 1 {
                return Err(EpollError::InvalidArgument(Invalid::Rejected));
            }
            unsafe { (syscalls.create)(options.size_hint) }
        };
        if fd < 0 {
            return Err(EpollError::from_errno(Operation::Create, fd, sys::last_errno()));
        }
        debug!("created epoll instance with fd {fd} ({options:?})");
        Ok(Self {
            fd,
            closed: AtomicBool::new(false),
            sys: syscalls,
        })
    }

    /// The instance's own descriptor, so it can be watched by another
    /// instance. Still answers after close, with the number it used to hold.
    pub fn descriptor(&self) -> RawFd {
        self.fd
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Releases the kernel object. Closing again is a no-op.
    ///
    /// A failing native close still leaves the instance closed: Linux frees
    /// the descriptor either way.
    pub fn close(&self) -> Result<(), EpollError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if unsafe { (self.sys.close)(self.fd) } < 0 {
            return Err(EpollError::from_errno(Operation::Close, self.fd, sys::last_errno()));
        }
        debug!("closed epoll instance with fd {}", self.fd);
        Ok(())
    }

    fn guard_closed(&self) -> Result<RawFd, EpollError> {
        if self.is_closed() {
            return Err(EpollError::InstanceClosed);
        }
        Ok(self.fd)
    }

    fn control(
        &self,
        op: Operation,
        code: libc::c_int,
        fd: RawFd,
        event: *mut libc::epoll_event,
    ) -> Result<(), EpollError> {
        let epfd = self.guard_closed()?;
        if unsafe { (self.sys.ctl)(epfd, code, fd, event) } < 0 {
            let err = EpollError::from_errno(op, fd, sys::last_errno());
            trace!("epoll {op} of fd {fd} on epoll fd {epfd} failed: {err}");
            return Err(err);
        }
        trace!("epoll {op} of fd {fd} on epoll fd {epfd}");
        Ok(())
    }

    /// Starts watching `fd` for what `event` asks for. The event's user data
    /// comes back with every readiness report for `fd`.
    pub fn add(&self, fd: RawFd, event: &EpollEvent) -> Result<(), EpollError> {
        self.guard_closed()?;
        if fd == self.fd {
            return Err(EpollError::InvalidArgument(Invalid::SelfWatch));
        }
        self.control(Operation::Add, EPOLL_CTL_ADD, fd, event.as_native())
    }

    /// Replaces the flags and user data of an already watched `fd`.
    pub fn modify(&self, fd: RawFd, event: &EpollEvent) -> Result<(), EpollError> {
        self.control(Operation::Modify, EPOLL_CTL_MOD, fd, event.as_native())
    }

    pub fn remove(&self, fd: RawFd) -> Result<(), EpollError> {
        self.control(Operation::Remove, EPOLL_CTL_DEL, fd, std::ptr::null_mut())
    }

    /// Waits for a single event, `timeout` in milliseconds (negative blocks,
    /// zero polls). Returns whether `event` was filled.
    pub fn wait_one(&self, event: &mut EpollEvent, timeout: i32) -> Result<bool, EpollError> {
        let ready = self.wait_raw(event.as_native_mut(), 1, timeout)?;
        Ok(ready > 0)
    }

    pub fn wait_one_forever(&self, event: &mut EpollEvent) -> Result<(), EpollError> {
        self.wait_one(event, Self::INFINITE).map(|_| ())
    }

    /// Waits for up to `events.capacity()` events, `timeout` in milliseconds
    /// (negative blocks, zero polls). Returns how many slots were filled,
    /// also available afterwards as `events.len()`.
    pub fn wait(&self, events: &mut EpollEvents, timeout: i32) -> Result<usize, EpollError> {
        events.commit_ready(0);
        let ready = self.wait_raw(events.as_native_mut(), events.max_events(), timeout)?;
        events.commit_ready(ready);
        Ok(ready)
    }

    pub fn wait_forever(&self, events: &mut EpollEvents) -> Result<usize, EpollError> {
        self.wait(events, Self::INFINITE)
    }

    fn wait_raw(
        &self,
        records: *mut libc::epoll_event,
        max_events: libc::c_int,
        timeout: i32,
    ) -> Result<usize, EpollError> {
        let epfd = self.guard_closed()?;
        let deadline =
            (timeout > 0).then(|| Instant::now() + Duration::from_millis(timeout as u64));
        let mut remaining = timeout;
        loop {
            let ready = unsafe { (self.sys.wait)(epfd, records, max_events, remaining) };
            if ready >= 0 {
                if ready == 0 && timeout < 0 {
                    warn!("epoll fd {epfd} woke up with nothing ready on an infinite wait");
                    return Err(EpollError::SpuriousWake);
                }
                trace!("epoll fd {epfd} woke up for {ready} events");
                return Ok(ready as usize);
            }
            let errno = sys::last_errno();
            if errno != libc::EINTR {
                return Err(EpollError::from_errno(Operation::Wait, epfd, errno));
            }
            if let Some(deadline) = deadline {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    trace!("epoll fd {epfd} interrupted with no time left");
                    return Ok(0);
                }
                remaining = left.as_millis().clamp(1, i32::MAX as u128) as i32;
            }
            trace!("epoll fd {epfd} interrupted, waiting again ({remaining} ms)");
        }
    }
}

impl AsRawFd for Epoll {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl std::fmt::Debug for Epoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Epoll")
            .field("fd", &self.fd)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to close epoll fd {} on drop: {err}", self.fd);
        }
    }
}
