//! The native boundary: the epoll syscalls bound once per process, plus the
//! `epoll_ctl` operation codes.

use std::io::Error;
use std::sync::OnceLock;

use libc::{c_int, epoll_event};
use log::debug;

pub(crate) const EPOLL_CTL_ADD: c_int = 1;
pub(crate) const EPOLL_CTL_DEL: c_int = 2;
pub(crate) const EPOLL_CTL_MOD: c_int = 3;

static_assertions::const_assert_eq!(EPOLL_CTL_ADD, libc::EPOLL_CTL_ADD);
static_assertions::const_assert_eq!(EPOLL_CTL_DEL, libc::EPOLL_CTL_DEL);
static_assertions::const_assert_eq!(EPOLL_CTL_MOD, libc::EPOLL_CTL_MOD);

/// Function table every `Epoll` goes through to reach the kernel.
pub(crate) struct Syscalls {
    pub(crate) create: unsafe extern "C" fn(c_int) -> c_int,
    pub(crate) create1: unsafe extern "C" fn(c_int) -> c_int,
    pub(crate) ctl: unsafe extern "C" fn(c_int, c_int, c_int, *mut epoll_event) -> c_int,
    pub(crate) wait: unsafe extern "C" fn(c_int, *mut epoll_event, c_int, c_int) -> c_int,
    pub(crate) close: unsafe extern "C" fn(c_int) -> c_int,
}

static NATIVE: OnceLock<Syscalls> = OnceLock::new();

/// The libc bindings. Initialized on first use and never replaced.
pub(crate) fn native() -> &'static Syscalls {
    NATIVE.get_or_init(|| {
        debug!("binding epoll syscalls from libc");
        Syscalls {
            create: libc::epoll_create,
            create1: libc::epoll_create1,
            ctl: libc::epoll_ctl,
            wait: libc::epoll_wait,
            close: libc::close,
        }
    })
}

/// errno of the call that just failed. Must run before anything else that
/// may touch errno, logging included.
pub(crate) fn last_errno() -> i32 {
    Error::last_os_error().raw_os_error().unwrap_or(0)
}
