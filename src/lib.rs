//! Linux epoll without the raw FFI.
//!
//! - [`EpollFlags`]: the readiness conditions, as a bitmask.
//! - [`EpollEvent`]: one record in the kernel's own layout, flags plus 8 bytes
//!   of user data the kernel hands back untouched.
//! - [`EpollEvents`]: a reusable batch of records for waiting on many
//!   descriptors at once.
//! - [`Epoll`]: the instance itself, with add/modify/remove/wait.
//!
//! Every failure comes back as an [`EpollError`] of a specific kind; raw errno
//! values never leak past this crate except inside
//! [`EpollError::UnexpectedNative`].

#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("epoll is only available on Linux");

mod epoll;
mod error;
mod event;
mod events;
mod flags;
mod sys;

pub use epoll::{Epoll, EpollOptions};
pub use error::{EpollError, Invalid, Limit, Operation};
pub use event::{DataKind, EpollEvent, UserData};
pub use events::EpollEvents;
pub use flags::EpollFlags;
