use std::fmt;
use std::mem::{offset_of, size_of};
use std::os::raw::c_void;
use std::os::unix::io::RawFd;

use static_assertions::{assert_eq_align, assert_eq_size, const_assert_eq};

use crate::flags::EpollFlags;

/// The 8-byte user data slot, C's `epoll_data_t`.
///
/// The kernel never looks inside; it hands back verbatim what was stored at
/// registration time. All four fields overlap from the first byte.
#[repr(C)]
#[derive(Clone, Copy)]
union EpollData {
    u32: u32,
    fd: RawFd,
    u64: u64,
    ptr: usize,
}

/// One interpretation of the user data slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    U32,
    Fd,
    U64,
    Ptr,
}

/// User data read or written under one interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserData {
    U32(u32),
    Fd(RawFd),
    U64(u64),
    Ptr(*mut c_void),
}

/// An epoll record, laid out exactly like the kernel's `struct epoll_event`
/// (packed wherever libc packs it: x86_64 and 32-bit x86 glibc; naturally
/// aligned elsewhere).
///
/// Serves both directions: as the interest passed to [`Epoll::add`] and
/// [`Epoll::modify`], and as the slot [`Epoll::wait_one`] fills in.
///
/// Exactly one data interpretation should be used for a given registration.
/// Reading it back under another kind gives whatever those bytes happen to
/// hold, which is unspecified but never undefined: every field is plain
/// integer data over a fully initialized slot.
///
/// [`Epoll::add`]: crate::Epoll::add
/// [`Epoll::modify`]: crate::Epoll::modify
/// [`Epoll::wait_one`]: crate::Epoll::wait_one
#[repr(C)]
#[cfg_attr(
    any(target_arch = "x86_64", all(target_arch = "x86", target_env = "gnu")),
    repr(packed)
)]
#[derive(Clone, Copy)]
pub struct EpollEvent {
    events: u32,
    data: EpollData,
}

assert_eq_size!(EpollEvent, libc::epoll_event);
assert_eq_align!(EpollEvent, libc::epoll_event);
const_assert_eq!(offset_of!(EpollEvent, events), offset_of!(libc::epoll_event, events));
const_assert_eq!(offset_of!(EpollEvent, data), offset_of!(libc::epoll_event, u64));
const_assert_eq!(size_of::<EpollData>(), 8);

#[cfg(any(target_arch = "x86_64", all(target_arch = "x86", target_env = "gnu")))]
const_assert_eq!(size_of::<EpollEvent>(), 12);
#[cfg(any(target_arch = "x86_64", all(target_arch = "x86", target_env = "gnu")))]
const_assert_eq!(std::mem::align_of::<EpollEvent>(), 1);

impl EpollEvent {
    /// Size of one record in bytes.
    pub const SIZE: usize = size_of::<EpollEvent>();
    pub const OFFSET_EVENTS: usize = offset_of!(EpollEvent, events);
    pub const OFFSET_USER_DATA: usize = offset_of!(EpollEvent, data);

    /// A record watching `flags` with zeroed user data.
    pub fn new(flags: EpollFlags) -> Self {
        Self {
            events: flags.bits(),
            data: EpollData { u64: 0 },
        }
    }

    pub fn flags(&self) -> EpollFlags {
        EpollFlags::from_raw(self.events)
    }

    pub fn set_flags(&mut self, flags: EpollFlags) -> &mut Self {
        self.events = flags.bits();
        self
    }

    // Copies out first: the record may be packed, so its fields cannot be
    // borrowed in place.
    fn data(&self) -> EpollData {
        self.data
    }

    fn update_data(&mut self, write: impl FnOnce(&mut EpollData)) -> &mut Self {
        let mut data = self.data;
        write(&mut data);
        self.data = data;
        self
    }

    pub fn u32(&self) -> u32 {
        // SAFETY: every bit pattern is a valid u32 and the slot is always initialized.
        unsafe { self.data().u32 }
    }

    pub fn set_u32(&mut self, value: u32) -> &mut Self {
        self.update_data(|data| data.u32 = value)
    }

    pub fn fd(&self) -> RawFd {
        // SAFETY: as for `u32`.
        unsafe { self.data().fd }
    }

    pub fn set_fd(&mut self, fd: RawFd) -> &mut Self {
        self.update_data(|data| data.fd = fd)
    }

    pub fn u64(&self) -> u64 {
        // SAFETY: as for `u32`.
        unsafe { self.data().u64 }
    }

    pub fn set_u64(&mut self, value: u64) -> &mut Self {
        self.update_data(|data| data.u64 = value)
    }

    /// The pointer-sized value. Nothing here dereferences it.
    pub fn ptr(&self) -> *mut c_void {
        // SAFETY: as for `u32`.
        unsafe { self.data().ptr as *mut c_void }
    }

    pub fn set_ptr(&mut self, ptr: *mut c_void) -> &mut Self {
        self.update_data(|data| data.ptr = ptr as usize)
    }

    /// Reads the user data under `kind`. The kind is the caller's to track.
    pub fn user_data(&self, kind: DataKind) -> UserData {
        match kind {
            DataKind::U32 => UserData::U32(self.u32()),
            DataKind::Fd => UserData::Fd(self.fd()),
            DataKind::U64 => UserData::U64(self.u64()),
            DataKind::Ptr => UserData::Ptr(self.ptr()),
        }
    }

    pub fn set_user_data(&mut self, data: UserData) -> &mut Self {
        match data {
            UserData::U32(value) => self.set_u32(value),
            UserData::Fd(fd) => self.set_fd(fd),
            UserData::U64(value) => self.set_u64(value),
            UserData::Ptr(ptr) => self.set_ptr(ptr),
        }
    }

    pub(crate) fn as_native(&self) -> *mut libc::epoll_event {
        self as *const EpollEvent as *mut libc::epoll_event
    }

    pub(crate) fn as_native_mut(&mut self) -> *mut libc::epoll_event {
        self as *mut EpollEvent as *mut libc::epoll_event
    }
}

impl UserData {
    pub fn kind(&self) -> DataKind {
        match self {
            UserData::U32(_) => DataKind::U32,
            UserData::Fd(_) => DataKind::Fd,
            UserData::U64(_) => DataKind::U64,
            UserData::Ptr(_) => DataKind::Ptr,
        }
    }
}

impl Default for EpollEvent {
    fn default() -> Self {
        Self::new(EpollFlags::empty())
    }
}

impl fmt::Debug for EpollEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpollEvent")
            .field("flags", &self.flags())
            .field("data", &format_args!("{:#018x}", self.u64()))
            .finish()
    }
}

impl From<&libc::epoll_event> for EpollEvent {
    fn from(native: &libc::epoll_event) -> Self {
        let mut event = EpollEvent::new(EpollFlags::from_raw(native.events));
        event.set_u64(native.u64);
        event
    }
}

impl From<EpollEvent> for libc::epoll_event {
    fn from(event: EpollEvent) -> Self {
        libc::epoll_event {
            events: event.flags().bits(),
            u64: event.u64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_records_are_zeroed() {
        let event = EpollEvent::default();
        assert!(event.flags().is_empty());
        assert_eq!(event.u64(), 0);
    }

    #[test]
    fn flags_and_data_round_trip_for_every_kind() {
        let values = [
            UserData::U32(7),
            UserData::Fd(7),
            UserData::U64(7),
            UserData::Ptr(7usize as *mut c_void),
        ];
        for value in values {
            let mut event = EpollEvent::default();
            event.set_flags(EpollFlags::IN).set_user_data(value);
            assert_eq!(event.flags(), EpollFlags::IN);
            assert_eq!(event.user_data(value.kind()), value);
        }
    }

    #[test]
    fn typed_accessors_keep_full_width() {
        let mut event = EpollEvent::default();
        event.set_u64(u64::MAX - 1);
        assert_eq!(event.u64(), u64::MAX - 1);
        event.set_fd(-1);
        assert_eq!(event.fd(), -1);
        event.set_u32(u32::MAX);
        assert_eq!(event.u32(), u32::MAX);
    }

    #[test]
    fn narrow_fields_overlap_the_first_bytes() {
        let mut event = EpollEvent::default();
        event.set_u64(0);
        event.set_fd(42);
        assert_eq!(event.u32(), 42);
        #[cfg(target_endian = "little")]
        assert_eq!(event.u64(), 42);
    }

    #[test]
    fn layout_matches_libc() {
        assert_eq!(EpollEvent::SIZE, size_of::<libc::epoll_event>());
        assert_eq!(EpollEvent::OFFSET_EVENTS, 0);
        assert_eq!(EpollEvent::OFFSET_USER_DATA, offset_of!(libc::epoll_event, u64));
    }

    #[test]
    fn alignment_matches_libc() {
        assert_eq!(std::mem::align_of::<EpollEvent>(), std::mem::align_of::<libc::epoll_event>());
        let batch = [EpollEvent::default(); 2];
        let stride = &batch[1] as *const EpollEvent as usize - &batch[0] as *const EpollEvent as usize;
        assert_eq!(stride, size_of::<libc::epoll_event>());
    }

    #[test]
    fn converts_to_and_from_libc() {
        let mut event = EpollEvent::new(EpollFlags::OUT | EpollFlags::ET);
        event.set_u64(0xdead_beef);
        let native: libc::epoll_event = event.into();
        assert_eq!({ native.events }, (EpollFlags::OUT | EpollFlags::ET).bits());
        assert_eq!({ native.u64 }, 0xdead_beef);
        let back = EpollEvent::from(&native);
        assert_eq!(back.flags(), event.flags());
        assert_eq!(back.u64(), 0xdead_beef);
    }
}
