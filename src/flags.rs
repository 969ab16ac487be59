use bitflags::bitflags;

bitflags! {
    /// Readiness conditions carried in the `events` word of an epoll record.
    ///
    /// On registration this is the set of conditions to watch; after a wait
    /// it is the set that actually fired.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EpollFlags: u32 {
        /// Available for read operations.
        const IN = 0x0001;
        /// Urgent data available for read operations.
        const PRI = 0x0002;
        /// Available for write operations.
        const OUT = 0x0004;
        /// Error condition. Always reported, no need to ask for it.
        const ERR = 0x0008;
        /// Hang up. Always reported, no need to ask for it.
        const HUP = 0x0010;
        const RDNORM = 0x0040;
        const RDBAND = 0x0080;
        const WRNORM = 0x0100;
        const WRBAND = 0x0200;
        const MSG = 0x0400;
        /// Peer closed its side, or shut down the writing half.
        const RDHUP = 0x2000;
        /// Keep the system from suspending while this event is pending.
        const WAKEUP = 1 << 29;
        /// Disarm after one event; rearm with `Epoll::modify`.
        const ONESHOT = 1 << 30;
        /// Report state transitions only.
        const ET = 1 << 31;
    }
}

impl EpollFlags {
    /// Conditions the kernel reports whether or not they were requested.
    pub const ALWAYS: EpollFlags = EpollFlags::ERR.union(EpollFlags::HUP);

    /// Wraps a raw `events` word, keeping bits this type has no name for.
    pub fn from_raw(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }

    /// Drops every flag, unnamed bits included.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }
}

static_assertions::const_assert_eq!(EpollFlags::IN.bits(), libc::EPOLLIN as u32);
static_assertions::const_assert_eq!(EpollFlags::PRI.bits(), libc::EPOLLPRI as u32);
static_assertions::const_assert_eq!(EpollFlags::OUT.bits(), libc::EPOLLOUT as u32);
static_assertions::const_assert_eq!(EpollFlags::ERR.bits(), libc::EPOLLERR as u32);
static_assertions::const_assert_eq!(EpollFlags::HUP.bits(), libc::EPOLLHUP as u32);
static_assertions::const_assert_eq!(EpollFlags::RDNORM.bits(), libc::EPOLLRDNORM as u32);
static_assertions::const_assert_eq!(EpollFlags::RDBAND.bits(), libc::EPOLLRDBAND as u32);
static_assertions::const_assert_eq!(EpollFlags::WRNORM.bits(), libc::EPOLLWRNORM as u32);
static_assertions::const_assert_eq!(EpollFlags::WRBAND.bits(), libc::EPOLLWRBAND as u32);
static_assertions::const_assert_eq!(EpollFlags::MSG.bits(), libc::EPOLLMSG as u32);
static_assertions::const_assert_eq!(EpollFlags::RDHUP.bits(), libc::EPOLLRDHUP as u32);
static_assertions::const_assert_eq!(EpollFlags::WAKEUP.bits(), libc::EPOLLWAKEUP as u32);
static_assertions::const_assert_eq!(EpollFlags::ONESHOT.bits(), libc::EPOLLONESHOT as u32);
static_assertions::const_assert_eq!(EpollFlags::ET.bits(), libc::EPOLLET as u32);
