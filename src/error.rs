use std::fmt;
use std::os::unix::io::RawFd;

/// The call an error came out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Add,
    Modify,
    Remove,
    Wait,
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Add => "add",
            Operation::Modify => "modify",
            Operation::Remove => "remove",
            Operation::Wait => "wait",
            Operation::Close => "close",
        };
        f.write_str(name)
    }
}

/// Which limit was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Per-user epoll instances or per-process descriptor table (EMFILE).
    Process,
    /// System-wide descriptor table (ENFILE).
    System,
    /// Per-user watch count, see `/proc/sys/fs/epoll/max_user_watches` (ENOSPC).
    Watches,
}

/// Why an argument was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalid {
    /// Not an open descriptor (EBADF).
    BadDescriptor,
    /// An instance cannot watch its own descriptor.
    SelfWatch,
    /// A batch needs room for at least one record.
    ZeroCapacity,
    /// A batch larger than the kernel accepts as `maxevents`.
    CapacityTooLarge,
    /// Registering would nest epoll instances in a cycle or too deep (ELOOP).
    WatchLoop,
    /// Refused by the kernel for another reason (EINVAL).
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpollError {
    ResourceExhausted(Limit),
    InvalidArgument(Invalid),
    AlreadyRegistered(RawFd),
    NotRegistered(RawFd),
    /// The descriptor's file type cannot be polled, regular files for instance.
    Unsupported(RawFd),
    OutOfKernelMemory,
    InstanceClosed,
    /// An errno this wrapper has no kind for.
    UnexpectedNative { op: Operation, errno: i32 },
    /// An infinite wait came back with nothing ready.
    SpuriousWake,
}

impl EpollError {
    /// The errno behind this error, when the kernel produced it.
    pub fn raw_os_error(&self) -> Option<i32> {
        match *self {
            EpollError::ResourceExhausted(Limit::Process) => Some(libc::EMFILE),
            EpollError::ResourceExhausted(Limit::System) => Some(libc::ENFILE),
            EpollError::ResourceExhausted(Limit::Watches) => Some(libc::ENOSPC),
            EpollError::InvalidArgument(Invalid::BadDescriptor) => Some(libc::EBADF),
            EpollError::InvalidArgument(Invalid::WatchLoop) => Some(libc::ELOOP),
            EpollError::InvalidArgument(Invalid::Rejected) => Some(libc::EINVAL),
            EpollError::AlreadyRegistered(_) => Some(libc::EEXIST),
            EpollError::NotRegistered(_) => Some(libc::ENOENT),
            EpollError::Unsupported(_) => Some(libc::EPERM),
            EpollError::OutOfKernelMemory => Some(libc::ENOMEM),
            EpollError::UnexpectedNative { errno, .. } => Some(errno),
            _ => None,
        }
    }

    /// Translates the errno of a failed native call made on behalf of `op`
    /// against descriptor `fd`.
    pub(crate) fn from_errno(op: Operation, fd: RawFd, errno: i32) -> Self {
        match (op, errno) {
            (Operation::Create, libc::EMFILE) => EpollError::ResourceExhausted(Limit::Process),
            (Operation::Create, libc::ENFILE) => EpollError::ResourceExhausted(Limit::System),
            (Operation::Add, libc::EEXIST) => EpollError::AlreadyRegistered(fd),
            (Operation::Add, libc::ENOSPC) => EpollError::ResourceExhausted(Limit::Watches),
            (Operation::Add, libc::ELOOP) => EpollError::InvalidArgument(Invalid::WatchLoop),
            (Operation::Modify | Operation::Remove, libc::ENOENT) => EpollError::NotRegistered(fd),
            (Operation::Add | Operation::Modify | Operation::Remove, libc::EPERM) => {
                EpollError::Unsupported(fd)
            }
            (Operation::Close, errno) => EpollError::UnexpectedNative { op, errno },
            (_, libc::EBADF) => EpollError::InvalidArgument(Invalid::BadDescriptor),
            (_, libc::EINVAL) => EpollError::InvalidArgument(Invalid::Rejected),
            (_, libc::ENOMEM) => EpollError::OutOfKernelMemory,
            (op, errno) => EpollError::UnexpectedNative { op, errno },
        }
    }
}

impl fmt::Display for EpollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpollError::ResourceExhausted(Limit::Process) => f.write_str(
                "per-user limit on epoll instances or per-process limit on descriptors reached",
            ),
            EpollError::ResourceExhausted(Limit::System) => {
                f.write_str("system-wide limit on open descriptors reached")
            }
            EpollError::ResourceExhausted(Limit::Watches) => {
                f.write_str("per-user limit on epoll watches reached")
            }
            EpollError::InvalidArgument(Invalid::BadDescriptor) => {
                f.write_str("descriptor is not valid")
            }
            EpollError::InvalidArgument(Invalid::SelfWatch) => {
                f.write_str("an epoll instance cannot watch its own descriptor")
            }
            EpollError::InvalidArgument(Invalid::ZeroCapacity) => {
                f.write_str("an event batch must hold at least one record")
            }
            EpollError::InvalidArgument(Invalid::CapacityTooLarge) => {
                write!(
                    f,
                    "an event batch cannot hold more than {} records",
                    crate::EpollEvents::MAX_CAPACITY
                )
            }
            EpollError::InvalidArgument(Invalid::WatchLoop) => {
                f.write_str("watch would create an epoll cycle or nest too deeply")
            }
            EpollError::InvalidArgument(Invalid::Rejected) => {
                f.write_str("argument rejected by the kernel")
            }
            EpollError::AlreadyRegistered(fd) => write!(f, "descriptor {fd} is already registered"),
            EpollError::NotRegistered(fd) => write!(f, "descriptor {fd} is not registered"),
            EpollError::Unsupported(fd) => write!(f, "descriptor {fd} does not support epoll"),
            EpollError::OutOfKernelMemory => {
                f.write_str("kernel has insufficient memory for this operation")
            }
            EpollError::InstanceClosed => {
                f.write_str("cannot perform operation on a closed epoll instance")
            }
            EpollError::UnexpectedNative { op, errno } => write!(
                f,
                "native error during epoll {op}: {}",
                std::io::Error::from_raw_os_error(*errno)
            ),
            EpollError::SpuriousWake => {
                f.write_str("epoll unblocked without an event despite an infinite timeout")
            }
        }
    }
}

impl std::error::Error for EpollError {}
