//! Watches stdin and reports every wakeup until the other side hangs up.
//!
//! Library logging goes to stderr; set `EPOLL_NOTIFY_LOG` to a level
//! (`error`, `warn`, `info`, `debug`, `trace`) to see it. Silent by default.

use std::io::{Error, ErrorKind, Write};

use anyhow::{Context, Result, bail};
use epoll_notify::{Epoll, EpollEvent, EpollEvents, EpollFlags, EpollOptions};
use libc::{F_GETFL, F_SETFL, O_NONBLOCK, STDIN_FILENO, fcntl, read};
use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(
                std::io::stderr(),
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger;

fn log_level(raw: Option<&str>) -> LevelFilter {
    raw.and_then(|level| level.trim().parse().ok())
        .unwrap_or(LevelFilter::Off)
}

fn main() -> Result<()> {
    let level = log_level(std::env::var("EPOLL_NOTIFY_LOG").ok().as_deref());
    log::set_logger(&LOGGER).context("could not install the logger")?;
    log::set_max_level(level);

    let timeout = match std::env::args().nth(1) {
        Some(raw) => raw
            .parse::<i32>()
            .with_context(|| format!("timeout must be milliseconds, got {raw:?}"))?,
        None => Epoll::INFINITE,
    };

    //reads must never block, or draining would stall on an open pipe
    let _stdin = NonBlocking::set(STDIN_FILENO)?;

    let epoll = Epoll::with_options(EpollOptions {
        close_on_exec: true,
        ..EpollOptions::default()
    })?;

    let mut interest = EpollEvent::new(EpollFlags::IN | EpollFlags::RDHUP);
    interest.set_fd(STDIN_FILENO);
    epoll
        .add(STDIN_FILENO, &interest)
        .context("could not register interest in stdin")?;

    let mut events = EpollEvents::with_capacity(8)?;
    loop {
        println!("listening");
        let events_count = epoll.wait(&mut events, timeout)?;
        if events_count == 0 {
            println!("nothing happened within {timeout} ms");
            continue;
        }
        println!("woke up for a total of {events_count} events");
        for event in &events {
            let flags = event.flags();
            let concerned_fd = event.fd();
            println!("fd {concerned_fd}: {flags:?}");
            //data that arrived before a hangup is still readable, take it first
            if flags.intersects(EpollFlags::IN | EpollFlags::HUP) {
                let drained = drain(concerned_fd)?;
                println!("fd {concerned_fd} sent {} bytes", drained.bytes);
                if drained.eof {
                    println!("end of input on fd {concerned_fd}");
                    return finish(&epoll, concerned_fd);
                }
            }
            if flags.intersects(EpollFlags::HUP | EpollFlags::ERR) {
                println!("fd {concerned_fd} hung up");
                return finish(&epoll, concerned_fd);
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Drained {
    bytes: usize,
    eof: bool,
}

//reads until the descriptor would block or reaches end of input
fn drain(fd: i32) -> Result<Drained> {
    let mut buf = [0u8; 256];
    let mut drained = Drained { bytes: 0, eof: false };
    loop {
        let read_response = unsafe { read(fd, buf.as_mut_ptr() as *mut _, buf.len()) };
        if read_response == 0 {
            drained.eof = true;
            return Ok(drained);
        }
        if read_response < 0 {
            let err = Error::last_os_error();
            match err.kind() {
                ErrorKind::WouldBlock => return Ok(drained),
                ErrorKind::Interrupted => continue,
                _ => bail!("could not read fd {fd}: {err}"),
            }
        }
        drained.bytes += read_response as usize;
    }
}

//puts back the descriptor's original status flags on drop
struct NonBlocking {
    fd: i32,
    original: i32,
}

impl NonBlocking {
    fn set(fd: i32) -> Result<Self> {
        let original = unsafe { fcntl(fd, F_GETFL) };
        if original < 0 {
            bail!("could not read flags of fd {fd}: {}", Error::last_os_error());
        }
        if unsafe { fcntl(fd, F_SETFL, original | O_NONBLOCK) } < 0 {
            bail!("could not make fd {fd} non-blocking: {}", Error::last_os_error());
        }
        Ok(Self { fd, original })
    }
}

impl Drop for NonBlocking {
    fn drop(&mut self) {
        unsafe { fcntl(self.fd, F_SETFL, self.original) };
    }
}

fn finish(epoll: &Epoll, fd: i32) -> Result<()> {
    epoll.remove(fd)?;
    epoll.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> (i32, i32) {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) }, 0);
        (fds[0], fds[1])
    }

    fn send(fd: i32, bytes: &[u8]) {
        let written = unsafe { libc::write(fd, bytes.as_ptr() as *const _, bytes.len()) };
        assert_eq!(written, bytes.len() as isize);
    }

    #[test]
    fn drain_reads_past_one_buffer_until_end_of_input() {
        let (read_end, write_end) = pipe();
        send(write_end, &[b'a'; 1000]);
        unsafe { libc::close(write_end) };

        let _guard = NonBlocking::set(read_end).unwrap();
        assert_eq!(drain(read_end).unwrap(), Drained { bytes: 1000, eof: true });
        unsafe { libc::close(read_end) };
    }

    #[test]
    fn drain_stops_when_nothing_is_left_on_an_open_pipe() {
        let (read_end, write_end) = pipe();
        send(write_end, &[b'b'; 600]);

        let _guard = NonBlocking::set(read_end).unwrap();
        assert_eq!(drain(read_end).unwrap(), Drained { bytes: 600, eof: false });
        unsafe {
            libc::close(read_end);
            libc::close(write_end);
        }
    }

    #[test]
    fn hangup_with_pending_data_is_read_through_epoll() {
        let (read_end, write_end) = pipe();
        let _guard = NonBlocking::set(read_end).unwrap();
        let epoll = Epoll::new().unwrap();
        let mut interest = EpollEvent::new(EpollFlags::IN | EpollFlags::RDHUP);
        interest.set_fd(read_end);
        epoll.add(read_end, &interest).unwrap();
        send(write_end, &[b'c'; 1000]);
        unsafe { libc::close(write_end) };

        let mut events = EpollEvents::with_capacity(1).unwrap();
        assert_eq!(epoll.wait(&mut events, 1000).unwrap(), 1);
        let flags = events.ready()[0].flags();
        assert!(flags.contains(EpollFlags::IN | EpollFlags::HUP));
        assert_eq!(drain(read_end).unwrap(), Drained { bytes: 1000, eof: true });
        unsafe { libc::close(read_end) };
    }

    #[test]
    fn non_blocking_guard_restores_flags() {
        let (read_end, write_end) = pipe();
        let before = unsafe { fcntl(read_end, F_GETFL) };
        {
            let _guard = NonBlocking::set(read_end).unwrap();
            assert_ne!(unsafe { fcntl(read_end, F_GETFL) } & O_NONBLOCK, 0);
        }
        assert_eq!(unsafe { fcntl(read_end, F_GETFL) }, before);
        unsafe {
            libc::close(read_end);
            libc::close(write_end);
        }
    }

    #[test]
    fn log_level_defaults_to_off() {
        assert_eq!(log_level(None), LevelFilter::Off);
        assert_eq!(log_level(Some("nonsense")), LevelFilter::Off);
        assert_eq!(log_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(log_level(Some(" TRACE ")), LevelFilter::Trace);
    }
}
