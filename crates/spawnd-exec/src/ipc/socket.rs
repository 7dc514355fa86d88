use std::{
    io::{ErrorKind, Read, Write},
    os::fd::{AsFd, AsRawFd},
    os::unix::net::UnixStream,
};

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::socket::{AddressFamily, MsgFlags, SockFlag, SockType, recv, socketpair};
use nix::unistd::{Pid, getpid};

use crate::{error::MessengerError, ipc::Messenger};

const READ_CHUNK: usize = 4096;

/// Which side of the fork the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Parent,
    Child,
}

impl Role {
    #[inline]
    fn index(self) -> usize {
        match self {
            Role::Parent => 0,
            Role::Child => 1,
        }
    }

    #[inline]
    fn other(self) -> Role {
        match self {
            Role::Parent => Role::Child,
            Role::Child => Role::Parent,
        }
    }
}

/// [`Messenger`] over a connected `AF_UNIX` stream socket pair.
///
/// The creator's pid is captured by [`SocketMessenger::new`]; after a fork each
/// side compares its live pid against it to pick its endpoint. Nothing else is
/// shared: each process holds its own copy of both descriptors.
///
/// ## Close discipline
/// - `send` first closes the other side's endpoint in the calling process.
/// - `close` releases only the caller's own endpoint.
pub struct SocketMessenger {
    creator: Pid,
    endpoints: [Option<UnixStream>; 2],
    initialized: bool,
}

impl SocketMessenger {
    /// Records the calling process as the parent side. Call before forking.
    pub fn new() -> Self {
        Self {
            creator: getpid(),
            endpoints: [None, None],
            initialized: false,
        }
    }

    /// Creates the socket pair. Must run before the fork that will use it.
    pub fn init(&mut self) -> Result<(), MessengerError> {
        let (parent, child) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::SOCK_CLOEXEC,
        )
        .map_err(MessengerError::Socket)?;

        self.endpoints = [Some(UnixStream::from(parent)), Some(UnixStream::from(child))];
        self.initialized = true;
        Ok(())
    }

    pub fn role(&self) -> Role {
        if getpid() == self.creator {
            Role::Parent
        } else {
            Role::Child
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Closes this side's endpoint in the calling process.
    pub fn close(&mut self) {
        let own = self.role().index();
        self.endpoints[own] = None;
    }

    fn own(&self) -> Result<&UnixStream, MessengerError> {
        if !self.initialized {
            return Err(MessengerError::NotInitialized);
        }
        self.endpoints[self.role().index()]
            .as_ref()
            .ok_or(MessengerError::Closed)
    }
}

impl Default for SocketMessenger {
    fn default() -> Self {
        Self::new()
    }
}

impl Messenger for SocketMessenger {
    fn send(&mut self, data: &[u8]) -> Result<(), MessengerError> {
        if !self.initialized {
            return Err(MessengerError::NotInitialized);
        }
        let other = self.role().other().index();
        self.endpoints[other] = None;

        let mut stream = self.own()?;
        stream.set_nonblocking(false)?;
        stream.write_all(data)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, MessengerError> {
        let mut stream = self.own()?;
        stream.set_nonblocking(true)?;

        let mut data = Vec::new();
        let mut buf = [0u8; READ_CHUNK];
        let drained = loop {
            match stream.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };

        stream.set_nonblocking(false)?;
        drained?;
        Ok(data)
    }

    fn has_message(&self) -> bool {
        let Ok(stream) = self.own() else {
            return false;
        };

        let mut fds = [PollFd::new(stream.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::ZERO) {
            Ok(n) if n > 0 => {}
            _ => return false,
        }

        // A hung-up peer is readable too; only report real bytes.
        let mut probe = [0u8; 1];
        matches!(
            recv(
                stream.as_raw_fd(),
                &mut probe,
                MsgFlags::MSG_PEEK | MsgFlags::MSG_DONTWAIT,
            ),
            Ok(n) if n > 0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::panic::{self, AssertUnwindSafe};
    use std::thread;
    use std::time::{Duration, Instant};

    use nix::sys::wait::{WaitStatus, waitpid};
    use nix::unistd::{ForkResult, fork};
    use serde::{Deserialize, Serialize};

    use crate::ipc::MessengerExt;
    use crate::util::exit_child;

    fn wait_for_message(messenger: &SocketMessenger) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if messenger.has_message() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    /// Runs `body` in a forked child and returns its exit code.
    fn in_child(body: impl FnOnce() -> bool) -> Pid {
        // SAFETY: the child runs `body` and leaves through _exit.
        match unsafe { fork() }.expect("fork") {
            ForkResult::Child => {
                let ok = panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or(false);
                exit_child(if ok { 0 } else { 1 })
            }
            ForkResult::Parent { child } => child,
        }
    }

    #[test]
    fn use_before_init_is_rejected() {
        let mut messenger = SocketMessenger::new();
        assert!(matches!(
            messenger.send(b"x"),
            Err(MessengerError::NotInitialized)
        ));
        assert!(matches!(
            messenger.receive(),
            Err(MessengerError::NotInitialized)
        ));
        assert!(!messenger.has_message());
    }

    #[test]
    fn creator_is_parent() {
        let messenger = SocketMessenger::new();
        assert_eq!(messenger.role(), Role::Parent);
    }

    #[test]
    fn receive_on_idle_channel_is_empty() {
        let mut messenger = SocketMessenger::new();
        messenger.init().unwrap();
        assert!(!messenger.has_message());
        assert!(messenger.receive().unwrap().is_empty());
    }

    #[test]
    fn close_releases_only_own_endpoint() {
        let mut messenger = SocketMessenger::new();
        messenger.init().unwrap();
        messenger.close();
        assert!(matches!(messenger.receive(), Err(MessengerError::Closed)));
        assert!(!messenger.has_message());
    }

    #[test]
    fn round_trip_across_fork() {
        let mut messenger = SocketMessenger::new();
        messenger.init().unwrap();

        let child = in_child(|| {
            if messenger.role() != Role::Child {
                return false;
            }
            // Several writes, drained in one receive by the parent.
            for chunk in [&b"hel"[..], b"lo ", b"world"] {
                if messenger.send(chunk).is_err() {
                    return false;
                }
            }
            if !wait_for_message(&messenger) {
                return false;
            }
            let Ok(reply) = messenger.receive() else {
                return false;
            };
            let echoed: Vec<u8> = reply.iter().rev().copied().collect();
            messenger.send(&echoed).is_ok()
        });

        assert!(wait_for_message(&messenger));
        // Give the remaining chunks a moment so one receive sees them all.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(messenger.receive().unwrap(), b"hello world");
        assert!(!messenger.has_message());

        messenger.send(b"ping").unwrap();
        assert!(wait_for_message(&messenger));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(messenger.receive().unwrap(), b"gnip");
        assert!(!messenger.has_message());

        assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Report {
        id: u32,
        items: Vec<String>,
    }

    #[test]
    fn json_values_cross_the_fork() {
        let mut messenger = SocketMessenger::new();
        messenger.init().unwrap();

        let child = in_child(|| {
            let first = Report {
                id: 1,
                items: vec!["a".into()],
            };
            let second = Report {
                id: 2,
                items: vec![],
            };
            messenger.send_json(&first).is_ok() && messenger.send_json(&second).is_ok()
        });

        assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));

        let reports: Vec<Report> = messenger.receive_json().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].id, 1);
        assert_eq!(reports[1].items.len(), 0);
        assert!(!messenger.has_message());
    }
}
