//! Parent/child byte channel created before a fork and used from both sides after it.

mod socket;
pub use socket::{Role, SocketMessenger};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::MessengerError;

/// Bidirectional byte channel between a process and the child it forks.
pub trait Messenger {
    /// Writes `data` on this side's endpoint. `Ok` means every byte was written.
    fn send(&mut self, data: &[u8]) -> Result<(), MessengerError>;

    /// Drains whatever is pending on this side's endpoint without blocking.
    ///
    /// Returns an empty buffer when nothing is pending.
    fn receive(&mut self) -> Result<Vec<u8>, MessengerError>;

    /// Non-blocking readiness poll.
    fn has_message(&self) -> bool;
}

/// Newline-delimited JSON on top of any [`Messenger`].
///
/// Used to move structured task context or results across the fork.
pub trait MessengerExt: Messenger {
    fn send_json<T: Serialize>(&mut self, value: &T) -> Result<(), MessengerError> {
        let mut buf = serde_json::to_vec(value)?;
        buf.push(b'\n');
        self.send(&buf)
    }

    /// Decodes every complete value currently pending.
    fn receive_json<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, MessengerError> {
        let raw = self.receive()?;
        serde_json::Deserializer::from_slice(&raw)
            .into_iter::<T>()
            .map(|item| item.map_err(MessengerError::from))
            .collect()
    }
}

impl<M: Messenger + ?Sized> MessengerExt for M {}
