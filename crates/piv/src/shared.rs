use std::sync::Arc;

use parking_lot::Mutex;
use pivkit_apdu_core::CardTransport;

use crate::client::PivClient;

/// A [`PivClient`] shared between threads
///
/// The lock is held for exactly one closure call, so a sequence of operations
/// that must not interleave with other callers belongs in a single closure.
#[derive(Debug)]
pub struct SharedClient<T: CardTransport> {
    inner: Arc<Mutex<PivClient<T>>>,
}

impl<T: CardTransport> SharedClient<T> {
    /// Share `client`
    pub fn new(client: PivClient<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(client)),
        }
    }

    /// Run `f` with exclusive access to the client, waiting for other callers
    pub fn with<R>(&self, f: impl FnOnce(&mut PivClient<T>) -> R) -> R {
        let mut client = self.inner.lock();
        f(&mut client)
    }

    /// Run `f` only if no other caller holds the client
    pub fn try_with<R>(&self, f: impl FnOnce(&mut PivClient<T>) -> R) -> Option<R> {
        self.inner.try_lock().map(|mut client| f(&mut client))
    }

    /// Recover the client if this is the last handle
    pub fn into_inner(self) -> Result<PivClient<T>, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl<T: CardTransport> Clone for SharedClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: CardTransport> From<PivClient<T>> for SharedClient<T> {
    fn from(client: PivClient<T>) -> Self {
        Self::new(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionConfig;
    use crate::testing::ScriptedTransport;
    use hex_literal::hex;

    #[test]
    fn test_shared_client_serializes_access() {
        let transport = ScriptedTransport::new(&[&hex!("90 00"), &hex!("05 04 03 90 00")]);
        let client = PivClient::connect(transport, SessionConfig::default()).unwrap();
        let shared = SharedClient::new(client);

        let handle = shared.clone();
        let version = std::thread::spawn(move || handle.with(|client| client.version()))
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(version.to_string(), "5.4.3");

        let held = shared.inner.lock();
        assert!(shared.try_with(|_| ()).is_none());
        drop(held);
        assert!(shared.try_with(|_| ()).is_some());

        assert!(shared.into_inner().is_ok());
    }
}
