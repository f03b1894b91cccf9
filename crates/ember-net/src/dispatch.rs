//! Opcode dispatch: route decoded frame payloads to registered handlers.
//!
//! The [`DispatchRegistry`] maps opcodes to a decode-then-handle capability.
//! It is populated once during single-threaded startup, then shared behind
//! an `Arc` and only ever read; dispatch from concurrent session tasks needs
//! no locking.

use std::collections::HashMap;

use crate::session::SessionHandle;

/// Error returned by a registered payload decoder.
///
/// A decode failure on a known opcode means the client and server disagree
/// about the message schema; the session cannot safely continue.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl DecodeError {
    /// Wrap any decoder error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// What dispatch did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler decoded and processed the message.
    Handled,
    /// No handler is registered for the opcode; the message was dropped.
    ///
    /// Intentionally non-fatal: a version-mismatched peer sending opcodes
    /// this build does not know must not take the connection down.
    UnknownOpcode,
    /// The registered decoder rejected the payload; the session must close.
    DecodeFailed,
}

/// Erased registry entry: decode the body, invoke the handler.
type Entry = Box<dyn Fn(&SessionHandle, &[u8]) -> Result<(), DecodeError> + Send + Sync>;

/// Maps opcodes to decode+handle capabilities.
///
/// Registration happens during startup, before any session starts reading;
/// registering an opcode twice overwrites the previous entry.
pub struct DispatchRegistry {
    handlers: HashMap<u16, Entry>,
}

impl DispatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a decoder and handler for an opcode.
    ///
    /// The decoder turns raw body bytes into a typed message; the handler
    /// runs synchronously on the session's read task and may call
    /// [`SessionHandle::send`] any number of times, but must not block.
    pub fn register<M, D, H>(&mut self, opcode: u16, decoder: D, handler: H)
    where
        M: 'static,
        D: Fn(&[u8]) -> Result<M, DecodeError> + Send + Sync + 'static,
        H: Fn(&SessionHandle, M) + Send + Sync + 'static,
    {
        self.handlers.insert(
            opcode,
            Box::new(move |session, body| {
                let message = decoder(body)?;
                handler(session, message);
                Ok(())
            }),
        );
    }

    /// Route one frame to its handler.
    pub fn dispatch(&self, session: &SessionHandle, opcode: u16, body: &[u8]) -> DispatchOutcome {
        let Some(entry) = self.handlers.get(&opcode) else {
            tracing::warn!(opcode, "no handler registered, dropping message");
            return DispatchOutcome::UnknownOpcode;
        };

        match entry(session, body) {
            Ok(()) => DispatchOutcome::Handled,
            Err(err) => {
                tracing::error!(opcode, error = %err, "payload decode failed");
                DispatchOutcome::DecodeFailed
            }
        }
    }

    /// Whether an opcode has a registered handler.
    pub fn is_registered(&self, opcode: u16) -> bool {
        self.handlers.contains_key(&opcode)
    }

    /// Iterate over registered opcodes (useful for startup logging).
    pub fn registered_opcodes(&self) -> impl Iterator<Item = u16> + '_ {
        self.handlers.keys().copied()
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::session::test_support::detached_handle;

    fn identity_decoder(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(body.to_vec())
    }

    #[tokio::test]
    async fn test_message_routed_to_handler() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let mut registry = DispatchRegistry::new();
        registry.register(1, identity_decoder, move |_session, body: Vec<u8>| {
            assert_eq!(body, b"abc");
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let session = detached_handle();
        let outcome = registry.dispatch(&session, 1, b"abc");

        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_opcode_is_dropped() {
        let registry = DispatchRegistry::new();
        let session = detached_handle();

        let outcome = registry.dispatch(&session, 42, b"whatever");
        assert_eq!(outcome, DispatchOutcome::UnknownOpcode);
    }

    #[tokio::test]
    async fn test_decode_failure_is_fatal() {
        let mut registry = DispatchRegistry::new();
        registry.register(
            1,
            |_body| -> Result<(), DecodeError> { Err(DecodeError::new("bad bytes")) },
            |_session, _msg: ()| panic!("handler must not run on decode failure"),
        );

        let session = detached_handle();
        let outcome = registry.dispatch(&session, 1, b"garbage");
        assert_eq!(outcome, DispatchOutcome::DecodeFailed);
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = Arc::clone(&hits);

        let mut registry = DispatchRegistry::new();
        registry.register(1, identity_decoder, |_session, _body: Vec<u8>| {
            panic!("overwritten handler must not run");
        });
        registry.register(1, identity_decoder, move |_session, _body: Vec<u8>| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        let session = detached_handle();
        registry.dispatch(&session, 1, b"");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registered_opcodes_listing() {
        let mut registry = DispatchRegistry::new();
        registry.register(3, identity_decoder, |_s, _b: Vec<u8>| {});
        registry.register(9, identity_decoder, |_s, _b: Vec<u8>| {});

        let mut opcodes: Vec<u16> = registry.registered_opcodes().collect();
        opcodes.sort_unstable();
        assert_eq!(opcodes, vec![3, 9]);
        assert!(registry.is_registered(3));
        assert!(!registry.is_registered(4));
    }
}
