//! Core traits for the session engine.
//!
//! These traits define the seams between the engine and its embedding host.

/// Receiver of encoded datagrams in callback output mode.
///
/// The handler is owned by the session and invoked synchronously on the
/// thread that drives `update`/`flush`, once per datagram, in generation
/// order. It only ever sees a byte slice, so it cannot re-enter the session
/// that owns it.
///
/// Any `FnMut(&[u8]) + Send` closure is a handler:
///
/// ```
/// use kcp_session::{OutputMode, Session};
///
/// let mut session = Session::new(0x11);
/// session
///     .set_output(OutputMode::callback(|datagram: &[u8]| {
///         // hand the datagram to a socket
///         let _ = datagram.len();
///     }))
///     .unwrap();
/// ```
pub trait OutputHandler: Send {
    /// Deliver one datagram for transmission.
    fn deliver(&mut self, datagram: &[u8]);
}

impl<F> OutputHandler for F
where
    F: FnMut(&[u8]) + Send,
{
    fn deliver(&mut self, datagram: &[u8]) {
        self(datagram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_handler() {
        let mut seen = Vec::new();
        {
            let mut handler = |d: &[u8]| seen.push(d.to_vec());
            handler.deliver(b"one");
            handler.deliver(b"two");
        }
        assert_eq!(seen, vec![b"one".to_vec(), b"two".to_vec()]);
    }
}
