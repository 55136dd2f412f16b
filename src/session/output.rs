//! Datagram hand-off.
//!
//! Encoded datagrams leave a session either through a buffer the caller
//! drains after `update`/`flush`, or through a handler invoked synchronously
//! as each datagram is produced.

use std::fmt;

use crate::core::OutputHandler;

/// How a session hands encoded datagrams to the host.
#[derive(Default)]
pub enum OutputMode {
    /// Datagrams are collected and returned from `update`/`flush`.
    #[default]
    Buffered,
    /// Datagrams are passed to the handler as they are produced.
    Callback(Box<dyn OutputHandler>),
}

impl OutputMode {
    /// Callback mode with the given handler.
    pub fn callback<H: OutputHandler + 'static>(handler: H) -> Self {
        Self::Callback(Box::new(handler))
    }
}

impl fmt::Debug for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered => f.write_str("Buffered"),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Output sink of one session.
#[derive(Debug, Default)]
pub(crate) struct Output {
    mode: OutputMode,
    pending: Vec<Vec<u8>>,
    delivered: u64,
}

impl Output {
    pub(crate) fn set_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
    }

    /// Route one datagram.
    pub(crate) fn emit(&mut self, datagram: Vec<u8>) {
        self.delivered += 1;
        match &mut self.mode {
            OutputMode::Buffered => self.pending.push(datagram),
            OutputMode::Callback(handler) => handler.deliver(&datagram),
        }
    }

    /// Take buffered datagrams, in generation order.
    pub(crate) fn take(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }

    /// Datagrams produced since creation.
    pub(crate) fn delivered(&self) -> u64 {
        self.delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_buffered() {
        let mut output = Output::default();
        assert!(matches!(output.mode, OutputMode::Buffered));
        output.emit(vec![1]);
        output.emit(vec![2]);
        assert_eq!(output.take(), vec![vec![1], vec![2]]);
        assert!(output.take().is_empty());
        assert_eq!(output.delivered(), 2);
    }

    #[test]
    fn test_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut output = Output::default();
        output.set_mode(OutputMode::callback(move |d: &[u8]| {
            sink.lock().unwrap().push(d.to_vec());
        }));
        output.emit(vec![7, 8]);

        assert!(output.take().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![vec![7, 8]]);
        assert_eq!(format!("{:?}", output.mode), "Callback(..)");
    }
}
