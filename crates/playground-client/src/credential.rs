//! Credential attachment for request/response calls.
//!
//! The [`SessionManager`](crate::SessionManager) holds the
//! [`CredentialWriter`]; every [`Api`](crate::Api) implementation holds a
//! [`CredentialReader`]. The bearer is read when a request is sent, never when
//! it is built, so a call that was queued before a refresh goes out with the
//! fresh token.
//!
//! The reverse direction carries 401 reports: a gated call rejected with 401
//! reports the generation it was sent under, and the session manager feeds it
//! into the session machine on its next turn.

use playground_core::Credential;
use tokio::sync::{mpsc, watch};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct Attached {
    generation: u64,
    credential: Option<Credential>,
}

/// Create a linked writer/reader pair with no credential attached.
pub fn credential_channel() -> (CredentialWriter, CredentialReader) {
    let (tx, rx) = watch::channel(Attached::default());
    let (unauthorized_tx, unauthorized_rx) = mpsc::unbounded_channel();

    (CredentialWriter { tx, unauthorized_rx }, CredentialReader { rx, unauthorized_tx })
}

/// Session-side end: publishes credentials, collects 401 reports.
#[derive(Debug)]
pub struct CredentialWriter {
    tx: watch::Sender<Attached>,
    unauthorized_rx: mpsc::UnboundedReceiver<u64>,
}

impl CredentialWriter {
    /// Attach `credential` (or detach with `None`) under `generation`.
    pub fn attach(&self, generation: u64, credential: Option<Credential>) {
        debug!(generation, attached = credential.is_some(), "credential attachment changed");
        self.tx.send_replace(Attached { generation, credential });
    }

    /// Next pending 401 report, if any.
    pub fn try_next_unauthorized(&mut self) -> Option<u64> {
        self.unauthorized_rx.try_recv().ok()
    }
}

/// Transport-side end: reads the bearer at send time, reports 401s.
#[derive(Debug, Clone)]
pub struct CredentialReader {
    rx: watch::Receiver<Attached>,
    unauthorized_tx: mpsc::UnboundedSender<u64>,
}

impl CredentialReader {
    /// Current generation and `Authorization` header value.
    pub fn current(&self) -> (u64, Option<String>) {
        let attached = self.rx.borrow();
        (attached.generation, attached.credential.as_ref().map(Credential::bearer))
    }

    /// Report that a gated call sent under `generation` was answered with 401.
    pub fn report_unauthorized(&self, generation: u64) {
        if self.unauthorized_tx.send(generation).is_err() {
            debug!(generation, "session manager gone; dropping unauthorized report");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn reader_sees_latest_attachment() {
        let (writer, reader) = credential_channel();
        assert_eq!(reader.current(), (0, None));

        writer.attach(1, Some(Credential::new("abc", Instant::now())));
        assert_eq!(reader.current(), (1, Some("Bearer abc".to_string())));

        writer.attach(2, None);
        assert_eq!(reader.current(), (2, None));
    }

    #[test]
    fn unauthorized_reports_reach_writer() {
        let (mut writer, reader) = credential_channel();
        let clone = reader.clone();

        reader.report_unauthorized(3);
        clone.report_unauthorized(4);

        assert_eq!(writer.try_next_unauthorized(), Some(3));
        assert_eq!(writer.try_next_unauthorized(), Some(4));
        assert_eq!(writer.try_next_unauthorized(), None);
    }
}
