use crate::error::SessionError;
use crate::generic_types::{InboundEvent, LiveSessionConfig, OutboundMessage};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

/// Opens live sessions against a realtime speech provider.
///
/// Implementations own credentials and wire details; the session only sees
/// [`InboundEvent`]s and pushes [`OutboundMessage`]s.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self, config: &LiveSessionConfig) -> Result<LiveLink, SessionError>;
}

/// The two halves of an open session.
pub struct LiveLink {
    pub transport: Box<dyn LiveTransport>,
    pub events: mpsc::Receiver<InboundEvent>,
}

/// Sending half of an open session.
///
/// `send` must not block: a transport that cannot accept a message right now
/// returns an error and the caller drops the message.
#[cfg_attr(test, automock)]
pub trait LiveTransport: Send {
    fn send(&self, message: OutboundMessage) -> Result<(), SessionError>;

    /// Closes the session. Calling it again is a no-op.
    fn close(&mut self);
}
