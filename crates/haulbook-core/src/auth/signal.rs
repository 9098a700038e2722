use tokio::sync::broadcast;

/// Buffer for session signals.
/// Signals are rare; a handful of slots covers a burst of failing requests.
const SIGNAL_BUFFER_SIZE: usize = 16;

/// Events the core emits for the presentation layer to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// The session was cleared after a terminal authorization failure.
    /// The router should return the user to the login entry point.
    AuthorizationLost,
}

pub(crate) fn channel() -> broadcast::Sender<SessionSignal> {
    let (tx, _rx) = broadcast::channel(SIGNAL_BUFFER_SIZE);
    tx
}
