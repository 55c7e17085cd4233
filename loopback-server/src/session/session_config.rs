/// Per-session negotiation policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Close the signaling channel, and with it the session, when the peer
    /// sends a `null` candidate.
    pub close_on_end_of_candidates: bool,
    pub event_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            close_on_end_of_candidates: true,
            event_queue: 256,
        }
    }
}
