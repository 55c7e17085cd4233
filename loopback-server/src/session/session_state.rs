use std::fmt;

/// Lifecycle of one media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Transport allocated and callbacks installed; nothing exchanged yet.
    Created,
    /// Remote offer accepted, answer being prepared.
    Negotiating,
    /// Answer sent; remote candidates are applied in this state.
    Answered,
    /// At least one incoming track is being relayed.
    MediaReady,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Created, Negotiating)
                | (Negotiating, Answered)
                | (Answered, MediaReady)
                | (Created | Negotiating | Answered | MediaReady, Closed)
        )
    }

    /// States in which remote candidates can be applied.
    pub fn accepts_candidates(self) -> bool {
        matches!(self, SessionState::Answered | SessionState::MediaReady)
    }

    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
