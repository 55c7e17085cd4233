use crate::relay::{PacketSink, RelayReport};
use crate::session::SessionState;
use loopback_core::{IceCandidateInit, SessionDescription, SessionId};
use std::sync::Arc;
use tokio::sync::watch;

/// Aggregate state of one negotiated media session. Only the owning
/// negotiator mutates it.
pub struct MediaSession {
    id: SessionId,
    state: watch::Sender<SessionState>,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    local_candidates: Vec<IceCandidateInit>,
    gathering_complete: bool,
    remote_candidates_applied: usize,
    incoming_tracks: Vec<String>,
    loopback: Arc<dyn PacketSink>,
    packets_relayed: u64,
    bytes_relayed: u64,
}

impl MediaSession {
    pub fn new(id: SessionId, loopback: Arc<dyn PacketSink>) -> Self {
        let (state, _) = watch::channel(SessionState::Created);
        Self {
            id,
            state,
            local_description: None,
            remote_description: None,
            local_candidates: Vec::new(),
            gathering_complete: false,
            remote_candidates_applied: 0,
            incoming_tracks: Vec::new(),
            loopback,
            packets_relayed: 0,
            bytes_relayed: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Moves to `next` if the lifecycle allows it. Returns whether it moved.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if !self.state().can_transition_to(next) {
            return false;
        }
        self.state.send_replace(next);
        true
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    /// Records the remote offer. A description that is already set is kept.
    pub fn set_remote_description(&mut self, desc: SessionDescription) -> bool {
        if self.remote_description.is_some() {
            return false;
        }
        self.remote_description = Some(desc);
        true
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn set_local_description(&mut self, desc: SessionDescription) -> bool {
        if self.local_description.is_some() {
            return false;
        }
        self.local_description = Some(desc);
        true
    }

    /// Adds a gathered local candidate. Duplicates and candidates reported
    /// after gathering completed are ignored.
    pub fn add_local_candidate(&mut self, candidate: IceCandidateInit) -> bool {
        if self.gathering_complete || self.local_candidates.contains(&candidate) {
            return false;
        }
        self.local_candidates.push(candidate);
        true
    }

    pub fn local_candidates(&self) -> &[IceCandidateInit] {
        &self.local_candidates
    }

    pub fn mark_gathering_complete(&mut self) {
        self.gathering_complete = true;
    }

    pub fn is_gathering_complete(&self) -> bool {
        self.gathering_complete
    }

    pub fn record_remote_candidate(&mut self) {
        self.remote_candidates_applied += 1;
    }

    pub fn remote_candidates_applied(&self) -> usize {
        self.remote_candidates_applied
    }

    /// Binds an incoming track. Returns `true` for the session's first track.
    pub fn bind_track(&mut self, track_id: String) -> bool {
        self.incoming_tracks.push(track_id);
        self.incoming_tracks.len() == 1
    }

    pub fn incoming_tracks(&self) -> &[String] {
        &self.incoming_tracks
    }

    pub fn loopback(&self) -> Arc<dyn PacketSink> {
        Arc::clone(&self.loopback)
    }

    pub fn record_relay(&mut self, report: &RelayReport) {
        self.packets_relayed += report.packets;
        self.bytes_relayed += report.bytes;
    }

    pub fn packets_relayed(&self) -> u64 {
        self.packets_relayed
    }

    pub fn bytes_relayed(&self) -> u64 {
        self.bytes_relayed
    }
}
