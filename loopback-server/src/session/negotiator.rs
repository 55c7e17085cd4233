use crate::error::{NegotiationStage, SessionError};
use crate::relay::{MediaRelay, PacketSource, RelayReport};
use crate::session::{MediaSession, SessionCommand, SessionConfig, SessionState};
use crate::signaling::SignalingOutput;
use crate::transport::{MediaTransport, TransportEvent};
use loopback_core::{IceCandidateInit, SessionDescription, SessionId};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ChannelClosed,
    EndOfCandidates,
    NegotiationFailed,
    TransportFailed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::ChannelClosed => "signaling channel closed",
            CloseReason::EndOfCandidates => "peer finished sending candidates",
            CloseReason::NegotiationFailed => "negotiation failed",
            CloseReason::TransportFailed => "transport failed",
        };
        f.write_str(reason)
    }
}

/// Drives one session through offer, answer and candidate exchange, and
/// supervises the relay task of every incoming track.
///
/// Channel commands and transport events are consumed by a single control
/// loop, so the session is never mutated from two places at once.
pub struct Negotiator {
    session: MediaSession,
    config: SessionConfig,
    transport: Arc<dyn MediaTransport>,
    signaling: Arc<dyn SignalingOutput>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    event_rx: mpsc::Receiver<TransportEvent>,
    events_open: bool,
    relays: JoinSet<RelayReport>,
}

impl Negotiator {
    pub fn new(
        session_id: SessionId,
        config: SessionConfig,
        transport: Arc<dyn MediaTransport>,
        signaling: Arc<dyn SignalingOutput>,
        command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        event_rx: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        let session = MediaSession::new(session_id, transport.loopback());

        Self {
            session,
            config,
            transport,
            signaling,
            command_rx,
            event_rx,
            events_open: true,
            relays: JoinSet::new(),
        }
    }

    pub fn session(&self) -> &MediaSession {
        &self.session
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// Runs the control loop until the session closes and returns the final
    /// session record.
    pub async fn run(mut self) -> MediaSession {
        let id = self.session.id();
        info!("Session {}: negotiator started", id);

        let reason = loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        break CloseReason::ChannelClosed;
                    };
                    if let ControlFlow::Break(reason) = self.handle_command(cmd).await {
                        break reason;
                    }
                }

                evt = self.event_rx.recv(), if self.events_open => {
                    match evt {
                        Some(evt) => {
                            if let ControlFlow::Break(reason) = self.handle_transport_event(evt).await {
                                break reason;
                            }
                        }
                        None => {
                            debug!("Session {}: transport event queue closed", id);
                            self.events_open = false;
                        }
                    }
                }

                Some(joined) = self.relays.join_next() => self.on_relay_finished(joined),
            }
        };

        self.close(reason).await;
        info!(
            "Session {}: finished ({} packets / {} bytes relayed)",
            id,
            self.session.packets_relayed(),
            self.session.bytes_relayed()
        );
        self.session
    }

    /// Tears the session down: releases the transport, stops every relay and
    /// closes the signaling channel. Calling it again does nothing.
    pub async fn close(&mut self, reason: CloseReason) {
        if !self.session.transition(SessionState::Closed) {
            return;
        }
        info!("Session {}: closing ({})", self.session.id(), reason);

        if let Err(e) = self.transport.close().await {
            warn!("Session {}: transport close failed: {:#}", self.session.id(), e);
        }

        // Relays whose reads did not fail with the transport are cancelled.
        self.relays.abort_all();
        while let Some(joined) = self.relays.join_next().await {
            self.on_relay_finished(joined);
        }

        self.signaling.close().await;
    }

    async fn handle_command(&mut self, cmd: SessionCommand) -> ControlFlow<CloseReason> {
        match cmd {
            SessionCommand::Offer { sdp } => self.handle_offer(SessionDescription::offer(sdp)).await,

            SessionCommand::Candidate {
                candidate: Some(candidate),
            } => {
                self.handle_remote_candidate(candidate).await;
                ControlFlow::Continue(())
            }

            SessionCommand::Candidate { candidate: None } => {
                info!("Session {}: peer signalled end of candidates", self.session.id());
                if self.config.close_on_end_of_candidates {
                    ControlFlow::Break(CloseReason::EndOfCandidates)
                } else {
                    ControlFlow::Continue(())
                }
            }

            SessionCommand::Disconnect => ControlFlow::Break(CloseReason::ChannelClosed),
        }
    }

    async fn handle_offer(&mut self, offer: SessionDescription) -> ControlFlow<CloseReason> {
        let id = self.session.id();

        if self.session.remote_description().is_some() {
            warn!("Session {}: renegotiation is not supported, ignoring offer", id);
            return ControlFlow::Continue(());
        }

        info!("Session {}: processing offer", id);
        self.session.transition(SessionState::Negotiating);

        let mut deferred = Vec::new();
        let answer = match self.negotiate(offer, &mut deferred).await {
            Ok(Some(answer)) => answer,
            Ok(None) => {
                info!("Session {}: channel closed before the answer was ready", id);
                return ControlFlow::Break(CloseReason::ChannelClosed);
            }
            Err(e) => {
                error!("Session {}: {}", id, e);
                return ControlFlow::Break(CloseReason::NegotiationFailed);
            }
        };

        info!(
            "Session {}: sending answer with {} candidates",
            id,
            answer.candidate_count()
        );
        self.signaling.send_answer(answer.clone()).await;
        self.session.set_local_description(answer);
        self.session.transition(SessionState::Answered);

        for evt in deferred {
            if let ControlFlow::Break(reason) = self.handle_transport_event(evt).await {
                return ControlFlow::Break(reason);
            }
        }
        ControlFlow::Continue(())
    }

    /// Applies the offer and produces the answer once local gathering is
    /// complete. Returns `Ok(None)` if the channel went away while waiting.
    /// Transport events other than gathering progress are pushed to
    /// `deferred` and handled once the answer is out.
    async fn negotiate(
        &mut self,
        offer: SessionDescription,
        deferred: &mut Vec<TransportEvent>,
    ) -> Result<Option<SessionDescription>, SessionError> {
        self.transport
            .set_remote_description(&offer)
            .await
            .map_err(|e| SessionError::negotiation(NegotiationStage::RemoteDescription, format!("{e:#}")))?;
        self.session.set_remote_description(offer);

        let answer = self
            .transport
            .create_answer()
            .await
            .map_err(|e| SessionError::negotiation(NegotiationStage::CreateAnswer, format!("{e:#}")))?;

        let mut gathered = self.transport.gathering_complete_promise().await;
        self.transport
            .set_local_description(&answer)
            .await
            .map_err(|e| SessionError::negotiation(NegotiationStage::LocalDescription, format!("{e:#}")))?;

        let signaling = Arc::clone(&self.signaling);
        tokio::select! {
            biased;
            _ = signaling.closed() => return Ok(None),
            _ = gathered.recv() => {}
        }

        while let Ok(evt) = self.event_rx.try_recv() {
            match evt {
                TransportEvent::CandidateGathered(candidate) => {
                    self.session.add_local_candidate(candidate);
                }
                TransportEvent::GatheringComplete => {}
                other => deferred.push(other),
            }
        }
        self.session.mark_gathering_complete();

        let local = self.transport.local_description().await.ok_or_else(|| {
            SessionError::negotiation(
                NegotiationStage::LocalDescription,
                "no local description after gathering",
            )
        })?;
        if local.sdp.is_empty() {
            return Err(SessionError::negotiation(
                NegotiationStage::LocalDescription,
                "empty local description",
            ));
        }
        Ok(Some(local))
    }

    async fn handle_remote_candidate(&mut self, candidate: IceCandidateInit) {
        let id = self.session.id();
        let state = self.session.state();

        if !state.accepts_candidates() {
            warn!(
                "Session {}: dropping candidate received in state {}",
                id, state
            );
            return;
        }

        match self.transport.add_remote_candidate(candidate).await {
            Ok(()) => {
                self.session.record_remote_candidate();
                debug!("Session {}: remote candidate applied", id);
            }
            Err(e) => warn!("Session {}: dropping malformed candidate: {:#}", id, e),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) -> ControlFlow<CloseReason> {
        let id = self.session.id();

        match event {
            TransportEvent::CandidateGathered(candidate) => {
                if self.session.add_local_candidate(candidate) {
                    debug!("Session {}: local candidate gathered", id);
                }
            }

            TransportEvent::GatheringComplete => {
                self.session.mark_gathering_complete();
            }

            TransportEvent::TrackBound(source) => self.bind_track(source),

            TransportEvent::ConnectionStateChanged(state) => match state {
                RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed => {
                    return ControlFlow::Break(CloseReason::TransportFailed);
                }
                _ => debug!("Session {}: connection state {}", id, state),
            },
        }

        ControlFlow::Continue(())
    }

    fn bind_track(&mut self, source: Arc<dyn PacketSource>) {
        let id = self.session.id();
        let state = self.session.state();

        if !state.accepts_candidates() {
            warn!("Session {}: ignoring track reported in state {}", id, state);
            return;
        }

        let track_id = source.track_id();
        if self.session.bind_track(track_id.clone()) {
            self.session.transition(SessionState::MediaReady);
            info!("Session {}: media ready", id);
        }

        let relay = MediaRelay::new(id, source, self.session.loopback());
        self.relays.spawn(relay.run());
        debug!("Session {}: relay started for track {}", id, track_id);
    }

    fn on_relay_finished(&mut self, joined: Result<RelayReport, JoinError>) {
        let id = self.session.id();

        match joined {
            Ok(report) => {
                self.session.record_relay(&report);
                if self.session.state().is_closed() {
                    debug!("Session {}: {}", id, report.error);
                } else {
                    warn!(
                        "Session {}: relay stopped after {} packets: {}",
                        id, report.packets, report.error
                    );
                }
            }
            Err(e) if e.is_cancelled() => debug!("Session {}: relay task cancelled", id),
            Err(e) => error!("Session {}: relay task panicked: {}", id, e),
        }
    }
}
