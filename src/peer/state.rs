use crate::error::SessionError;
use crate::peer::data_channel::ReadinessTracker;
use crate::peer::ice::{analyze_candidates, GateOutcome, GatheringGate};
use crate::peer::transport::TransportEvent;
use crate::peer::types::{ChatFrame, ConnectionDescription, ExpectedChannelSet, IceStatus, Role, SdpKind};
use tracing::{debug, info, warn};

/// Connection-establishment phase.
///
/// Initiator: `Idle → CreatingOffer → GatheringCandidates → OfferReady →
/// AwaitingAnswer → RemoteApplied → ChannelsPending → Connected`.
///
/// Responder: `Idle → RemoteOfferApplied → CreatingAnswer →
/// GatheringCandidates → AnswerReady → ChannelsPending → Connected`.
///
/// Any phase may drop into `Failed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CreatingOffer,
    RemoteOfferApplied,
    CreatingAnswer,
    GatheringCandidates,
    OfferReady,
    AwaitingAnswer,
    AnswerReady,
    RemoteApplied,
    ChannelsPending,
    Connected,
    Failed,
}

/// Side effect requested by the state machine
#[derive(Debug)]
pub enum Action {
    /// Gathering finished: read back and publish the local description.
    PublishLocalDescription,
    /// Every expected channel is open; chat over `label`.
    EnterInteractive { label: String },
    Display { label: String, text: String },
    ChannelClosed { label: String },
    Fail(SessionError),
}

/// One peer's connection-establishment state.
///
/// All transport events go through [`Session::handle`], so the protocol can be
/// driven and inspected without a network.
#[derive(Debug)]
pub struct Session {
    role: Role,
    phase: Phase,
    local: Option<ConnectionDescription>,
    remote: Option<ConnectionDescription>,
    gate: GatheringGate,
    tracker: ReadinessTracker,
    creation_in_flight: bool,
}

impl Session {
    pub fn new(role: Role, expected: ExpectedChannelSet) -> Self {
        Self {
            role,
            phase: Phase::Idle,
            local: None,
            remote: None,
            gate: GatheringGate::new(),
            tracker: match role {
                Role::Initiator => ReadinessTracker::new(expected),
                Role::Responder => ReadinessTracker::counting_announced(expected),
            },
            creation_in_flight: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn local_description(&self) -> Option<&ConnectionDescription> {
        self.local.as_ref()
    }

    pub fn remote_description(&self) -> Option<&ConnectionDescription> {
        self.remote.as_ref()
    }

    pub fn expected(&self) -> &ExpectedChannelSet {
        self.tracker.expected()
    }

    pub fn tracker(&self) -> &ReadinessTracker {
        &self.tracker
    }

    pub fn gate(&self) -> &GatheringGate {
        &self.gate
    }

    fn transition(&mut self, from: &[Phase], to: Phase) -> Result<(), SessionError> {
        if !from.contains(&self.phase) {
            return Err(SessionError::Connection(format!(
                "cannot move to {to:?} while {:?}",
                self.phase
            )));
        }
        debug!(from = ?self.phase, to = ?to, "session phase");
        self.phase = to;
        Ok(())
    }

    fn begin_creation(&mut self) -> Result<(), SessionError> {
        if self.creation_in_flight {
            return Err(SessionError::Connection(
                "a local description is already being created".into(),
            ));
        }
        self.creation_in_flight = true;
        Ok(())
    }

    /// Initiator: offer creation requested. Channels are declared by now.
    pub fn begin_offer(&mut self) -> Result<(), SessionError> {
        self.expect_role(Role::Initiator)?;
        self.transition(&[Phase::Idle], Phase::CreatingOffer)?;
        self.begin_creation()
    }

    /// Responder: the pasted offer was accepted by the transport.
    pub fn remote_offer_applied(&mut self, offer: ConnectionDescription) -> Result<(), SessionError> {
        self.expect_role(Role::Responder)?;
        self.transition(&[Phase::Idle], Phase::RemoteOfferApplied)?;
        self.remote = Some(offer);
        Ok(())
    }

    pub fn begin_answer(&mut self) -> Result<(), SessionError> {
        self.expect_role(Role::Responder)?;
        self.transition(&[Phase::RemoteOfferApplied], Phase::CreatingAnswer)?;
        self.begin_creation()
    }

    /// Local description installed; candidates start trickling in.
    pub fn local_description_created(&mut self) -> Result<(), SessionError> {
        self.transition(
            &[Phase::CreatingOffer, Phase::CreatingAnswer],
            Phase::GatheringCandidates,
        )?;
        self.gate.arm();
        Ok(())
    }

    /// Gathering complete and the full description has been read back.
    pub fn local_description_finalized(&mut self, desc: ConnectionDescription) -> Result<(), SessionError> {
        if desc.kind != SdpKind::for_role(self.role) {
            return Err(SessionError::Connection(format!(
                "transport produced an {:?} for the {:?}",
                desc.kind, self.role
            )));
        }
        let next = match self.role {
            Role::Initiator => Phase::OfferReady,
            Role::Responder => Phase::AnswerReady,
        };
        self.transition(&[Phase::GatheringCandidates], next)?;
        self.creation_in_flight = false;
        self.local = Some(desc);
        Ok(())
    }

    /// The finalized description was handed to the operator.
    pub fn local_description_delivered(&mut self) -> Result<(), SessionError> {
        match self.role {
            Role::Initiator => self.transition(&[Phase::OfferReady], Phase::AwaitingAnswer),
            Role::Responder if self.phase == Phase::Connected => Ok(()),
            Role::Responder => self.transition(&[Phase::AnswerReady], Phase::ChannelsPending),
        }
    }

    /// Initiator only: may the pasted answer be applied now?
    pub fn can_accept_answer(&self) -> bool {
        self.role == Role::Initiator
            && matches!(self.phase, Phase::OfferReady | Phase::AwaitingAnswer)
    }

    pub fn remote_answer_applied(&mut self, answer: ConnectionDescription) -> Result<(), SessionError> {
        self.expect_role(Role::Initiator)?;
        self.transition(&[Phase::OfferReady, Phase::AwaitingAnswer], Phase::RemoteApplied)?;
        self.remote = Some(answer);
        if self.tracker.all_ready() {
            self.phase = Phase::Connected;
        } else {
            self.transition(&[Phase::RemoteApplied], Phase::ChannelsPending)?;
        }
        Ok(())
    }

    /// Channel declared locally before the offer.
    pub fn channel_declared(&mut self, label: &str) {
        self.tracker.announce(label);
    }

    pub fn fail(&mut self, err: SessionError) -> Action {
        warn!(phase = ?self.phase, error = %err, "session failed");
        self.phase = Phase::Failed;
        self.creation_in_flight = false;
        Action::Fail(err)
    }

    fn expect_role(&self, role: Role) -> Result<(), SessionError> {
        if self.role != role {
            return Err(SessionError::Connection(format!(
                "operation requires the {role:?} role, session is {:?}",
                self.role
            )));
        }
        Ok(())
    }

    /// Single update function for every transport notification.
    pub fn handle(&mut self, event: TransportEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.phase == Phase::Failed {
            debug!(?event, "session already failed, dropping event");
            return actions;
        }

        match event {
            TransportEvent::SignalingStateChanged(state) => {
                info!(state = %state, "signaling state change");
            }
            TransportEvent::IceGatheringStateChanged(state) => {
                info!(state = %state, "ice gathering state change");
            }
            TransportEvent::PeerConnectionStateChanged(state) => {
                info!(state = %state, "peer connection state change");
            }
            TransportEvent::IceConnectionStateChanged(state) => {
                info!(state = ?state, "ice connection state change");
                match state {
                    IceStatus::Failed => {
                        actions.push(self.fail(SessionError::Connection(
                            "ICE connection failed".into(),
                        )));
                    }
                    IceStatus::Disconnected => {
                        warn!("ICE connection disconnected, waiting for it to recover");
                    }
                    _ => {}
                }
            }
            TransportEvent::CandidateDiscovered(candidate) => {
                if self.gate.observe(candidate) == GateOutcome::Completed {
                    analyze_candidates(self.gate.candidates());
                    actions.push(Action::PublishLocalDescription);
                }
            }
            TransportEvent::ChannelAnnounced { label } => {
                debug!(label = %label, "data channel announced");
                self.tracker.announce(&label);
            }
            TransportEvent::ChannelOpened { label } => {
                if let Some(label) = self.tracker.opened(&label) {
                    info!(label = %label, "all data channels open");
                    let from = [
                        Phase::ChannelsPending,
                        Phase::AwaitingAnswer,
                        Phase::AnswerReady,
                        Phase::RemoteApplied,
                    ];
                    match self.transition(&from, Phase::Connected) {
                        Ok(()) => actions.push(Action::EnterInteractive { label }),
                        Err(err) => actions.push(self.fail(err)),
                    }
                }
            }
            TransportEvent::MessageReceived { label, data } => match ChatFrame::decode(&data) {
                Ok(frame) => actions.push(Action::Display {
                    label,
                    text: frame.message,
                }),
                Err(err) => {
                    warn!(label = %label, error = %err, "dropping undecodable chat frame");
                }
            },
            TransportEvent::ChannelError { label, reason } => {
                actions.push(self.fail(SessionError::Connection(format!(
                    "data channel {label}: {reason}"
                ))));
            }
            TransportEvent::ChannelClosed { label } => {
                info!(label = %label, "data channel closed");
                self.tracker.closed(&label);
                if self.phase == Phase::Connected {
                    actions.push(Action::ChannelClosed { label });
                } else {
                    actions.push(self.fail(SessionError::Connection(format!(
                        "data channel {label} closed before the session connected"
                    ))));
                }
            }
        }
        actions
    }
}
