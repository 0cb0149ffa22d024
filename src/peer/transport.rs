use crate::error::SessionError;
use crate::peer::types::{ChannelPolicy, ConnectionDescription, IceStatus, ReachabilityCandidate, Role};
use async_trait::async_trait;
use bytes::Bytes;

/// Everything the transport reports back. Callbacks never touch session
/// state directly; they queue one of these for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    SignalingStateChanged(String),
    IceConnectionStateChanged(IceStatus),
    IceGatheringStateChanged(String),
    PeerConnectionStateChanged(String),
    CandidateDiscovered(ReachabilityCandidate),
    /// A channel exists locally, created by us or announced by the peer.
    ChannelAnnounced { label: String },
    ChannelOpened { label: String },
    MessageReceived { label: String, data: Bytes },
    ChannelError { label: String, reason: String },
    ChannelClosed { label: String },
}

/// Capability set of the underlying transport/encryption/ICE engine.
///
/// Implementations deliver their asynchronous notifications through the
/// `TransportEvent` sender they were built with.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create the offer (initiator) or answer (responder) and install it as the
    /// local description. Candidate events follow asynchronously.
    async fn create_local_description(&self, role: Role) -> Result<(), SessionError>;

    /// Current local description, including every candidate gathered so far.
    async fn local_description(&self) -> Option<ConnectionDescription>;

    async fn apply_remote_description(&self, desc: ConnectionDescription) -> Result<(), SessionError>;

    /// Declare a channel. Must happen before the offer is created.
    async fn open_channel(&self, label: &str, policy: ChannelPolicy) -> Result<(), SessionError>;

    /// Start reporting channels opened by the remote peer.
    async fn observe_channels(&self) -> Result<(), SessionError>;

    /// Fire-and-forget text send on an open channel.
    async fn send(&self, label: &str, payload: String) -> Result<(), SessionError>;

    async fn close(&self) -> Result<(), SessionError>;
}
