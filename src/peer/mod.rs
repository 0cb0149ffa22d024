pub mod connection;
pub mod crypto;
pub mod data_channel;
pub mod ice;
pub mod state;
pub mod transport;
pub mod types;

pub use connection::{PeerOptions, WebRtcTransport};
pub use state::{Action, Phase, Session};
pub use transport::{Transport, TransportEvent};
pub use types::{
    CandidateInfo, ChannelPolicy, ChatFrame, ConnectionDescription, ExpectedChannelSet, IceStatus,
    ReachabilityCandidate, Role, SdpKind, ServerConfig,
};
