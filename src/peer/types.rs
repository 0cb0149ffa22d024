use serde::{Deserialize, Serialize};

/// Which end of the offer/answer exchange this process drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl SdpKind {
    /// Kind of local description the given role produces
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Initiator => SdpKind::Offer,
            Role::Responder => SdpKind::Answer,
        }
    }
}

/// Session description exchanged by hand, same JSON shape as a browser's
/// `RTCSessionDescription`: `{"type":"offer","sdp":"v=0..."}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl ConnectionDescription {
    pub fn new(kind: SdpKind, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }

    /// `a=fingerprint:` lines carried by the SDP
    pub fn fingerprints(&self) -> Vec<&str> {
        self.sdp
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("a=fingerprint:"))
            .collect()
    }
}

/// One gathered network path. `None` in a `CandidateDiscovered` event is the
/// end-of-candidates marker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CandidateInfo {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

pub type ReachabilityCandidate = Option<CandidateInfo>;

/// Delivery policy of a data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub ordered: bool,
    pub max_retransmits: Option<u16>,
}

impl ChannelPolicy {
    /// Ordered, never retransmitted: each frame is tried once.
    pub const BEST_EFFORT_ONCE: ChannelPolicy = ChannelPolicy {
        ordered: true,
        max_retransmits: Some(0),
    };
}

/// Channels that must be open before the chat starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedChannelSet {
    channels: Vec<(String, ChannelPolicy)>,
}

impl ExpectedChannelSet {
    pub fn single(label: impl Into<String>) -> Self {
        Self {
            channels: vec![(label.into(), ChannelPolicy::BEST_EFFORT_ONCE)],
        }
    }

    /// Labels must be unique; a repeated label keeps its first policy.
    pub fn with_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = (S, ChannelPolicy)>,
        S: Into<String>,
    {
        let mut set = Self {
            channels: Vec::new(),
        };
        for (label, policy) in channels {
            let label = label.into();
            if !set.contains(&label) {
                set.channels.push((label, policy));
            }
        }
        set
    }

    pub fn contains(&self, label: &str) -> bool {
        self.channels.iter().any(|(l, _)| l == label)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ChannelPolicy)> {
        self.channels.iter().map(|(l, p)| (l.as_str(), *p))
    }
}

/// Wire frame of one chat message
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatFrame {
    pub message: String,
}

impl ChatFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// ICE server configuration
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub r#type: String, // 'stun' or 'turn'
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// ICE connection state as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceStatus {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
    Unspecified,
}
