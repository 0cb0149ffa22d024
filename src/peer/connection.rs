use crate::error::SessionError;
use crate::logger::{dump_candidate, dump_selected_pair};
use crate::peer::data_channel::attach_dc;
use crate::peer::transport::{Transport, TransportEvent};
use crate::peer::types::{
    CandidateInfo, ChannelPolicy, ConnectionDescription, IceStatus, Role, SdpKind, ServerConfig,
};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::{
    api::{setting_engine::SettingEngine, APIBuilder},
    data_channel::{data_channel_init::RTCDataChannelInit, RTCDataChannel},
    ice_transport::ice_server::RTCIceServer,
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        sdp::session_description::RTCSessionDescription, RTCPeerConnection,
    },
};

type ChannelMap = Arc<Mutex<HashMap<String, Arc<RTCDataChannel>>>>;

/// Peer connection options
#[derive(Debug, Clone, Default)]
pub struct PeerOptions {
    pub ice_servers: Vec<ServerConfig>,
    /// Also gather loopback host candidates (same-machine peers).
    pub include_loopback: bool,
}

/// [`Transport`] backed by a `webrtc` peer connection
pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    channels: ChannelMap,
    events: UnboundedSender<TransportEvent>,
}

impl WebRtcTransport {
    /// Build the peer connection and wire its callbacks to the returned event
    /// stream.
    pub async fn new(
        options: &PeerOptions,
    ) -> Result<(Self, UnboundedReceiver<TransportEvent>), SessionError> {
        let (events, rx) = mpsc::unbounded_channel();
        let pc = new_peer(options, &events).await?;
        Ok((
            Self {
                pc,
                channels: Arc::new(Mutex::new(HashMap::new())),
                events,
            },
            rx,
        ))
    }
}

/// Create the peer and forward connection-level callbacks as events.
async fn new_peer(
    options: &PeerOptions,
    events: &UnboundedSender<TransportEvent>,
) -> Result<Arc<RTCPeerConnection>, SessionError> {
    let mut settings = SettingEngine::default();
    if options.include_loopback {
        settings.set_include_loopback_candidate(true);
    }
    let api = APIBuilder::new().with_setting_engine(settings).build();

    let pc = Arc::new(
        api.new_peer_connection(rtc_config(&options.ice_servers))
            .await
            .map_err(|e| SessionError::connection("failed to create peer connection", e))?,
    );

    pc.on_signaling_state_change(Box::new({
        let events = events.clone();
        move |state: RTCSignalingState| {
            let _ = events.send(TransportEvent::SignalingStateChanged(state.to_string()));
            Box::pin(async {})
        }
    }));

    pc.on_ice_gathering_state_change(Box::new({
        let events = events.clone();
        move |state: RTCIceGathererState| {
            let _ = events.send(TransportEvent::IceGatheringStateChanged(format!("{state:?}")));
            Box::pin(async {})
        }
    }));

    pc.on_ice_connection_state_change(Box::new({
        let events = events.clone();
        let pc = Arc::downgrade(&pc);
        move |state: RTCIceConnectionState| {
            let _ = events.send(TransportEvent::IceConnectionStateChanged(ice_status(state)));
            let pc = pc.clone();
            Box::pin(async move {
                if state == RTCIceConnectionState::Connected {
                    if let Some(pc) = pc.upgrade() {
                        dump_selected_pair(&pc, "CONNECTED").await;
                    }
                }
            })
        }
    }));

    pc.on_peer_connection_state_change(Box::new({
        let events = events.clone();
        move |state: RTCPeerConnectionState| {
            let _ = events.send(TransportEvent::PeerConnectionStateChanged(state.to_string()));
            Box::pin(async {})
        }
    }));

    pc.on_ice_candidate(Box::new({
        let events = events.clone();
        move |cand: Option<RTCIceCandidate>| {
            let candidate = match cand {
                Some(c) => match c.to_json() {
                    Ok(init) => {
                        dump_candidate("LOCAL", &init);
                        Some(CandidateInfo {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        })
                    }
                    Err(e) => {
                        debug!(error = %e, "could not serialize local candidate, skipping");
                        return Box::pin(async {});
                    }
                },
                // None marks the end of gathering
                None => None,
            };
            let _ = events.send(TransportEvent::CandidateDiscovered(candidate));
            Box::pin(async {})
        }
    }));

    Ok(pc)
}

fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: servers.iter().map(to_ice_server).collect(),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

fn to_ice_server(config: &ServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: vec![add_ice_url_scheme(config)],
        username: config.username.clone().unwrap_or_default(),
        credential: config.credential.clone().unwrap_or_default(),
    }
}

fn ice_status(state: RTCIceConnectionState) -> IceStatus {
    match state {
        RTCIceConnectionState::New => IceStatus::New,
        RTCIceConnectionState::Checking => IceStatus::Checking,
        RTCIceConnectionState::Connected => IceStatus::Connected,
        RTCIceConnectionState::Completed => IceStatus::Completed,
        RTCIceConnectionState::Disconnected => IceStatus::Disconnected,
        RTCIceConnectionState::Failed => IceStatus::Failed,
        RTCIceConnectionState::Closed => IceStatus::Closed,
        _ => IceStatus::Unspecified,
    }
}

fn to_rtc(desc: ConnectionDescription) -> Result<RTCSessionDescription, SessionError> {
    let parsed = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
    };
    parsed.map_err(|e| SessionError::connection("remote description rejected", e))
}

fn from_rtc(desc: RTCSessionDescription) -> Option<ConnectionDescription> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        _ => return None,
    };
    Some(ConnectionDescription::new(kind, desc.sdp))
}

/// Register an open channel and forward its callbacks.
async fn register_channel(
    channels: &ChannelMap,
    events: &UnboundedSender<TransportEvent>,
    dc: Arc<RTCDataChannel>,
) {
    let label = dc.label().to_string();
    // must be queued ahead of the channel's open event
    let _ = events.send(TransportEvent::ChannelAnnounced {
        label: label.clone(),
    });
    attach_dc(&dc, events);
    channels.lock().await.insert(label, dc);
}

#[async_trait]
impl Transport for WebRtcTransport {
    async fn create_local_description(&self, role: Role) -> Result<(), SessionError> {
        let desc = match role {
            Role::Initiator => {
                info!("creating offer");
                self.pc.create_offer(None).await
            }
            Role::Responder => {
                info!("creating answer");
                self.pc.create_answer(None).await
            }
        }
        .map_err(|e| SessionError::connection("failed to create local description", e))?;

        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| SessionError::connection("failed to set local description", e))
    }

    async fn local_description(&self) -> Option<ConnectionDescription> {
        self.pc.local_description().await.and_then(from_rtc)
    }

    async fn apply_remote_description(&self, desc: ConnectionDescription) -> Result<(), SessionError> {
        info!(kind = ?desc.kind, "applying remote description");
        let desc = to_rtc(desc)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| SessionError::connection("remote description rejected", e))
    }

    async fn open_channel(&self, label: &str, policy: ChannelPolicy) -> Result<(), SessionError> {
        let init = RTCDataChannelInit {
            ordered: Some(policy.ordered),
            max_retransmits: policy.max_retransmits,
            ..Default::default()
        };
        let dc = self
            .pc
            .create_data_channel(label, Some(init))
            .await
            .map_err(|e| SessionError::connection("failed to create data channel", e))?;
        register_channel(&self.channels, &self.events, dc).await;
        Ok(())
    }

    async fn observe_channels(&self) -> Result<(), SessionError> {
        let channels = self.channels.clone();
        let events = self.events.clone();
        self.pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let channels = channels.clone();
            let events = events.clone();
            Box::pin(async move {
                info!(label = %dc.label(), "remote peer opened a data channel");
                register_channel(&channels, &events, dc).await;
            })
        }));
        Ok(())
    }

    async fn send(&self, label: &str, payload: String) -> Result<(), SessionError> {
        let dc = self
            .channels
            .lock()
            .await
            .get(label)
            .cloned()
            .ok_or_else(|| SessionError::Connection(format!("no data channel named {label}")))?;
        dc.send_text(payload)
            .await
            .map(|_| ())
            .map_err(|e| SessionError::connection("send failed", e))
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.pc
            .close()
            .await
            .map_err(|e| SessionError::connection("failed to close peer connection", e))
    }
}
