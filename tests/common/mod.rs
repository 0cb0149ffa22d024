#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use paste_rtc::peer::{
    CandidateInfo, ChannelPolicy, ConnectionDescription, Role, SdpKind, Transport, TransportEvent,
};
use paste_rtc::{MessageSink, SessionController, SessionError, SessionOptions};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Connects two fake transports so that applying the answer "opens" the
/// initiator's channels on both sides and sends are delivered to the peer.
#[derive(Default)]
pub struct FakeNetwork {
    initiator: Mutex<Option<UnboundedSender<TransportEvent>>>,
    responder: Mutex<Option<UnboundedSender<TransportEvent>>>,
    channels: Mutex<Vec<String>>,
}

impl FakeNetwork {
    fn peer_of(&self, role: Role) -> Option<UnboundedSender<TransportEvent>> {
        match role {
            Role::Initiator => self.responder.lock().unwrap().clone(),
            Role::Responder => self.initiator.lock().unwrap().clone(),
        }
    }

    fn connect(&self) {
        let initiator = self.initiator.lock().unwrap().clone();
        let responder = self.responder.lock().unwrap().clone();
        for label in self.channels.lock().unwrap().iter() {
            if let Some(tx) = &responder {
                let _ = tx.send(TransportEvent::ChannelAnnounced { label: label.clone() });
                let _ = tx.send(TransportEvent::ChannelOpened { label: label.clone() });
            }
            if let Some(tx) = &initiator {
                let _ = tx.send(TransportEvent::ChannelOpened { label: label.clone() });
            }
        }
    }
}

#[derive(Default, Debug)]
pub struct FakeState {
    pub local: Option<ConnectionDescription>,
    pub remote: Option<ConnectionDescription>,
    pub candidates: Vec<String>,
    pub channels: Vec<String>,
    pub apply_calls: usize,
    pub create_calls: usize,
    pub local_reads: usize,
    pub observing: bool,
    pub sent: Vec<(String, String)>,
    pub closed: bool,
}

pub struct FakeTransport {
    role: Role,
    events: UnboundedSender<TransportEvent>,
    net: Arc<FakeNetwork>,
    /// When false, gathering never reports completion.
    finish_gathering: bool,
    pub state: Mutex<FakeState>,
}

impl FakeTransport {
    pub fn new(
        role: Role,
        net: Arc<FakeNetwork>,
    ) -> (Arc<Self>, UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        match role {
            Role::Initiator => *net.initiator.lock().unwrap() = Some(tx.clone()),
            Role::Responder => *net.responder.lock().unwrap() = Some(tx.clone()),
        }
        let transport = Self {
            role,
            events: tx,
            net,
            finish_gathering: true,
            state: Mutex::new(FakeState::default()),
        };
        (Arc::new(transport), rx)
    }

    pub fn stalled(role: Role) -> (Arc<Self>, UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            role,
            events: tx,
            net: Arc::new(FakeNetwork::default()),
            finish_gathering: false,
            state: Mutex::new(FakeState::default()),
        };
        (Arc::new(transport), rx)
    }

    /// Push an event as if the transport had produced it.
    pub fn inject(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    pub fn apply_calls(&self) -> usize {
        self.state.lock().unwrap().apply_calls
    }

    pub fn local_reads(&self) -> usize {
        self.state.lock().unwrap().local_reads
    }

    fn emit_candidate(&self, candidate: &str) {
        self.state.lock().unwrap().candidates.push(candidate.to_string());
        self.inject(TransportEvent::CandidateDiscovered(Some(CandidateInfo {
            candidate: candidate.to_string(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        })));
    }
}

fn base_sdp(role: Role) -> String {
    let fingerprint = match role {
        Role::Initiator => "AA:AA:AA:AA",
        Role::Responder => "BB:BB:BB:BB",
    };
    format!(
        "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\na=fingerprint:sha-256 {fingerprint}\r\n"
    )
}

#[async_trait]
impl Transport for FakeTransport {
    async fn create_local_description(&self, role: Role) -> Result<(), SessionError> {
        let kind = SdpKind::for_role(role);
        {
            let mut state = self.state.lock().unwrap();
            state.create_calls += 1;
            if kind == SdpKind::Answer && state.remote.is_none() {
                return Err(SessionError::Connection("no remote offer to answer".into()));
            }
            state.local = Some(ConnectionDescription::new(kind, base_sdp(self.role)));
        }

        let signaling = match kind {
            SdpKind::Offer => "have-local-offer",
            SdpKind::Answer => "stable",
        };
        self.inject(TransportEvent::SignalingStateChanged(signaling.into()));
        self.inject(TransportEvent::IceGatheringStateChanged("gathering".into()));
        self.emit_candidate("candidate:1 1 udp 2130706431 192.168.1.10 50000 typ host");
        self.emit_candidate(
            "candidate:2 1 udp 1694498815 203.0.113.7 41000 typ srflx raddr 0.0.0.0 rport 0",
        );
        if self.finish_gathering {
            self.inject(TransportEvent::CandidateDiscovered(None));
            self.inject(TransportEvent::IceGatheringStateChanged("complete".into()));
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<ConnectionDescription> {
        let mut state = self.state.lock().unwrap();
        state.local_reads += 1;
        let local = state.local.clone()?;
        let mut sdp = local.sdp;
        for candidate in &state.candidates {
            sdp.push_str(&format!("a={candidate}\r\n"));
        }
        Some(ConnectionDescription::new(local.kind, sdp))
    }

    async fn apply_remote_description(&self, desc: ConnectionDescription) -> Result<(), SessionError> {
        let connect = {
            let mut state = self.state.lock().unwrap();
            state.apply_calls += 1;
            match desc.kind {
                SdpKind::Offer if state.local.is_some() => {
                    return Err(SessionError::Connection("offer applied in have-local-offer".into()))
                }
                SdpKind::Answer
                    if state.local.as_ref().map(|l| l.kind) != Some(SdpKind::Offer) =>
                {
                    return Err(SessionError::Connection(
                        "answer applied without a local offer".into(),
                    ))
                }
                _ => {}
            }
            let connect = desc.kind == SdpKind::Answer;
            state.remote = Some(desc);
            connect
        };
        if connect {
            self.net.connect();
        }
        Ok(())
    }

    async fn open_channel(&self, label: &str, _policy: ChannelPolicy) -> Result<(), SessionError> {
        self.state.lock().unwrap().channels.push(label.to_string());
        if self.role == Role::Initiator {
            self.net.channels.lock().unwrap().push(label.to_string());
        }
        self.inject(TransportEvent::ChannelAnnounced {
            label: label.to_string(),
        });
        Ok(())
    }

    async fn observe_channels(&self) -> Result<(), SessionError> {
        self.state.lock().unwrap().observing = true;
        Ok(())
    }

    async fn send(&self, label: &str, payload: String) -> Result<(), SessionError> {
        self.state
            .lock()
            .unwrap()
            .sent
            .push((label.to_string(), payload.clone()));
        let Some(peer) = self.net.peer_of(self.role) else {
            return Err(SessionError::Connection("no peer".into()));
        };
        peer.send(TransportEvent::MessageReceived {
            label: label.to_string(),
            data: Bytes::from(payload),
        })
        .map_err(|_| SessionError::Connection("peer is gone".into()))
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.state.lock().unwrap().closed = true;
        if let Some(peer) = self.net.peer_of(self.role) {
            for label in self.net.channels.lock().unwrap().iter() {
                let _ = peer.send(TransportEvent::ChannelClosed { label: label.clone() });
            }
        }
        Ok(())
    }
}

/// Records every displayed message
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub messages: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl MessageSink for RecordingSink {
    fn show_message(&mut self, label: &str, text: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((label.to_string(), text.to_string()));
    }
}

pub struct Peer {
    pub controller: SessionController<FakeTransport>,
    pub transport: Arc<FakeTransport>,
    pub sink: RecordingSink,
}

pub fn peer(role: Role, net: &Arc<FakeNetwork>) -> Peer {
    peer_with(role, net, SessionOptions::default())
}

pub fn peer_with(role: Role, net: &Arc<FakeNetwork>, options: SessionOptions) -> Peer {
    let (transport, events) = FakeTransport::new(role, net.clone());
    let sink = RecordingSink::default();
    let controller = SessionController::new(
        role,
        transport.clone(),
        events,
        options,
        Box::new(sink.clone()),
    );
    Peer {
        controller,
        transport,
        sink,
    }
}

pub fn pair() -> (Peer, Peer) {
    let net = Arc::new(FakeNetwork::default());
    (peer(Role::Initiator, &net), peer(Role::Responder, &net))
}
