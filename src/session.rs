use crate::error::SessionError;
use crate::peer::crypto::verification_code;
use crate::peer::state::{Action, Phase, Session};
use crate::peer::transport::{Transport, TransportEvent};
use crate::peer::types::{ChatFrame, ConnectionDescription, ExpectedChannelSet, Role, SdpKind};
use crate::signaling::parse_description;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

/// Where received chat messages end up
pub trait MessageSink: Send {
    fn show_message(&mut self, label: &str, text: &str);
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub expected: ExpectedChannelSet,
    /// Give up on candidate gathering after this long.
    pub gather_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            expected: ExpectedChannelSet::single("chat"),
            gather_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// What one drained transport event led to
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub publish_local: bool,
    pub interactive: Option<String>,
    pub closed: Option<String>,
}

/// Drives one [`Session`] against a [`Transport`].
///
/// The controller is the only owner of session state. Transport callbacks
/// reach it as queued [`TransportEvent`]s, drained one at a time.
pub struct SessionController<T: Transport> {
    transport: Arc<T>,
    events: UnboundedReceiver<TransportEvent>,
    session: Session,
    sink: Box<dyn MessageSink>,
    gather_timeout: Option<Duration>,
    interactive: Option<String>,
}

impl<T: Transport> SessionController<T> {
    pub fn new(
        role: Role,
        transport: Arc<T>,
        events: UnboundedReceiver<TransportEvent>,
        options: SessionOptions,
        sink: Box<dyn MessageSink>,
    ) -> Self {
        Self {
            transport,
            events,
            session: Session::new(role, options.expected),
            sink,
            gather_timeout: options.gather_timeout,
            interactive: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Label of the channel the chat runs on, once connected
    pub fn interactive_label(&self) -> Option<&str> {
        self.interactive.as_deref()
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        match self.session.fail(err) {
            Action::Fail(err) => err,
            _ => SessionError::Connection("session failed".into()),
        }
    }

    /// Declare the expected channels, then request the offer.
    ///
    /// Channels have to exist before the offer is created or the peer's side
    /// of the channel never leaves "connecting".
    pub async fn start_as_initiator(&mut self) -> Result<(), SessionError> {
        if self.session.role() != Role::Initiator || self.session.phase() != Phase::Idle {
            return Err(SessionError::Connection(format!(
                "cannot start as initiator: {:?} session is {:?}",
                self.session.role(),
                self.session.phase()
            )));
        }
        let channels: Vec<_> = self
            .session
            .expected()
            .iter()
            .map(|(label, policy)| (label.to_string(), policy))
            .collect();
        for (label, policy) in channels {
            if let Err(err) = self.transport.open_channel(&label, policy).await {
                return Err(self.fail(err));
            }
            self.session.channel_declared(&label);
        }

        self.session.begin_offer()?;
        if let Err(err) = self.transport.create_local_description(Role::Initiator).await {
            return Err(self.fail(err));
        }
        self.session.local_description_created()
    }

    /// Apply a pasted offer and request the answer.
    ///
    /// Pasted text that does not parse fails before the transport sees
    /// anything.
    pub async fn start_as_responder(&mut self, remote_offer_text: &str) -> Result<(), SessionError> {
        let offer = parse_description(remote_offer_text)?;
        if offer.kind != SdpKind::Offer {
            return Err(SessionError::MalformedInput(
                "expected an offer but an answer was pasted".into(),
            ));
        }
        if self.session.role() != Role::Responder || self.session.phase() != Phase::Idle {
            return Err(SessionError::Connection(format!(
                "cannot start as responder: {:?} session is {:?}",
                self.session.role(),
                self.session.phase()
            )));
        }

        if let Err(err) = self.transport.apply_remote_description(offer.clone()).await {
            return Err(self.fail(err));
        }
        self.session.remote_offer_applied(offer)?;
        if let Err(err) = self.transport.observe_channels().await {
            return Err(self.fail(err));
        }

        self.session.begin_answer()?;
        if let Err(err) = self.transport.create_local_description(Role::Responder).await {
            return Err(self.fail(err));
        }
        self.session.local_description_created()
    }

    /// Initiator: apply the answer pasted back by the peer.
    pub async fn complete_with_answer(&mut self, remote_answer_text: &str) -> Result<(), SessionError> {
        let answer = parse_description(remote_answer_text)?;
        if !self.session.can_accept_answer() {
            return Err(SessionError::Connection(format!(
                "no local offer to answer ({:?} session is {:?})",
                self.session.role(),
                self.session.phase()
            )));
        }
        if answer.kind != SdpKind::Answer {
            return Err(self.fail(SessionError::Connection(
                "expected an answer but an offer was pasted".into(),
            )));
        }
        if let Err(err) = self.transport.apply_remote_description(answer.clone()).await {
            return Err(self.fail(err));
        }
        self.session.remote_answer_applied(answer)
    }

    /// Drain one transport event. Messages go straight to the sink and
    /// failures come back as errors.
    pub async fn pump(&mut self) -> Result<Progress, SessionError> {
        let Some(event) = self.events.recv().await else {
            return Err(self.fail(SessionError::Connection(
                "transport event stream ended".into(),
            )));
        };

        let mut progress = Progress::default();
        for action in self.session.handle(event) {
            match action {
                Action::PublishLocalDescription => progress.publish_local = true,
                Action::EnterInteractive { label } => {
                    self.interactive = Some(label.clone());
                    progress.interactive = Some(label);
                }
                Action::Display { label, text } => self.sink.show_message(&label, &text),
                Action::ChannelClosed { label } => progress.closed = Some(label),
                Action::Fail(err) => return Err(err),
            }
        }
        Ok(progress)
    }

    /// Wait for gathering to finish and return the finalized local
    /// description, candidates included.
    pub async fn wait_for_local_description(&mut self) -> Result<ConnectionDescription, SessionError> {
        if let Some(local) = self.session.local_description() {
            return Ok(local.clone());
        }
        if self.session.phase() != Phase::GatheringCandidates {
            return Err(SessionError::Connection(format!(
                "no local description is being created ({:?})",
                self.session.phase()
            )));
        }

        match self.gather_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.pump_until_gathered()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(self.fail(SessionError::Connection(format!(
                        "candidate gathering did not complete within {}s",
                        limit.as_secs()
                    ))))
                }
            },
            None => self.pump_until_gathered().await?,
        }

        let Some(desc) = self.transport.local_description().await else {
            return Err(self.fail(SessionError::Connection(
                "transport has no local description after gathering".into(),
            )));
        };
        self.session.local_description_finalized(desc.clone())?;
        info!(kind = ?desc.kind, "local description ready");
        Ok(desc)
    }

    async fn pump_until_gathered(&mut self) -> Result<(), SessionError> {
        loop {
            if self.pump().await?.publish_local {
                return Ok(());
            }
        }
    }

    /// The finalized description was shown to the operator.
    pub fn local_description_delivered(&mut self) -> Result<(), SessionError> {
        self.session.local_description_delivered()
    }

    /// Wait until every expected channel is open. Returns the chat channel.
    pub async fn wait_until_connected(&mut self) -> Result<String, SessionError> {
        loop {
            if let Some(label) = &self.interactive {
                return Ok(label.clone());
            }
            self.pump().await?;
        }
    }

    /// Frame and send one chat line on the interactive channel.
    pub async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        let Some(label) = self.interactive.as_deref() else {
            return Err(SessionError::Connection("not connected yet".into()));
        };
        let frame = ChatFrame::new(text)
            .encode()
            .map_err(|e| SessionError::connection("failed to encode message", e))?;
        debug!(label, len = frame.len(), "sending message");
        self.transport.send(label, frame).await
    }

    /// Short code both operators can compare once connected.
    pub fn verification_code(&self) -> Option<String> {
        let local = self.session.local_description()?;
        let remote = self.session.remote_description()?;
        verification_code(local, remote)
    }

    pub async fn close(&self) -> Result<(), SessionError> {
        self.transport.close().await
    }
}
