use crate::peer::transport::TransportEvent;
use crate::peer::types::ExpectedChannelSet;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use webrtc::data_channel::{data_channel_message::DataChannelMessage, RTCDataChannel};

/// Counts expected channels that reached "open" and releases interactive
/// mode exactly once.
///
/// The side that created the channels matches them by label. The side that
/// receives them cannot know the peer's labels up front, so it counts every
/// announced channel towards the expected size.
#[derive(Debug)]
pub struct ReadinessTracker {
    expected: ExpectedChannelSet,
    pending: BTreeSet<String>,
    ready: BTreeSet<String>,
    closed: BTreeSet<String>,
    count_announced: bool,
    fired: bool,
}

impl ReadinessTracker {
    /// Only labels in `expected` count.
    pub fn new(expected: ExpectedChannelSet) -> Self {
        Self {
            expected,
            pending: BTreeSet::new(),
            ready: BTreeSet::new(),
            closed: BTreeSet::new(),
            count_announced: false,
            fired: false,
        }
    }

    /// Any channel the peer announced counts, whatever its label.
    pub fn counting_announced(expected: ExpectedChannelSet) -> Self {
        Self {
            count_announced: true,
            ..Self::new(expected)
        }
    }

    fn counts(&self, label: &str) -> bool {
        self.expected.contains(label)
            || (self.count_announced && (self.pending.contains(label) || self.ready.contains(label)))
    }

    pub fn expected(&self) -> &ExpectedChannelSet {
        &self.expected
    }

    /// Channel created locally or announced by the peer, not yet open.
    pub fn announce(&mut self, label: &str) {
        if self.ready.contains(label) || self.closed.contains(label) {
            return;
        }
        self.pending.insert(label.to_string());
    }

    /// Returns the label that completed the expected set, the one time it
    /// happens.
    pub fn opened(&mut self, label: &str) -> Option<String> {
        if !self.counts(label) {
            warn!(label, "unexpected data channel opened, not counted");
            return None;
        }
        if self.closed.contains(label) {
            debug!(label, "open event for a closed channel, ignoring");
            return None;
        }
        self.pending.remove(label);
        if !self.ready.insert(label.to_string()) {
            debug!(label, "channel already open");
            return None;
        }
        if self.fired || self.ready.len() != self.expected.len() {
            return None;
        }
        self.fired = true;
        Some(label.to_string())
    }

    pub fn closed(&mut self, label: &str) {
        self.pending.remove(label);
        self.ready.remove(label);
        self.closed.insert(label.to_string());
    }

    pub fn all_ready(&self) -> bool {
        self.fired
    }

    pub fn is_pending(&self, label: &str) -> bool {
        self.pending.contains(label)
    }

    pub fn is_ready(&self, label: &str) -> bool {
        self.ready.contains(label)
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }
}

/// Forward every callback of a data channel to the session as events.
pub fn attach_dc(dc: &Arc<RTCDataChannel>, events: &UnboundedSender<TransportEvent>) {
    let label = dc.label().to_string();
    debug!(label = %label, id = dc.id(), "attaching data channel handlers");

    dc.on_open(Box::new({
        let events = events.clone();
        let label = label.clone();
        move || {
            debug!(label = %label, "data channel opened");
            let _ = events.send(TransportEvent::ChannelOpened { label });
            Box::pin(async {})
        }
    }));

    dc.on_message(Box::new({
        let events = events.clone();
        let label = label.clone();
        move |msg: DataChannelMessage| {
            debug!(label = %label, len = msg.data.len(), "received message");
            let _ = events.send(TransportEvent::MessageReceived {
                label: label.clone(),
                data: msg.data,
            });
            Box::pin(async {})
        }
    }));

    dc.on_error(Box::new({
        let events = events.clone();
        let label = label.clone();
        move |err: webrtc::Error| {
            let _ = events.send(TransportEvent::ChannelError {
                label: label.clone(),
                reason: err.to_string(),
            });
            Box::pin(async {})
        }
    }));

    dc.on_close(Box::new({
        let events = events.clone();
        move || {
            debug!(label = %label, "data channel closed");
            let _ = events.send(TransportEvent::ChannelClosed {
                label: label.clone(),
            });
            Box::pin(async {})
        }
    }));
}
