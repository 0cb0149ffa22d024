use crate::peer::types::{CandidateInfo, ReachabilityCandidate};
use tracing::{debug, info, warn};

/// What the gate did with one candidate event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Candidate counted towards the pending description.
    Recorded,
    /// End-of-candidates marker; the finalized description may be released.
    Completed,
    /// Spurious marker, or a candidate that arrived after completion.
    Ignored,
}

/// Holds back the local description until trickle gathering has finished,
/// so each side needs exactly one paste.
///
/// Fires once per armed attempt; later end markers are ignored.
#[derive(Debug, Default)]
pub struct GatheringGate {
    armed: bool,
    fired: bool,
    candidates: Vec<CandidateInfo>,
}

impl GatheringGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching a local-description attempt.
    pub fn arm(&mut self) {
        self.armed = true;
        self.fired = false;
        self.candidates.clear();
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Candidates recorded before the gate fired
    pub fn candidates(&self) -> &[CandidateInfo] {
        &self.candidates
    }

    pub fn observe(&mut self, candidate: ReachabilityCandidate) -> GateOutcome {
        match candidate {
            Some(c) if self.fired => {
                warn!(candidate = %c.candidate, "candidate arrived after gathering completed, not in the exchanged description");
                GateOutcome::Ignored
            }
            Some(c) => {
                debug!(
                    candidate = %c.candidate,
                    sdp_mid = ?c.sdp_mid,
                    sdp_mline_index = ?c.sdp_mline_index,
                    "local candidate"
                );
                self.candidates.push(c);
                GateOutcome::Recorded
            }
            None if !self.armed => {
                debug!("end-of-candidates before any local description, ignoring");
                GateOutcome::Ignored
            }
            None if self.fired => {
                debug!("duplicate end-of-candidates marker, ignoring");
                GateOutcome::Ignored
            }
            None => {
                self.fired = true;
                info!(count = self.candidates.len(), "ICE candidate gathering completed");
                GateOutcome::Completed
            }
        }
    }
}

/// Candidate counts by type
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSummary {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

pub fn analyze_candidates(candidates: &[CandidateInfo]) -> CandidateSummary {
    let mut summary = CandidateSummary::default();

    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            summary.host += 1;
        } else if candidate.candidate.contains("typ srflx") {
            summary.srflx += 1;
        } else if candidate.candidate.contains("typ relay") {
            summary.relay += 1;
        }
    }

    info!(
        host = summary.host,
        srflx = summary.srflx,
        relay = summary.relay,
        "candidate analysis"
    );

    if summary.srflx == 0 && summary.relay == 0 {
        warn!("no server-reflexive or relay candidates; peers behind different NATs may not connect");
    }
    summary
}
