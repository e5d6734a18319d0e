//! Remote ICE candidates that arrived before a remote description.

use std::collections::VecDeque;

use tracing::warn;

use crate::media::PeerConnection;
use crate::protocol::IceCandidate;

/// Outcome of draining the buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub applied: usize,
    pub failed: usize,
}

/// FIFO of candidates waiting for a remote description.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    queue: VecDeque<IceCandidate>,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, candidate: IceCandidate) {
        self.queue.push_back(candidate);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Apply every queued candidate in arrival order and empty the queue.
    ///
    /// No-op while the connection has no remote description. Each candidate
    /// is attempted exactly once; failures are logged and dropped.
    pub async fn flush(&mut self, connection: &dyn PeerConnection) -> FlushReport {
        let mut report = FlushReport::default();
        if !connection.has_remote_description() {
            return report;
        }

        while let Some(candidate) = self.queue.pop_front() {
            match connection.add_ice_candidate(candidate).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!(error = %e, "Buffered ICE candidate rejected");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
