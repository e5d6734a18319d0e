//! Per-peer offer/answer negotiation and ICE candidate buffering.

mod coordinator;
mod ice_buffer;


pub use coordinator::{NegotiationEvent, NegotiationOutcome, Negotiator, PeerSession};
pub use ice_buffer::{CandidateBuffer, FlushReport};
