//! Peer session lifecycle.
//!
//! Every remote participant gets its own task that exclusively owns that
//! pair's [`Negotiator`](crate::negotiation::Negotiator). The room talks to
//! it only through messages, and tears it down by aborting the task and
//! closing the connection.

mod lifecycle;
mod task;

pub(crate) use lifecycle::{PeerContext, PeerSet};
pub(crate) use task::{PeerInput, PeerNotice};
