//! Adapters
//!
//! `inbound` drives the application (HTTP API); `outbound` implements the
//! domain ports (socket client, cache stores, metadata client, clock).

pub mod inbound;
pub mod outbound;
