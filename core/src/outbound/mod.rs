//! Outbound adapters implementing the domain ports, plus the startup
//! backend selection.

pub mod local;
pub mod probe;
pub mod rest;
