//! Auraprobe - Lightning/Aura object exposure scanner
//!
//! Replays a captured Aura request to enumerate and retrieve the objects a
//! community site exposes, and mines captured traffic for routes and action
//! descriptors. The scan core (bounded pattern execution, balanced
//! extraction, the cancellable orchestrator and result accumulation) is
//! usable on its own.

pub mod actions;
pub mod app;
pub mod aura;
pub mod capture;
pub mod error;
pub mod extract;
pub mod http;
pub mod mining;
pub mod pattern;
pub mod results;
pub mod scan;
pub mod scope;
pub mod sfid;
pub mod wordlist;

pub use error::*;
