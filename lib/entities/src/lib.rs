//! # BrinxAI Bootstrap Client
//!
//! Shared types for the node bootstrapper: the container model the
//! reconciler consumes, the stage table the orchestrator walks, the
//! error taxonomy, and the configuration surfaces.

pub mod entities;
