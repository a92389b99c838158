//! # Ports Layer
//!
//! Port traits of the tiered storage engine.
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving port (API exposed to the block producer)
//! - `outbound.rs` - Driven ports (metadata store, filesystem statistics,
//!   cold backends, clock)

pub mod inbound;
pub mod outbound;
