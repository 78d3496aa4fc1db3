//! Shared types for the intent relayer.
//!
//! Everything that crosses a crate boundary lives here: the two intent
//! flavours, the error taxonomy each pipeline stage reports, the dedup
//! registry, delivery receipts and the events published on the bus.

pub mod delivery;
pub mod errors;
pub mod events;
pub mod intent;
pub mod registry;
pub mod validation;

pub use delivery::*;
pub use errors::*;
pub use events::*;
pub use intent::*;
pub use registry::*;
pub use validation::*;

/// Re-exported so downstream crates name the same primitive types.
pub use alloy::primitives::{Address, Bytes, B256, U256};
