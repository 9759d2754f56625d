//! Fiver: a local, append-only file versioning store.
//!
//! Each revision of a tracked file is persisted as a compact delta
//! against the reconstructed previous revision.  The crate provides:
//! - The delta engine (`engine`, `hash`, `delta`): three-strategy
//!   differencing and chain reconstruction
//! - The on-disk record codecs (`wire`)
//! - The flat-directory version store (`store`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use fiver::engine;
//!
//! let previous = b"Hello World";
//! let current = b"Hello World Updated";
//!
//! let delta = engine::build_delta(previous, current);
//! let rebuilt = engine::apply_delta(&delta, previous).unwrap();
//! assert_eq!(rebuilt, current);
//! assert_eq!(delta.delta_size(), 8); // only " Updated" is stored
//! ```

pub mod delta;
pub mod engine;
pub mod hash;
pub mod store;
pub mod wire;

#[cfg(feature = "cli")]
pub mod cli;
