//! Workspace placeholder crate.
//!
//! This crate exposes shared feature flags that map to the individual
//! workspace crates (`core-decode`, `core-runtime`, `bridge-software`).
//! Host applications can depend on `codec-workspace` and enable the documented
//! features without needing to wire each crate individually.

#[cfg(feature = "decode")]
pub use core_decode;

#[cfg(feature = "decode")]
pub use core_runtime;

#[cfg(feature = "software-bridge")]
pub use bridge_software;
