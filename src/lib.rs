//! Workspace umbrella crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-catalog`). Host firmware and desktop
//! simulators can depend on `keypad-audio-workspace` and enable the documented
//! features without needing to wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_catalog as catalog;
#[cfg(feature = "desktop-shims")]
pub use core_service as service;
