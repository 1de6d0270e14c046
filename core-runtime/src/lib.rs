//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the keypad audio core:
//! - Logging and tracing infrastructure
//! - Bridge configuration
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the catalog and the service
//! façade depend on. It establishes the logging conventions, the bridge wiring
//! and the event broadcasting used throughout the workspace.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
