//! # Core Runtime Module
//!
//! Wires adapters together for the application core:
//! - Adapter configuration loaded from JSON and merged over defaults
//! - Capability detection and adapter recommendation
//! - The adapter factory producing an [`AdapterSuite`]
//! - Logging and tracing bootstrap
//!
//! ## Overview
//!
//! Hosts describe what they bring in [`HostBridges`], pick or detect an
//! [`AdapterConfig`], and receive one trait object per domain. Nothing above
//! this crate names a concrete adapter type.

pub mod config;
pub mod detector;
pub mod error;
pub mod factory;
pub mod logging;

pub use config::{AdapterConfig, AdapterDefaults};
pub use detector::{recommend, Capability, CapabilityDetector, CapabilityReport, EnvironmentKind};
pub use error::{Error, Result};
pub use factory::{AdapterFactory, AdapterSuite, HostBridges};
