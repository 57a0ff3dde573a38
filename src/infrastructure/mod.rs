//! Infrastructure layer.
//!
//! Configuration loading, component wiring and the long-running entry
//! points. No trading rules live here.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation
//! - [`runtime`] - Trading loop and login server lifecycles

pub mod bootstrap;
pub mod config;
pub mod runtime;
