//! # Middleware Stack
//!
//! Tower middleware for the API layer:
//! - [`metrics`]: per-route request counts and latency through the
//!   `metrics` facade.
//!
//! Bearer authentication lives in [`crate::auth::auth_middleware`].

pub mod metrics;
