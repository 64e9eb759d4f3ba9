//! Headless client for the astronomical-event monitoring dashboard.
//!
//! The [`dashboard::Dashboard`] context owns the state store, the animated
//! widgets, and a virtual-time scheduler. The `astrowatch` binary drives it
//! on wall-clock time; tests drive it directly.

/// Outbound user actions (synthetic data, chat).
pub mod actions;
/// Typed backend endpoints and the fetcher seam.
pub mod api;
/// Application directory helpers.
pub mod app_dirs;
/// Live Earth imagery carousel.
pub mod carousel;
/// TOML settings.
pub mod config;
/// Dashboard context and task wiring.
pub mod dashboard;
/// Shared HTTP agent and response handling.
pub mod http_client;
/// ZTF/TESS stream terminals.
pub mod log_stream;
/// Tracing setup.
pub mod logging;
/// Wire payload types.
pub mod model;
/// Pipeline progress animation.
pub mod pipeline;
/// Virtual-time scheduler.
pub mod scheduler;
/// Bearer token storage.
pub mod session;
/// Confidence simulation.
pub mod simulator;
/// Solar flux readout.
pub mod solar;
/// State store and refresh.
pub mod store;
/// Display projections.
pub mod view;
