//! Request Defense Gateway
//!
//! A composite request-defense layer for an HTTP API, built with Tokio
//! and Axum. Three cooperating components run per inbound request:
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │              DEFENSE GATEWAY                 │
//!                        │                                              │
//!     Client Request     │  ┌──────────┐   ┌───────────┐   ┌─────────┐ │
//!     ───────────────────┼─▶│   rate   │──▶│   csrf    │──▶│ handler │ │
//!                        │  │ limiter  │   │   guard   │   │  layer  │ │
//!                        │  └──────────┘   └───────────┘   └────┬────┘ │
//!                        │       429            401/403         │      │
//!                        │                                      ▼      │
//!                        │                           ┌──────────────┐  │
//!     Client Response    │  ┌──────────────────┐     │ fingerprint  │  │
//!     ◀──────────────────┼──│ security headers │◀────│   registry   │  │
//!                        │  └──────────────────┘     └──────────────┘  │
//!                        │                                              │
//!                        │  ┌────────────────────────────────────────┐ │
//!                        │  │          Cross-Cutting Concerns        │ │
//!                        │  │  ┌────────┐ ┌───────────────┐ ┌──────┐ │ │
//!                        │  │  │ config │ │ observability │ │ auth │ │ │
//!                        │  │  └────────┘ └───────────────┘ └──────┘ │ │
//!                        │  └────────────────────────────────────────┘ │
//!                        └──────────────────────────────────────────────┘
//! ```
//!
//! The rate limiter runs outermost (cheapest, most universal), then the
//! CSRF guard for state-changing requests, then the routed handlers,
//! including the device fingerprint/session endpoints. The components
//! share only the request's identifying attributes; none depends on
//! another.

// Core subsystems
pub mod config;
pub mod fingerprint;
pub mod http;
pub mod security;

// Cross-cutting concerns
pub mod clock;
pub mod observability;

pub use config::GatewayConfig;
pub use http::HttpServer;
