//! Configuration subsystem.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, ApiCredential, AuthConfig, CsrfConfig, FingerprintConfig, GatewayConfig,
    ListenerConfig, ObservabilityConfig, RateLimitConfig, RatePolicyConfig, RouteRatePolicy,
    SecurityConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
