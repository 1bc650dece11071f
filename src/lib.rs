#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the ordergate application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod errors;
pub mod handlers;
pub mod oidc;
pub mod order;
pub mod publisher;
pub mod session;
pub mod settings;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use errors::{AuthError, OrderError, PipelineError, PublishError};
pub use oidc::{IdTokenVerifier, ProviderClient};
pub use order::OrderRecord;
pub use publisher::{NatsPublisher, OrderPublisher};
pub use settings::Settings;
