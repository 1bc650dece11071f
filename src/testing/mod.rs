//! Test utilities: fixtures and mock implementations shared by unit and
//! integration tests. Compiled only for tests or with the `testing`
//! feature enabled.

pub mod fixtures;
pub mod mock;

pub use fixtures::{test_claims, test_provider_client, test_settings, TestKey, TEST_KEY_ID};
pub use mock::{FailingPublisher, RecordingPublisher};
