//! Shared fixtures for the end-to-end tests

pub mod api_fixtures;
pub mod test_server;

#[allow(unused_imports)]
pub use api_fixtures::{ApiFixtures, ADMIN, ALICE, BOB, WORKER};
#[allow(unused_imports)]
pub use test_server::TestServer;
