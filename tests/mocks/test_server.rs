//! Test server for end-to-end tests
//!
//! Runs the full router on an ephemeral port over a `MemoryStore` the test
//! keeps a handle to, so it can seed or inspect state directly.

use axum::Router;
use job_broker::client::BrokerClient;
use job_broker::{BrokerBuilder, MemoryStore, Settings};
use tokio::task::JoinHandle;

use super::api_fixtures::Identity;

pub struct TestServer {
	pub base_url: String,
	/// Shares state with the running server
	#[allow(dead_code)]
	pub store: MemoryStore,
	pub handle: JoinHandle<()>,
}

impl TestServer {
	/// Spawn a test server with default settings
	pub async fn spawn() -> Result<Self, Box<dyn std::error::Error>> {
		Self::spawn_with_settings(Settings::default()).await
	}

	pub async fn spawn_with_settings(
		settings: Settings,
	) -> Result<Self, Box<dyn std::error::Error>> {
		let store = MemoryStore::new();
		let (app, _state) = BrokerBuilder::new()
			.with_settings(settings)
			.with_storage(store.clone())
			.start()
			.await?;

		Self::spawn_server_with_app(app, store).await
	}

	async fn spawn_server_with_app(
		app: Router,
		store: MemoryStore,
	) -> Result<Self, Box<dyn std::error::Error>> {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
		let addr = listener.local_addr()?;
		let base_url = format!("http://{}:{}", addr.ip(), addr.port());

		let handle = tokio::spawn(async move {
			let _ = axum::serve(listener, app).await;
		});

		// Give server time to start
		tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

		Ok(Self {
			base_url,
			store,
			handle,
		})
	}

	pub fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	/// API client acting as `identity`
	#[allow(dead_code)]
	pub fn client(&self, identity: Identity) -> BrokerClient {
		let (caller, roles) = identity;
		let roles = roles
			.split(',')
			.filter(|r| !r.is_empty())
			.map(String::from)
			.collect();
		BrokerClient::new(&self.base_url, caller, roles)
	}

	pub fn abort(self) {
		self.handle.abort();
	}
}
