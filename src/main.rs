//! Job Broker Server
//!
//! Main entry point for the job broker server

use job_broker::BrokerBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Settings come from config/config.* and BROKER__* environment overrides
	BrokerBuilder::new().start_server().await
}
