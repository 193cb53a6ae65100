//! brokerctl: operator CLI for the job broker
//!
//! Talks to a running broker over its HTTP API only.
//!
//! ```bash
//! brokerctl submit --job-type TEST --input '{"id": 1}'
//! brokerctl wait <job-id> --interval-secs 2
//! brokerctl --roles admin sweep --threshold-minutes 1440
//! ```

use std::time::Duration;

use broker_types::{InvalidateCacheRequest, TimeoutSweepRequest};
use clap::{Parser, Subcommand};
use job_broker::client::{BrokerClient, WaitPolicy};
use job_broker::SubmitJobRequest;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "brokerctl")]
#[command(version)]
#[command(about = "Operate a job broker over its HTTP API")]
#[command(propagate_version = true)]
struct Args {
	/// Broker base URL
	#[arg(long, env = "BROKER_URL", default_value = "http://127.0.0.1:3000")]
	url: String,

	/// Caller identity sent in x-caller-id
	#[arg(long, env = "BROKER_CALLER", default_value = "brokerctl")]
	caller: String,

	/// Comma separated roles sent in x-caller-roles
	#[arg(long, env = "BROKER_ROLES", default_value = "")]
	roles: String,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Submit a job
	Submit {
		#[arg(long)]
		job_type: String,
		/// Input payload as JSON
		#[arg(long)]
		input: String,
		/// Always create a new job
		#[arg(long)]
		no_cache: bool,
	},

	/// Show a job with its assignments
	Status { job_id: String },

	/// Cancel a pending job
	Cancel { job_id: String },

	/// Poll a job until it reaches a terminal status
	Wait {
		job_id: String,
		#[arg(long, default_value = "5")]
		interval_secs: u64,
		/// Consecutive transient errors tolerated
		#[arg(long, default_value = "5")]
		max_retries: u32,
		/// Stop after this many polls
		#[arg(long)]
		max_polls: Option<u32>,
	},

	/// Time out stale jobs (admin)
	Sweep {
		#[arg(long, default_value = "1440")]
		threshold_minutes: i64,
		#[arg(long)]
		job_type: Option<String>,
	},

	/// Invalidate cached results of a job type (admin)
	Invalidate {
		#[arg(long)]
		job_type: String,
	},
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();

	let args = Args::parse();
	let roles = args
		.roles
		.split(',')
		.map(str::trim)
		.filter(|r| !r.is_empty())
		.map(String::from)
		.collect();
	let client = BrokerClient::new(args.url, args.caller, roles);

	match args.command {
		Commands::Submit {
			job_type,
			input,
			no_cache,
		} => {
			let input: serde_json::Value = serde_json::from_str(&input)
				.map_err(|e| format!("--input is not valid JSON: {}", e))?;
			let mut request = SubmitJobRequest::new(job_type, input);
			if no_cache {
				request = request.without_cache();
			}
			print_json(&client.submit(&request).await?)?;
		},
		Commands::Status { job_id } => print_json(&client.job(&job_id).await?)?,
		Commands::Cancel { job_id } => print_json(&client.cancel(&job_id).await?)?,
		Commands::Wait {
			job_id,
			interval_secs,
			max_retries,
			max_polls,
		} => {
			let policy = WaitPolicy {
				interval: Duration::from_secs(interval_secs),
				max_retries,
				max_polls,
			};
			print_json(&client.wait_for_job(&job_id, policy).await?)?;
		},
		Commands::Sweep {
			threshold_minutes,
			job_type,
		} => {
			let request = TimeoutSweepRequest {
				threshold_minutes,
				job_type,
			};
			print_json(&client.sweep(&request).await?)?;
		},
		Commands::Invalidate { job_type } => {
			print_json(&client.invalidate(&InvalidateCacheRequest { job_type }).await?)?;
		},
	}

	Ok(())
}
