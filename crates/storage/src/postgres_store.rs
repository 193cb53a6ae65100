//! PostgreSQL storage implementation
//!
//! Each mutating trait method runs inside one transaction. Claims and
//! completions are conditional updates (`WHERE status = 'PENDING'`,
//! `WHERE completed_at IS NULL`) so concurrent workers racing on the same
//! row see exactly one winner.

use crate::traits::{
	AssignmentStorage, JobStorage, ResultStorage, Storage, StorageError, StorageResult,
	StorageStats,
};
use async_trait::async_trait;
use broker_types::chrono::{DateTime, Utc};
use broker_types::{
	CacheCandidate, Job, JobAssignment, JobFilter, JobRequest, JobResult, JobStatus, JobType,
	WorkerIdentity,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, info};

const JOB_COLUMNS: &str =
	"job_id, job_type, status, hash, input, owner_id, created_at, updated_at";
const ASSIGNMENT_COLUMNS: &str = "assignment_id, job_id, task_id, cluster, storage_location, \
	expires_at, heartbeat_at, completed_at, created_at";
const RESULT_COLUMNS: &str = "result_id, assignment_id, job_id, payload, storage_location, \
	metadata, cache_valid, created_at";

/// Connection settings for [`PostgresStore`]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
	pub url: String,
	pub max_connections: u32,
	/// Apply the embedded migrations on connect
	pub run_migrations: bool,
}

impl PostgresConfig {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			max_connections: 10,
			run_migrations: true,
		}
	}
}

/// PostgreSQL-backed storage
#[derive(Clone)]
pub struct PostgresStore {
	pool: PgPool,
}

fn db_error(err: sqlx::Error) -> StorageError {
	match err {
		sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
			StorageError::Connection {
				message: err.to_string(),
			}
		},
		sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StorageError::Serialization {
			message: err.to_string(),
		},
		other => StorageError::Operation {
			message: other.to_string(),
		},
	}
}

fn limit_param(value: usize) -> i64 {
	i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_column<T: std::str::FromStr>(row: &PgRow, column: &str) -> StorageResult<T>
where
	T::Err: std::fmt::Display,
{
	let raw: String = row.try_get(column).map_err(db_error)?;
	raw.parse().map_err(|e: T::Err| StorageError::Serialization {
		message: format!("column {}: {}", column, e),
	})
}

fn job_from_row(row: &PgRow) -> StorageResult<Job> {
	Ok(Job {
		job_id: row.try_get("job_id").map_err(db_error)?,
		job_type: parse_column(row, "job_type")?,
		status: parse_column(row, "status")?,
		hash: row.try_get("hash").map_err(db_error)?,
		input: row.try_get("input").map_err(db_error)?,
		owner_id: row.try_get("owner_id").map_err(db_error)?,
		created_at: row.try_get("created_at").map_err(db_error)?,
		updated_at: row.try_get("updated_at").map_err(db_error)?,
	})
}

fn assignment_from_row(row: &PgRow) -> StorageResult<JobAssignment> {
	Ok(JobAssignment {
		assignment_id: row.try_get("assignment_id").map_err(db_error)?,
		job_id: row.try_get("job_id").map_err(db_error)?,
		worker: WorkerIdentity {
			task_id: row.try_get("task_id").map_err(db_error)?,
			cluster: row.try_get("cluster").map_err(db_error)?,
		},
		storage_location: row.try_get("storage_location").map_err(db_error)?,
		expires_at: row.try_get("expires_at").map_err(db_error)?,
		heartbeat_at: row.try_get("heartbeat_at").map_err(db_error)?,
		completed_at: row.try_get("completed_at").map_err(db_error)?,
		created_at: row.try_get("created_at").map_err(db_error)?,
	})
}

fn result_from_row(row: &PgRow) -> StorageResult<JobResult> {
	Ok(JobResult {
		result_id: row.try_get("result_id").map_err(db_error)?,
		assignment_id: row.try_get("assignment_id").map_err(db_error)?,
		job_id: row.try_get("job_id").map_err(db_error)?,
		payload: row.try_get("payload").map_err(db_error)?,
		storage_location: row.try_get("storage_location").map_err(db_error)?,
		metadata: row.try_get("metadata").map_err(db_error)?,
		cache_valid: row.try_get("cache_valid").map_err(db_error)?,
		created_at: row.try_get("created_at").map_err(db_error)?,
	})
}

impl PostgresStore {
	/// Connect, and apply migrations when configured to
	pub async fn connect(config: &PostgresConfig) -> StorageResult<Self> {
		let pool = PgPoolOptions::new()
			.max_connections(config.max_connections)
			.connect(&config.url)
			.await
			.map_err(|e| StorageError::Connection {
				message: e.to_string(),
			})?;

		if config.run_migrations {
			sqlx::migrate!()
				.run(&pool)
				.await
				.map_err(|e| StorageError::Operation {
					message: format!("migration failed: {}", e),
				})?;
			info!("Database migrations applied");
		}

		Ok(Self { pool })
	}

	/// Wrap an existing pool; migrations are the caller's responsibility
	pub fn from_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	async fn begin(&self) -> StorageResult<Transaction<'static, Postgres>> {
		self.pool.begin().await.map_err(db_error)
	}

	/// Explain why a conditional job update matched nothing
	async fn job_miss(
		tx: &mut Transaction<'static, Postgres>,
		job_id: &str,
		expected: JobStatus,
	) -> StorageError {
		let status = sqlx::query("SELECT status FROM jobs WHERE job_id = $1")
			.bind(job_id)
			.fetch_optional(&mut **tx)
			.await;
		match status {
			Ok(Some(row)) => match parse_column::<JobStatus>(&row, "status") {
				Ok(status) if status == expected => {
					StorageError::conflict(job_id, "job already has an active assignment")
				},
				Ok(status) => {
					StorageError::conflict(job_id, format!("expected {}, found {}", expected, status))
				},
				Err(e) => e,
			},
			Ok(None) => StorageError::not_found(job_id),
			Err(e) => db_error(e),
		}
	}
}

#[async_trait]
impl JobStorage for PostgresStore {
	async fn find_cache_candidates(&self, hash: &str) -> StorageResult<Vec<CacheCandidate>> {
		let sql = format!(
			"SELECT {JOB_COLUMNS}, EXISTS (\
				SELECT 1 FROM job_results r WHERE r.job_id = jobs.job_id AND r.cache_valid\
			) AS has_valid_result FROM jobs WHERE hash = $1"
		);
		let rows = sqlx::query(&sql)
			.bind(hash)
			.fetch_all(&self.pool)
			.await
			.map_err(db_error)?;

		rows.iter()
			.map(|row| {
				Ok(CacheCandidate {
					job: job_from_row(row)?,
					has_valid_result: row.try_get("has_valid_result").map_err(db_error)?,
				})
			})
			.collect()
	}

	async fn record_admission(
		&self,
		new_job: Option<Job>,
		request: JobRequest,
	) -> StorageResult<()> {
		let mut tx = self.begin().await?;

		if let Some(job) = &new_job {
			sqlx::query(
				"INSERT INTO jobs (job_id, job_type, status, hash, input, owner_id, created_at, updated_at) \
				 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
			)
			.bind(&job.job_id)
			.bind(job.job_type.as_str())
			.bind(job.status.as_str())
			.bind(&job.hash)
			.bind(&job.input)
			.bind(&job.owner_id)
			.bind(job.created_at)
			.bind(job.updated_at)
			.execute(&mut *tx)
			.await
			.map_err(db_error)?;
		}

		sqlx::query(
			"INSERT INTO job_requests (request_id, caller_id, job_type, input, cache_hit, job_id, created_at) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7)",
		)
		.bind(&request.request_id)
		.bind(&request.caller_id)
		.bind(request.job_type.as_str())
		.bind(&request.input)
		.bind(request.cache_hit)
		.bind(&request.job_id)
		.bind(request.created_at)
		.execute(&mut *tx)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
				StorageError::not_found(request.job_id.clone())
			},
			other => db_error(other),
		})?;

		tx.commit().await.map_err(db_error)?;
		debug!(
			"Recorded admission {} -> job {}",
			request.request_id, request.job_id
		);
		Ok(())
	}

	async fn get_job(&self, job_id: &str) -> StorageResult<Option<Job>> {
		let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1");
		sqlx::query(&sql)
			.bind(job_id)
			.fetch_optional(&self.pool)
			.await
			.map_err(db_error)?
			.as_ref()
			.map(job_from_row)
			.transpose()
	}

	async fn get_job_request(&self, request_id: &str) -> StorageResult<Option<JobRequest>> {
		let row = sqlx::query(
			"SELECT request_id, caller_id, job_type, input, cache_hit, job_id, created_at \
			 FROM job_requests WHERE request_id = $1",
		)
		.bind(request_id)
		.fetch_optional(&self.pool)
		.await
		.map_err(db_error)?;

		row.map(|row| {
			Ok(JobRequest {
				request_id: row.try_get("request_id").map_err(db_error)?,
				caller_id: row.try_get("caller_id").map_err(db_error)?,
				job_type: parse_column(&row, "job_type")?,
				input: row.try_get("input").map_err(db_error)?,
				cache_hit: row.try_get("cache_hit").map_err(db_error)?,
				job_id: row.try_get("job_id").map_err(db_error)?,
				created_at: row.try_get("created_at").map_err(db_error)?,
			})
		})
		.transpose()
	}

	async fn list_jobs(
		&self,
		filter: &JobFilter,
		offset: usize,
		limit: usize,
	) -> StorageResult<(Vec<Job>, usize)> {
		let owner = filter.owner_id.as_deref();
		let status = filter.status.map(|s| s.as_str());
		let predicate = "($1::text IS NULL OR owner_id = $1) AND ($2::text IS NULL OR status = $2)";

		let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS total FROM jobs WHERE {predicate}"))
			.bind(owner)
			.bind(status)
			.fetch_one(&self.pool)
			.await
			.map_err(db_error)?
			.try_get("total")
			.map_err(db_error)?;

		let sql = format!(
			"SELECT {JOB_COLUMNS} FROM jobs WHERE {predicate} \
			 ORDER BY created_at DESC, job_id DESC LIMIT $3 OFFSET $4"
		);
		let rows = sqlx::query(&sql)
			.bind(owner)
			.bind(status)
			.bind(limit_param(limit))
			.bind(limit_param(offset))
			.fetch_all(&self.pool)
			.await
			.map_err(db_error)?;

		let jobs = rows.iter().map(job_from_row).collect::<StorageResult<_>>()?;
		Ok((jobs, usize::try_from(total).unwrap_or_default()))
	}

	async fn list_pollable_jobs(
		&self,
		job_type: Option<JobType>,
		now: DateTime<Utc>,
		limit: usize,
	) -> StorageResult<Vec<Job>> {
		let sql = format!(
			"SELECT {JOB_COLUMNS} FROM jobs \
			 WHERE status = 'PENDING' \
			   AND ($1::text IS NULL OR job_type = $1) \
			   AND NOT EXISTS ( \
			     SELECT 1 FROM job_assignments a \
			     WHERE a.job_id = jobs.job_id AND a.completed_at IS NULL AND a.expires_at > $2) \
			 ORDER BY created_at ASC, job_id ASC LIMIT $3"
		);
		let rows = sqlx::query(&sql)
			.bind(job_type.map(|t| t.as_str()))
			.bind(now)
			.bind(limit_param(limit))
			.fetch_all(&self.pool)
			.await
			.map_err(db_error)?;
		rows.iter().map(job_from_row).collect()
	}

	async fn cancel_job(&self, job_id: &str, now: DateTime<Utc>) -> StorageResult<Job> {
		let mut tx = self.begin().await?;
		let sql = format!(
			"UPDATE jobs SET status = 'CANCELLED', updated_at = $2 \
			 WHERE job_id = $1 AND status = 'PENDING' RETURNING {JOB_COLUMNS}"
		);
		let row = sqlx::query(&sql)
			.bind(job_id)
			.bind(now)
			.fetch_optional(&mut *tx)
			.await
			.map_err(db_error)?;

		let Some(row) = row else {
			return Err(Self::job_miss(&mut tx, job_id, JobStatus::Pending).await);
		};
		let job = job_from_row(&row)?;
		tx.commit().await.map_err(db_error)?;
		Ok(job)
	}

	async fn time_out_stale_jobs(
		&self,
		created_before: DateTime<Utc>,
		job_type: Option<JobType>,
		now: DateTime<Utc>,
	) -> StorageResult<Vec<Job>> {
		let mut tx = self.begin().await?;
		let sql = format!(
			"UPDATE jobs SET status = 'TIMED_OUT', updated_at = $1 \
			 WHERE status IN ('PENDING', 'IN_PROGRESS') \
			   AND created_at < $2 \
			   AND ($3::text IS NULL OR job_type = $3) \
			 RETURNING {JOB_COLUMNS}"
		);
		let rows = sqlx::query(&sql)
			.bind(now)
			.bind(created_before)
			.bind(job_type.map(|t| t.as_str()))
			.fetch_all(&mut *tx)
			.await
			.map_err(db_error)?;

		let mut jobs = rows.iter().map(job_from_row).collect::<StorageResult<Vec<_>>>()?;
		tx.commit().await.map_err(db_error)?;
		jobs.sort_by(|a, b| (a.created_at, &a.job_id).cmp(&(b.created_at, &b.job_id)));
		Ok(jobs)
	}
}

#[async_trait]
impl AssignmentStorage for PostgresStore {
	async fn create_assignment(
		&self,
		assignment: JobAssignment,
		now: DateTime<Utc>,
	) -> StorageResult<JobAssignment> {
		let mut tx = self.begin().await?;

		// Compare-and-swap on status; also refuses while a live claim exists
		let claimed = sqlx::query(
			"UPDATE jobs SET status = 'IN_PROGRESS', updated_at = $2 \
			 WHERE job_id = $1 AND status = 'PENDING' \
			   AND NOT EXISTS ( \
			     SELECT 1 FROM job_assignments a \
			     WHERE a.job_id = $1 AND a.completed_at IS NULL AND a.expires_at > $2)",
		)
		.bind(&assignment.job_id)
		.bind(now)
		.execute(&mut *tx)
		.await
		.map_err(db_error)?;

		if claimed.rows_affected() == 0 {
			return Err(Self::job_miss(&mut tx, &assignment.job_id, JobStatus::Pending).await);
		}

		sqlx::query(&format!(
			"INSERT INTO job_assignments ({ASSIGNMENT_COLUMNS}) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
		))
		.bind(&assignment.assignment_id)
		.bind(&assignment.job_id)
		.bind(&assignment.worker.task_id)
		.bind(assignment.worker.cluster.as_deref())
		.bind(&assignment.storage_location)
		.bind(assignment.expires_at)
		.bind(assignment.heartbeat_at)
		.bind(assignment.completed_at)
		.bind(assignment.created_at)
		.execute(&mut *tx)
		.await
		.map_err(db_error)?;

		tx.commit().await.map_err(db_error)?;
		Ok(assignment)
	}

	async fn get_assignment(&self, assignment_id: &str) -> StorageResult<Option<JobAssignment>> {
		let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM job_assignments WHERE assignment_id = $1");
		sqlx::query(&sql)
			.bind(assignment_id)
			.fetch_optional(&self.pool)
			.await
			.map_err(db_error)?
			.as_ref()
			.map(assignment_from_row)
			.transpose()
	}

	async fn list_assignments_for_job(&self, job_id: &str) -> StorageResult<Vec<JobAssignment>> {
		let sql = format!(
			"SELECT {ASSIGNMENT_COLUMNS} FROM job_assignments WHERE job_id = $1 \
			 ORDER BY created_at ASC, assignment_id ASC"
		);
		let rows = sqlx::query(&sql)
			.bind(job_id)
			.fetch_all(&self.pool)
			.await
			.map_err(db_error)?;
		rows.iter().map(assignment_from_row).collect()
	}

	async fn record_heartbeat(
		&self,
		assignment_id: &str,
		now: DateTime<Utc>,
	) -> StorageResult<JobAssignment> {
		let sql = format!(
			"UPDATE job_assignments SET heartbeat_at = $2 \
			 WHERE assignment_id = $1 AND completed_at IS NULL RETURNING {ASSIGNMENT_COLUMNS}"
		);
		let row = sqlx::query(&sql)
			.bind(assignment_id)
			.bind(now)
			.fetch_optional(&self.pool)
			.await
			.map_err(db_error)?;

		match row {
			Some(row) => assignment_from_row(&row),
			None => match self.get_assignment(assignment_id).await? {
				Some(_) => Err(StorageError::conflict(
					assignment_id,
					"assignment already completed",
				)),
				None => Err(StorageError::not_found(assignment_id)),
			},
		}
	}

	async fn complete_assignment(
		&self,
		assignment_id: &str,
		result: JobResult,
		final_status: JobStatus,
		now: DateTime<Utc>,
	) -> StorageResult<Job> {
		if !JobStatus::InProgress.can_transition_to(final_status) {
			return Err(StorageError::conflict(
				assignment_id,
				format!("{} is not a valid completion status", final_status),
			));
		}

		let mut tx = self.begin().await?;

		let closed = sqlx::query(
			"UPDATE job_assignments SET completed_at = $2 \
			 WHERE assignment_id = $1 AND completed_at IS NULL RETURNING job_id",
		)
		.bind(assignment_id)
		.bind(now)
		.fetch_optional(&mut *tx)
		.await
		.map_err(db_error)?;

		let job_id: String = match closed {
			Some(row) => row.try_get("job_id").map_err(db_error)?,
			None => {
				let exists = sqlx::query("SELECT 1 FROM job_assignments WHERE assignment_id = $1")
					.bind(assignment_id)
					.fetch_optional(&mut *tx)
					.await
					.map_err(db_error)?;
				return Err(match exists {
					Some(_) => StorageError::conflict(assignment_id, "assignment already completed"),
					None => StorageError::not_found(assignment_id),
				});
			},
		};

		// Dropping the transaction on any early return below rolls back the close
		let sql = format!(
			"UPDATE jobs SET status = $2, updated_at = $3 \
			 WHERE job_id = $1 AND status = 'IN_PROGRESS' RETURNING {JOB_COLUMNS}"
		);
		let row = sqlx::query(&sql)
			.bind(&job_id)
			.bind(final_status.as_str())
			.bind(now)
			.fetch_optional(&mut *tx)
			.await
			.map_err(db_error)?;
		let Some(row) = row else {
			return Err(Self::job_miss(&mut tx, &job_id, JobStatus::InProgress).await);
		};
		let job = job_from_row(&row)?;

		sqlx::query(&format!(
			"INSERT INTO job_results ({RESULT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
		))
		.bind(&result.result_id)
		.bind(&result.assignment_id)
		.bind(&result.job_id)
		.bind(&result.payload)
		.bind(&result.storage_location)
		.bind(&result.metadata)
		.bind(result.cache_valid)
		.bind(result.created_at)
		.execute(&mut *tx)
		.await
		.map_err(db_error)?;

		tx.commit().await.map_err(db_error)?;
		Ok(job)
	}
}

#[async_trait]
impl ResultStorage for PostgresStore {
	async fn get_result_for_assignment(
		&self,
		assignment_id: &str,
	) -> StorageResult<Option<JobResult>> {
		let sql = format!("SELECT {RESULT_COLUMNS} FROM job_results WHERE assignment_id = $1");
		sqlx::query(&sql)
			.bind(assignment_id)
			.fetch_optional(&self.pool)
			.await
			.map_err(db_error)?
			.as_ref()
			.map(result_from_row)
			.transpose()
	}

	async fn list_results_for_job(&self, job_id: &str) -> StorageResult<Vec<JobResult>> {
		let sql = format!(
			"SELECT {RESULT_COLUMNS} FROM job_results WHERE job_id = $1 \
			 ORDER BY created_at ASC, result_id ASC"
		);
		let rows = sqlx::query(&sql)
			.bind(job_id)
			.fetch_all(&self.pool)
			.await
			.map_err(db_error)?;
		rows.iter().map(result_from_row).collect()
	}

	async fn invalidate_results_for_type(&self, job_type: JobType) -> StorageResult<usize> {
		let mut tx = self.begin().await?;
		let updated = sqlx::query(
			"UPDATE job_results r SET cache_valid = FALSE \
			 FROM jobs j \
			 WHERE r.job_id = j.job_id AND j.job_type = $1 AND r.cache_valid",
		)
		.bind(job_type.as_str())
		.execute(&mut *tx)
		.await
		.map_err(db_error)?;
		tx.commit().await.map_err(db_error)?;

		Ok(usize::try_from(updated.rows_affected()).unwrap_or(usize::MAX))
	}
}

#[async_trait]
impl Storage for PostgresStore {
	async fn health_check(&self) -> StorageResult<bool> {
		Ok(sqlx::query("SELECT 1").execute(&self.pool).await.is_ok())
	}

	async fn stats(&self) -> StorageResult<StorageStats> {
		let row = sqlx::query(
			"SELECT \
			   (SELECT COUNT(*) FROM jobs) AS total_jobs, \
			   (SELECT COUNT(*) FROM jobs WHERE status = 'PENDING') AS pending_jobs, \
			   (SELECT COUNT(*) FROM jobs WHERE status = 'IN_PROGRESS') AS in_progress_jobs, \
			   (SELECT COUNT(*) FROM job_requests) AS total_requests, \
			   (SELECT COUNT(*) FROM job_assignments) AS total_assignments, \
			   (SELECT COUNT(*) FROM job_results) AS total_results, \
			   (SELECT COUNT(*) FROM job_results WHERE cache_valid) AS valid_results",
		)
		.fetch_one(&self.pool)
		.await
		.map_err(db_error)?;

		let count = |column: &str| -> StorageResult<usize> {
			let value: i64 = row.try_get(column).map_err(db_error)?;
			Ok(usize::try_from(value).unwrap_or_default())
		};
		Ok(StorageStats {
			total_jobs: count("total_jobs")?,
			pending_jobs: count("pending_jobs")?,
			in_progress_jobs: count("in_progress_jobs")?,
			total_requests: count("total_requests")?,
			total_assignments: count("total_assignments")?,
			total_results: count("total_results")?,
			valid_results: count("valid_results")?,
		})
	}

	async fn close(&self) -> StorageResult<()> {
		self.pool.close().await;
		Ok(())
	}
}
