// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background job scheduler for Paygate server.
//!
//! Periodic jobs run on their own tokio task. Every attempt, including each
//! retry after a retryable failure, is persisted as a row in `job_runs`.

pub mod context;
pub mod error;
pub mod job;
pub mod scheduler;
pub mod types;

pub use context::{CancellationToken, JobContext};
pub use error::{JobError, Result};
pub use job::Job;
pub use scheduler::{JobScheduler, RetryPolicy};
pub use types::{JobDefinition, JobOutput, JobRepository, JobRun, JobStatus, JobType, TriggerSource};
