//! # goblet-cloud
//!
//! Thin REST client for the Google Cloud services goblet deploys against:
//! Cloud Build, Cloud Run (v2), Cloud Scheduler, Cloud Storage and
//! Artifact Registry.
//!
//! Every call is a single request/response. Mutating calls that return a
//! long-running operation can be awaited with the `wait_*` helpers, which
//! poll at a fixed interval until the operation is done. Nothing here
//! retries.

mod artifacts;
mod auth;
mod build;
mod client;
mod error;
mod iam;
mod operation;
mod run;
mod scheduler;
mod storage;

pub use artifacts::PackageRef;
pub use auth::AccessToken;
pub use build::{Build, BuildResults, BuiltImage};
pub use client::{ApiService, Endpoints, GcpClient, PollConfig};
pub use error::CloudError;
pub use iam::{Binding, Policy};
pub use operation::{Operation, Status};
pub use run::RunService;
pub use scheduler::SchedulerJob;
pub use storage::{ObjectMetadata, StorageSource};
