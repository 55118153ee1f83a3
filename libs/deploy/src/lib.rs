//! # goblet-deploy
//!
//! Ships a goblet application to Cloud Run.
//!
//! A deploy runs these steps in order, each awaited before the next:
//!
//! 1. write a default `Dockerfile` when the project has neither a
//!    `Dockerfile` nor a `Procfile`
//! 2. pack the project tree into a content-addressed `.tar.gz`
//! 3. upload it to Cloud Storage
//! 4. build and push the image with Cloud Build
//! 5. create or update the Cloud Run service
//! 6. replace the service IAM policy when bindings are configured
//! 7. create or update one Cloud Scheduler job per registered handler
//!
//! Nothing is retried or rolled back. [`Teardown`] removes the same
//! resources in reverse.

pub mod build;
pub mod config;
pub mod error;
pub mod iam;
pub mod jobs;
pub mod package;
pub mod revision;
pub mod upload;

mod deploy;
mod target;
mod teardown;

pub use config::{DeploymentConfig, DockerfileConfig, SchedulerConfig, SourceConfig};
pub use deploy::{package_project, DeployOptions, DeployReport, Deployer};
pub use error::{ConfigError, DeployError};
pub use package::SourceArchive;
pub use target::{Target, DEFAULT_REPOSITORY};
pub use teardown::{Teardown, TeardownReport};
