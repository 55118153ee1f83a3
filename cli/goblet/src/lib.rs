//! # goblet
//!
//! Write a Rust service, register scheduled handlers on an [`App`], and let
//! `goblet deploy` ship it to Cloud Run with a Cloud Scheduler job per
//! handler.
//!
//! The binary built from your crate is both the deploy tool and the
//! deployed server: `deploy`, `destroy`, `jobs` and `package` run on your
//! machine, `serve` runs in the container.

mod app;
pub mod commands;
pub mod error;
pub mod output;
pub mod server;
pub mod telemetry;

pub use app::{App, HandlerFuture, HandlerResult, ScheduleHandler};
pub use goblet_schedule::{HttpMethod, JobDescriptor, JobScope, OidcToken, ScheduleOptions};
