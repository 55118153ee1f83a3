//! # goblet-schedule
//!
//! Scheduled job descriptors and the handler registry for goblet applications.
//!
//! ## Design Principles
//!
//! - Registration is an explicit call made while the application is defined
//! - Descriptors are immutable once registered
//! - Resource paths are derived from `(project, region, name)` on every access
//! - Serialization is deterministic so re-deploys send identical bodies
//!
//! ## Wire Shape
//!
//! A descriptor serializes to the Cloud Scheduler job body:
//!
//! ```text
//! {"name":"projects/p/locations/r/jobs/nightly","schedule":"0 3 * * *",
//!  "timeZone":"UTC","description":"",
//!  "httpTarget":{"headers":{"X-Goblet-Type":"schedule","X-Goblet-Name":"nightly"},
//!                "httpMethod":"GET","oidcToken":{}}}
//! ```

mod descriptor;
mod error;
mod registry;

pub use descriptor::{
    HttpMethod, JobDescriptor, JobScope, OidcToken, ScheduleOptions, TargetedJob,
    DEFAULT_TIMEZONE, NAME_HEADER, SCHEDULE_TYPE, TYPE_HEADER,
};
pub use error::ScheduleError;
pub use registry::{HandlerRegistry, Registration};
