//! The application object.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use axum::Router;
use goblet_deploy::{ConfigError, DeploymentConfig};
use goblet_schedule::{HandlerRegistry, JobDescriptor, JobScope, ScheduleError, ScheduleOptions};
use serde_json::Value;

use crate::error::print_error;
use crate::server;

/// What a scheduled handler returns. `Ok` bodies are sent back as JSON.
pub type HandlerResult = anyhow::Result<Value>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A registered handler, callable any number of times.
#[derive(Clone)]
pub struct ScheduleHandler(Arc<dyn Fn() -> HandlerFuture + Send + Sync>);

impl ScheduleHandler {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self(Arc::new(move || Box::pin(handler())))
    }

    pub async fn call(&self) -> HandlerResult {
        (self.0)().await
    }
}

impl fmt::Debug for ScheduleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScheduleHandler")
    }
}

/// A goblet application: a service name plus its scheduled handlers.
///
/// ```no_run
/// use goblet::App;
/// use goblet_schedule::ScheduleOptions;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut app = App::from_env("reports")?;
///     app.schedule("nightly", "0 3 * * *", ScheduleOptions::new(), || async {
///         Ok(serde_json::json!({ "rows": 0 }))
///     })?;
///     app.run().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct App {
    name: String,
    registry: HandlerRegistry<ScheduleHandler>,
}

impl App {
    pub fn new(name: impl Into<String>, scope: JobScope) -> Self {
        Self {
            name: name.into(),
            registry: HandlerRegistry::new(scope),
        }
    }

    /// Resolve project and region from the environment and the config file
    /// in the current directory.
    ///
    /// Commands run through [`App::run`] refuse to act when `--config` or
    /// `--project-dir` select a different project or region.
    pub fn from_env(name: impl Into<String>) -> Result<Self, ConfigError> {
        Self::from_project_dir(name, Path::new("."))
    }

    /// Like [`App::from_env`], reading the config file under `project_dir`.
    pub fn from_project_dir(
        name: impl Into<String>,
        project_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let scope = DeploymentConfig::load(project_dir)?.scope()?;
        Ok(Self::new(name, scope))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &JobScope {
        self.registry.scope()
    }

    /// Register `handler` to run on `cron_expression`.
    pub fn schedule<F, Fut>(
        &mut self,
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        options: ScheduleOptions,
        handler: F,
    ) -> Result<&JobDescriptor, ScheduleError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(
            name,
            cron_expression,
            options,
            ScheduleHandler::new(handler),
        )
    }

    /// Unregister a job, returning its descriptor.
    pub fn remove_schedule(&mut self, name: &str) -> Result<JobDescriptor, ScheduleError> {
        let (descriptor, _) = self.registry.remove(name)?.into_parts();
        Ok(descriptor)
    }

    pub fn registry(&self) -> &HandlerRegistry<ScheduleHandler> {
        &self.registry
    }

    pub fn into_registry(self) -> HandlerRegistry<ScheduleHandler> {
        self.registry
    }

    /// HTTP routes that serve the registered handlers.
    pub fn router(self) -> Router {
        server::router(Arc::new(self.registry))
    }

    /// Parse the process arguments and run the selected command.
    ///
    /// Errors are printed and the process exits with status 1.
    pub async fn run(self) {
        use clap::Parser;

        if let Err(e) = crate::commands::Cli::parse().execute(Ok(self)).await {
            print_error(&e);
            std::process::exit(1);
        }
    }
}
