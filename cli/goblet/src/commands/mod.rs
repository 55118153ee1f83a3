//! CLI commands.

mod deploy;
mod destroy;
mod jobs;
mod package;
mod serve;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use goblet_cloud::{AccessToken, Endpoints, GcpClient};
use goblet_deploy::{DeploymentConfig, Target};

use crate::app::App;
use crate::error::CliError;
use crate::output::OutputFormat;
use crate::telemetry::{self, LogFormat};

/// goblet - Deploy a Rust service and its scheduled jobs to Cloud Run.
#[derive(Debug, Parser)]
#[command(name = "goblet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Project root holding the sources and `.goblet/config.json`.
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Configuration file used instead of `.goblet/config.json`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cloud Run service name. Defaults to the project directory name.
    #[arg(long, global = true, env = "GOBLET_SERVICE")]
    service: Option<String>,

    /// OAuth access token. Falls back to `gcloud auth print-access-token`.
    #[arg(long, global = true, env = "GOBLET_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Send every API call to this base URL.
    #[arg(long, global = true, env = "GOBLET_API_ENDPOINT", hide = true)]
    api_endpoint: Option<String>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, env = "GOBLET_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build and deploy the service, then sync its scheduled jobs.
    Deploy(deploy::DeployCommand),

    /// Delete the service and its scheduled jobs.
    Destroy(destroy::DestroyCommand),

    /// Inspect registered scheduled jobs.
    Jobs(jobs::JobsCommand),

    /// Write the source archive locally without deploying.
    Package(package::PackageCommand),

    /// Serve the registered handlers over HTTP.
    Serve(serve::ServeCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// The service name from `--service`, else from the project directory.
    pub fn service_name(&self) -> Result<String> {
        match self.explicit_service() {
            Some(name) => Ok(name.to_string()),
            None => service_name_for(&self.project_dir),
        }
    }

    fn explicit_service(&self) -> Option<&str> {
        self.service
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// The `--config` file when given, otherwise the project's config.
    ///
    /// The two are never merged.
    pub fn deployment_config(&self) -> Result<DeploymentConfig> {
        let config = match &self.config {
            Some(path) => DeploymentConfig::from_file(path)?,
            None => DeploymentConfig::load(&self.project_dir)?,
        };
        Ok(config)
    }

    /// Run the selected command against `app`.
    ///
    /// `version` runs even when the app could not be built.
    pub async fn execute(self, app: Result<App>) -> Result<()> {
        let log_format = match self.command {
            Commands::Serve(_) => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        telemetry::init(&self.log_level, log_format);

        if let Commands::Version = self.command {
            println!("goblet {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        let (ctx, command) = self.into_context(app?)?;

        match command {
            Commands::Deploy(cmd) => cmd.run(ctx).await,
            Commands::Destroy(cmd) => cmd.run(ctx).await,
            Commands::Jobs(cmd) => cmd.run(ctx).await,
            Commands::Package(cmd) => cmd.run(ctx).await,
            Commands::Serve(cmd) => cmd.run(ctx).await,
            Commands::Version => Ok(()),
        }
    }

    /// Resolve configuration and target, before anything talks to the
    /// provider.
    ///
    /// Project and region come from the selected config snapshot (the
    /// environment still wins over it). `--service` replaces the app's name.
    /// The app's jobs must be registered in the same scope.
    fn into_context(self, app: App) -> Result<(CommandContext, Commands)> {
        let config = self.deployment_config()?;
        let service = self
            .explicit_service()
            .map(str::to_string)
            .unwrap_or_else(|| app.name().to_string());

        let target = Target::new(config.scope()?, service)?;
        target.ensure_same_scope(app.scope())?;

        let ctx = CommandContext {
            app,
            format: self.format,
            project_dir: self.project_dir,
            config,
            target,
            access_token: self.access_token,
            api_endpoint: self.api_endpoint,
        };
        Ok((ctx, self.command))
    }
}

/// Derive a Cloud Run service name from a directory name.
///
/// Lowercases and maps `_` and spaces to `-`. Validation happens later, when
/// the name is turned into a [`Target`].
pub fn service_name_for(dir: &Path) -> Result<String> {
    let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_lowercase().replace(['_', ' '], "-"))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| CliError::NoServiceName(dir.to_path_buf()))?;
    Ok(name)
}

/// Shared command context.
pub struct CommandContext {
    pub app: App,
    pub format: OutputFormat,
    pub project_dir: PathBuf,
    config: DeploymentConfig,
    target: Target,
    access_token: Option<String>,
    api_endpoint: Option<String>,
}

impl CommandContext {
    /// Get an authenticated API client.
    pub async fn client(&self) -> Result<GcpClient> {
        let token = AccessToken::resolve(self.access_token.clone()).await?;
        let endpoints = self
            .api_endpoint
            .as_deref()
            .map(Endpoints::single)
            .unwrap_or_default();
        Ok(GcpClient::new(&token, endpoints)?)
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The selected config snapshot.
    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goblet_deploy::ConfigError;
    use goblet_schedule::JobScope;
    use std::fs;

    #[test]
    fn service_name_is_derived_from_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("My_Reports");
        std::fs::create_dir(&dir).unwrap();

        assert_eq!(service_name_for(&dir).unwrap(), "my-reports");
    }

    #[test]
    fn service_flag_wins_over_directory() {
        let cli = Cli::try_parse_from(["goblet", "--service", "billing", "jobs", "list"]).unwrap();
        assert_eq!(cli.service_name().unwrap(), "billing");
    }

    #[test]
    fn format_flag_is_global() {
        let cli = Cli::try_parse_from(["goblet", "deploy", "--force", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Deploy(_)));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["goblet", "--format", "yaml", "version"]).is_err());
    }

    /// Scope resolution prefers the environment; these cases need it unset.
    fn scope_env_unset() -> bool {
        std::env::var("GOOGLE_PROJECT").is_err() && std::env::var("GOOGLE_LOCATION").is_err()
    }

    fn project_with_configs() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".goblet")).unwrap();
        fs::write(
            dir.path().join(".goblet/config.json"),
            r#"{"project":"base-project","location":"us-central1","bindings":[]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("prod.json"),
            r#"{
                "project": "prod-project",
                "location": "europe-west1",
                "bindings": [{ "role": "roles/run.invoker", "members": ["allUsers"] }]
            }"#,
        )
        .unwrap();
        dir
    }

    fn parse(dir: &Path, extra: &[&str]) -> Cli {
        let mut args = vec![
            "goblet".to_string(),
            "--project-dir".to_string(),
            dir.display().to_string(),
        ];
        args.extend(extra.iter().map(|a| a.to_string()));
        args.push("jobs".to_string());
        args.push("list".to_string());
        Cli::try_parse_from(args).unwrap()
    }

    /// Builds the app the way the `goblet` binary does.
    fn app_for(cli: &Cli) -> App {
        let config = cli.deployment_config().unwrap();
        App::new(cli.service_name().unwrap(), config.scope().unwrap())
    }

    #[test]
    fn config_flag_replaces_project_config() {
        if !scope_env_unset() {
            return;
        }
        let dir = project_with_configs();
        let prod = dir.path().join("prod.json");
        let cli = parse(dir.path(), &["--config", prod.to_str().unwrap(), "--service", "svc"]);

        let app = app_for(&cli);
        let (ctx, _) = cli.into_context(app).unwrap();

        assert_eq!(ctx.target().project(), "prod-project");
        assert_eq!(ctx.target().region(), "europe-west1");
        assert_eq!(ctx.config().bindings.len(), 1);
        assert_eq!(ctx.app.scope(), ctx.target().scope());
    }

    #[test]
    fn config_flag_works_without_project_config() {
        if !scope_env_unset() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let prod = dir.path().join("prod.json");
        fs::write(&prod, r#"{"project":"prod-project","location":"europe-west1"}"#).unwrap();
        let cli = parse(dir.path(), &["--config", prod.to_str().unwrap(), "--service", "svc"]);

        let app = app_for(&cli);
        let (ctx, _) = cli.into_context(app).unwrap();
        assert_eq!(ctx.target().project(), "prod-project");
    }

    #[test]
    fn app_scoped_elsewhere_is_rejected() {
        if !scope_env_unset() {
            return;
        }
        let dir = project_with_configs();
        let prod = dir.path().join("prod.json");
        let cli = parse(dir.path(), &["--config", prod.to_str().unwrap()]);

        let app = App::new("svc", JobScope::new("base-project", "us-central1").unwrap());
        let err = cli.into_context(app).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ScopeMismatch { .. })
        ));
    }

    #[test]
    fn service_flag_overrides_app_name() {
        if !scope_env_unset() {
            return;
        }
        let dir = project_with_configs();
        let scope = JobScope::new("base-project", "us-central1").unwrap();

        let cli = parse(dir.path(), &["--service", "billing"]);
        let (ctx, _) = cli.into_context(App::new("reports", scope.clone())).unwrap();
        assert_eq!(ctx.target().name(), "billing");
        assert_eq!(ctx.app.name(), "reports");

        if std::env::var("GOBLET_SERVICE").is_err() {
            let cli = parse(dir.path(), &[]);
            let (ctx, _) = cli.into_context(App::new("reports", scope)).unwrap();
            assert_eq!(ctx.target().name(), "reports");
        }
    }

    #[test]
    fn invalid_config_fails_before_the_client_is_built() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        let cli = parse(dir.path(), &["--config", broken.to_str().unwrap()]);

        let app = App::new("svc", JobScope::new("p", "us-central1").unwrap());
        let err = cli.into_context(app).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Parse { .. })
        ));
    }
}
