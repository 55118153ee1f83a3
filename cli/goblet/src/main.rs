//! goblet - Deploy a Rust service and its scheduled jobs to Cloud Run.
//!
//! This binary serves an app with no handlers. Applications embed
//! [`goblet::App`] and call `run` from their own `main`.

use clap::Parser;
use goblet::commands::Cli;
use goblet::error::print_error;
use goblet::App;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let app = cli.deployment_config().and_then(|config| {
        let scope = config.scope()?;
        Ok(App::new(cli.service_name()?, scope))
    });

    if let Err(e) = cli.execute(app).await {
        print_error(&e);
        std::process::exit(1);
    }
}
