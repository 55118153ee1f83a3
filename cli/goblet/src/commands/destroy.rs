//! Destroy command.

use anyhow::Result;
use clap::Args;
use goblet_deploy::Teardown;

use crate::output::{print_single, print_success, OutputFormat};

use super::CommandContext;

/// Destroy command - delete the service and its scheduled jobs.
#[derive(Debug, Args)]
pub struct DestroyCommand {
    /// Also delete the built image and the uploaded source archives.
    #[arg(long)]
    all: bool,
}

impl DestroyCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let teardown = Teardown::new(
            ctx.client().await?,
            ctx.target().clone(),
            ctx.config().clone(),
        );
        let report = teardown.destroy(ctx.app.registry(), self.all).await?;

        match ctx.format {
            OutputFormat::Json => print_single(&report),
            OutputFormat::Table => {
                let service = ctx.target().name();
                if report.service_deleted {
                    print_success(&format!("Deleted service {service}"));
                } else {
                    println!("Service {service} did not exist");
                }
                println!("  Jobs deleted: {}", report.jobs.len());
                if self.all {
                    println!("  Image deleted: {}", report.package_deleted);
                    println!("  Source archives deleted: {}", report.objects_deleted);
                }
            }
        }

        Ok(())
    }
}
