//! Deploy command.

use anyhow::Result;
use clap::Args;
use goblet_deploy::{DeployOptions, Deployer};

use crate::output::{display_option, print_info, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Deploy command - package, build and roll out a new revision.
#[derive(Debug, Args)]
pub struct DeployCommand {
    /// Upload the source even when an identical archive is already stored.
    #[arg(long)]
    force: bool,
}

impl DeployCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let deployer = Deployer::new(
            ctx.client().await?,
            ctx.target().clone(),
            &ctx.project_dir,
            ctx.config().clone(),
        );

        let report = deployer
            .deploy(
                ctx.app.registry(),
                DeployOptions { force: self.force },
                None,
            )
            .await?;

        match ctx.format {
            OutputFormat::Json => print_single(&report),
            OutputFormat::Table => {
                if report.dockerfile_written {
                    print_info("Wrote a default Dockerfile");
                }
                if report.upload_skipped {
                    print_info("Source unchanged, reused the uploaded archive");
                }
                print_success(&format!(
                    "Deployed {} ({})",
                    report.service, report.image
                ));
                println!("  URL:  {}", display_option(&report.uri));
                println!("  Jobs: {}", report.jobs.len());
            }
        }

        Ok(())
    }
}
