//! Jobs commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use goblet_schedule::JobDescriptor;
use serde::Serialize;
use tabled::Tabled;

use crate::output::print_output;

use super::CommandContext;

/// Jobs command.
#[derive(Debug, Args)]
pub struct JobsCommand {
    #[command(subcommand)]
    command: JobsSubcommand,
}

#[derive(Debug, Subcommand)]
enum JobsSubcommand {
    /// List the scheduled jobs the app registers.
    List,
}

/// Job row for table display.
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "SCHEDULE")]
    schedule: String,
    #[tabled(rename = "TIMEZONE")]
    timezone: String,
    #[tabled(rename = "METHOD")]
    method: String,
    #[tabled(rename = "RESOURCE")]
    resource: String,
}

impl From<&JobDescriptor> for JobRow {
    fn from(job: &JobDescriptor) -> Self {
        Self {
            name: job.name().to_string(),
            schedule: job.schedule().to_string(),
            timezone: job.time_zone().to_string(),
            method: job.http_method().to_string(),
            resource: job.resource_path(),
        }
    }
}

impl JobsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            JobsSubcommand::List => {
                let rows: Vec<JobRow> = ctx
                    .app
                    .registry()
                    .list()
                    .into_iter()
                    .map(JobRow::from)
                    .collect();
                print_output(&rows, ctx.format);
            }
        }
        Ok(())
    }
}
