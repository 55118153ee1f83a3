//! Package command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use goblet_deploy::config::CONFIG_DIR;
use goblet_deploy::package_project;
use serde::Serialize;

use crate::output::{print_info, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Package command - build the source archive a deploy would upload.
#[derive(Debug, Args)]
pub struct PackageCommand {
    /// Where to write the archive. Defaults to `.goblet/<service>.tar.gz`.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PackageSummary {
    path: PathBuf,
    object: String,
    sha256: String,
    files: usize,
    bytes: usize,
    dockerfile_written: bool,
}

impl PackageCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let service = ctx.target().name();

        let (dockerfile_written, archive) =
            package_project(&ctx.project_dir, ctx.config(), service).await?;

        let path = self.output.unwrap_or_else(|| {
            ctx.project_dir
                .join(CONFIG_DIR)
                .join(format!("{service}.tar.gz"))
        });
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, archive.bytes())
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        let summary = PackageSummary {
            object: archive.object_name(service),
            sha256: archive.sha256().to_string(),
            files: archive.file_count(),
            bytes: archive.size(),
            dockerfile_written,
            path,
        };

        match ctx.format {
            OutputFormat::Json => print_single(&summary),
            OutputFormat::Table => {
                if summary.dockerfile_written {
                    print_info("Wrote a default Dockerfile");
                }
                print_success(&format!(
                    "Packaged {} files ({} bytes) into {}",
                    summary.files,
                    summary.bytes,
                    summary.path.display()
                ));
                println!("  SHA-256: {}", summary.sha256);
                println!("  Object:  {}", summary.object);
            }
        }

        Ok(())
    }
}
