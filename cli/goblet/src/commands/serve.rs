//! Serve command.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::server;

use super::CommandContext;

/// Serve command - run the HTTP entry point Cloud Run invokes.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// Port to listen on. Cloud Run sets PORT.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
}

impl ServeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let addr = SocketAddr::new(self.host, self.port);
        server::serve(Arc::new(ctx.app.into_registry()), addr).await
    }
}
