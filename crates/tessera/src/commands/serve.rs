//! Serve command - runs the HTTP server.

use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use clap::Args;
use tessera_server::{AppState, Server, ServerConfig};
use tracing::{info, warn};

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Admin token for /api/admin (or set TESSERA_ADMIN_TOKEN env var)
    #[arg(long, env = "TESSERA_ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    /// Disable per-request logging
    #[arg(long)]
    pub quiet_requests: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let bind = args.bind.unwrap_or_else(|| ctx.config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{bind}'"))?;

    let admin_token = args
        .admin_token
        .or_else(|| ctx.config.server.admin_token.clone());
    if admin_token.is_none() {
        info!("No admin token configured; admin routes disabled");
    }

    let service = ctx.service().await?;

    if ctx.config.roles.warm_on_start {
        match service.roles().warm_all().await {
            Ok(users) => info!(users, "Role cache warmed"),
            Err(e) => warn!(error = %e, "Role cache warm-up failed; continuing cold"),
        }
    }

    let config = ServerConfig::new(admin_token)
        .with_bind_address(addr)
        .with_request_logging(!args.quiet_requests);

    let server = Server::from_state(AppState::new(service, config));
    server.run().await?;

    Ok(())
}
