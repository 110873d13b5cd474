//! Roles command - identity role cache management.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;

use super::Context;

/// Arguments for the roles command.
#[derive(Args, Debug)]
pub struct RolesArgs {
    #[command(subcommand)]
    pub command: RolesCommand,
}

#[derive(Subcommand, Debug)]
pub enum RolesCommand {
    /// Show a user's cached role codes
    Show {
        /// User id
        user_id: String,
    },

    /// Drop cached roles (every user and the catalog, or one user)
    Invalidate {
        /// Only this user's entry
        #[arg(long)]
        user: Option<String>,
    },

    /// Populate every user's roles and the catalog from the role source
    Warm,
}

/// Run the roles command.
pub async fn run(args: RolesArgs, ctx: &Context) -> Result<()> {
    match args.command {
        RolesCommand::Show { user_id } => cmd_show(&user_id, ctx).await,
        RolesCommand::Invalidate { user } => cmd_invalidate(user.as_deref(), ctx).await,
        RolesCommand::Warm => cmd_warm(ctx).await,
    }
}

async fn cmd_show(user_id: &str, ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    let cached = service.roles().cached_roles(user_id).await;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "user_id": user_id, "roles": cached }));
        return Ok(());
    }

    match cached {
        Some(roles) => println!("{}: [{}]", user_id, roles.join(", ")),
        None => println!("{} no cached roles for {}", style("·").dim(), user_id),
    }
    Ok(())
}

async fn cmd_invalidate(user: Option<&str>, ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;

    match user {
        Some(user_id) => {
            service.roles().invalidate_user(user_id).await;
            if ctx.json_output {
                println!("{}", serde_json::json!({ "invalidated_users": 1 }));
            } else {
                println!("{} roles for {} invalidated", style("✓").green(), user_id);
            }
        }
        None => {
            let count = service.roles().invalidate_all_users().await;
            service.roles().invalidate_catalog().await;
            if ctx.json_output {
                println!("{}", serde_json::json!({ "invalidated_users": count }));
            } else {
                println!(
                    "{} invalidated {} user entries and the role catalog",
                    style("✓").green(),
                    count
                );
            }
        }
    }
    Ok(())
}

async fn cmd_warm(ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    let users = service.roles().warm_all().await?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "warmed_users": users }));
    } else {
        println!("{} cached roles for {} users", style("✓").green(), users);
    }
    Ok(())
}
