//! Session command - operate on sessions directly in the store.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use tessera_session::{SessionRecord, VerifiedUser};

use super::Context;

/// Arguments for the session command.
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Issue a session for an already-verified user
    Issue {
        /// User id
        user_id: String,

        /// Username
        username: String,

        /// Browser fingerprint to bind the session to
        #[arg(long)]
        browser: Option<String>,

        /// Source address to bind the session to
        #[arg(long)]
        address: Option<String>,

        /// Permission carried by the session (repeatable)
        #[arg(short, long = "permission")]
        permissions: Vec<String>,
    },

    /// Show a live session
    Show {
        /// Session token
        token: String,
    },

    /// Check whether a token names a live session
    Valid {
        /// Session token
        token: String,
    },

    /// Extend a live session
    Refresh {
        /// Session token
        token: String,
    },

    /// Delete one session and its index entries
    Revoke {
        /// Session token
        token: String,
    },

    /// Delete the most recent session of a username
    RevokeUser {
        /// Username
        username: String,
    },

    /// Sign out: delete every session of the token's owner
    Logout {
        /// Session token
        token: String,
    },
}

/// Run the session command.
pub async fn run(args: SessionArgs, ctx: &Context) -> Result<()> {
    match args.command {
        SessionCommand::Issue {
            user_id,
            username,
            browser,
            address,
            permissions,
        } => {
            let user = VerifiedUser::new(user_id, username).with_permissions(permissions);
            cmd_issue(user, browser.as_deref(), address.as_deref(), ctx).await
        }
        SessionCommand::Show { token } => cmd_show(&token, ctx).await,
        SessionCommand::Valid { token } => cmd_valid(&token, ctx).await,
        SessionCommand::Refresh { token } => cmd_refresh(&token, ctx).await,
        SessionCommand::Revoke { token } => cmd_revoke(&token, ctx).await,
        SessionCommand::RevokeUser { username } => cmd_revoke_user(&username, ctx).await,
        SessionCommand::Logout { token } => cmd_logout(&token, ctx).await,
    }
}

async fn cmd_issue(
    user: VerifiedUser,
    browser: Option<&str>,
    address: Option<&str>,
    ctx: &Context,
) -> Result<()> {
    let service = ctx.service().await?;
    let issued = service.sign_in(user, browser, address).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&issued)?);
    } else {
        println!("{}", issued.token);
        if ctx.verbose {
            let dim = Style::new().dim();
            println!(
                "{}",
                dim.apply_to(format!(
                    "roles: [{}]  expires: {}",
                    issued.roles.join(", "),
                    issued.expires_at.to_rfc3339()
                ))
            );
        }
    }
    Ok(())
}

async fn cmd_show(token: &str, ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    let Some(record) = service.sessions().validate(token).await else {
        bail!("no live session for that token");
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

async fn cmd_valid(token: &str, ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    let valid = service.sessions().is_valid(token).await;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "valid": valid }));
    } else if valid {
        println!("{} session is live", style("✓").green());
    } else {
        println!("{} session is missing, expired or stale", style("✗").red());
    }
    Ok(())
}

async fn cmd_refresh(token: &str, ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    let Some(record) = service.sessions().refresh(token).await else {
        bail!("no live session for that token");
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "{} refreshed, expires {}",
            style("✓").green(),
            record.expires_at.to_rfc3339()
        );
    }
    Ok(())
}

async fn cmd_revoke(token: &str, ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    service.sessions().delete(token).await;
    done("session revoked", ctx);
    Ok(())
}

async fn cmd_revoke_user(username: &str, ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    service.sessions().delete_by_username(username).await;
    done(&format!("latest session of '{username}' revoked"), ctx);
    Ok(())
}

async fn cmd_logout(token: &str, ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    let signed_out = service.sign_out(token).await;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "signed_out": signed_out }));
    } else if signed_out {
        println!("{} all sessions of the owner ended", style("✓").green());
    } else {
        println!("{} token was not live; removed any leftovers", style("·").dim());
    }
    Ok(())
}

fn done(message: &str, ctx: &Context) {
    if ctx.json_output {
        println!("{}", serde_json::json!({ "ok": true }));
    } else {
        println!("{} {}", style("✓").green(), message);
    }
}

fn print_record(record: &SessionRecord) {
    let dim = Style::new().dim();
    println!("{}", style("Session").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("  user:        {} ({})", record.username, record.user_id);
    println!("  roles:       [{}]", record.roles.join(", "));
    println!("  permissions: [{}]", record.permissions.join(", "));
    println!("  created:     {}", record.created_at.to_rfc3339());
    println!("  refreshed:   {}", record.last_refreshed_at.to_rfc3339());
    println!("  expires:     {}", record.expires_at.to_rfc3339());
}
