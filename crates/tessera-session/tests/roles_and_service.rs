//! Role cache and sign-in integration tests.

mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{FlakyStore, Harness};
use tessera_session::{SessionConfig, SessionRequest, VerifiedUser};
use tessera_store::{KeyValueStore, MemoryStore};

#[tokio::test]
async fn test_get_roles_is_warm_after_refresh_user() -> Result<()> {
    let h = Harness::new();

    let refreshed = h.roles.refresh_user("u2").await?;
    assert_eq!(h.source.lookups(), 1);

    let roles = h.roles.get_roles("u2").await?;
    assert_eq!(roles, refreshed);
    assert_eq!(roles, vec!["AUDITOR", "USER"]);
    assert_eq!(h.source.lookups(), 1);
    Ok(())
}

#[tokio::test]
async fn test_invalidate_user_forces_reload() -> Result<()> {
    let h = Harness::new();
    h.roles.get_roles("u1").await?;
    h.roles.get_roles("u1").await?;
    assert_eq!(h.source.lookups(), 1);

    h.roles.invalidate_user("u1").await;
    h.roles.get_roles("u1").await?;
    assert_eq!(h.source.lookups(), 2);
    Ok(())
}

#[tokio::test]
async fn test_invalidate_all_users_leaves_sessions_alone() -> Result<()> {
    let h = Harness::new();
    let token = h
        .sessions
        .issue_session(SessionRequest::new("u1", "alice").with_browser("b1"))
        .await?;
    h.roles.warm_all().await?;

    assert_eq!(h.roles.invalidate_all_users().await, 2);

    assert!(h.roles.cached_roles("u1").await.is_none());
    assert!(h.roles.get_all_roles_from_cache().await.is_some());
    assert!(h.sessions.is_valid(&token).await);
    Ok(())
}

#[tokio::test]
async fn test_sign_in_carries_cached_roles() -> Result<()> {
    let h = Harness::new();
    let service = h.service();

    let issued = service
        .sign_in(
            VerifiedUser::new("u2", "bob").with_permissions(vec!["reports:read".into()]),
            Some("b1"),
            Some("10.0.0.1"),
        )
        .await?;

    assert_eq!(issued.roles, vec!["AUDITOR", "USER"]);
    let record = h.sessions.validate(&issued.token).await.unwrap();
    assert_eq!(record.roles, issued.roles);
    assert_eq!(record.permissions, vec!["reports:read"]);
    assert_eq!(record.expires_at, issued.expires_at);
    assert_eq!(h.roles.cached_roles("u2").await, Some(issued.roles.clone()));

    // Second sign-in reads roles from cache.
    service
        .sign_in(VerifiedUser::new("u2", "bob"), Some("b2"), None)
        .await?;
    assert_eq!(h.source.lookups(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sign_out_ends_every_session_of_the_user() -> Result<()> {
    let h = Harness::new();
    let service = h.service();
    let laptop = service
        .sign_in(VerifiedUser::new("u1", "alice"), Some("laptop"), Some("10.0.0.1"))
        .await?;
    let phone = service
        .sign_in(VerifiedUser::new("u1", "alice"), Some("phone"), Some("10.0.0.2"))
        .await?;

    assert!(service.sign_out(&phone.token).await);

    assert!(!h.sessions.is_valid(&laptop.token).await);
    assert!(!h.sessions.is_valid(&phone.token).await);
    assert!(!service.sign_out(&phone.token).await);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Degraded store
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_issue_survives_failing_browser_index() -> Result<()> {
    let memory = MemoryStore::new();
    let flaky = Arc::new(FlakyStore::new(memory.clone(), &["browser_token:"]));
    let h = Harness::over(memory, flaky, SessionConfig::default());

    let token = h
        .sessions
        .issue_session(SessionRequest::new("u1", "alice").with_browser("b1"))
        .await?;

    assert!(h.sessions.is_valid(&token).await);
    assert!(h.store.get("browser_token:b1").await?.is_none());
    assert!(h.store.get("user_browser:u1:b1").await?.is_some());

    // Delete still clears what it can reach.
    h.sessions.delete(&token).await;
    assert!(!h.sessions.is_valid(&token).await);
    assert!(h.store.get("user_browser:u1:b1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_validate_reports_not_found_when_store_is_down() -> Result<()> {
    let memory = MemoryStore::new();
    let healthy = Harness::over(
        memory.clone(),
        Arc::new(memory.clone()),
        SessionConfig::default(),
    );
    let token = healthy
        .sessions
        .issue_session(SessionRequest::new("u1", "alice"))
        .await?;

    let down = Arc::new(FlakyStore::new(memory.clone(), &[""]));
    let h = Harness::over(memory, down, SessionConfig::default());

    assert!(h.sessions.validate(&token).await.is_none());
    assert!(h.sessions.refresh(&token).await.is_none());
    h.sessions.delete(&token).await;
    assert!(h.sessions.issue_session(SessionRequest::new("u2", "bob")).await.is_err());

    // Nothing was lost while the store was unreachable.
    assert!(healthy.sessions.is_valid(&token).await);
    Ok(())
}

#[tokio::test]
async fn test_role_cache_falls_back_to_source_when_cache_is_down() -> Result<()> {
    let memory = MemoryStore::new();
    let flaky = Arc::new(FlakyStore::new(memory.clone(), &["user_roles:"]));
    let h = Harness::over(memory, flaky, SessionConfig::default());

    assert_eq!(h.roles.get_roles("u1").await?, vec!["ADMIN"]);
    assert_eq!(h.roles.get_roles("u1").await?, vec!["ADMIN"]);
    assert_eq!(h.source.lookups(), 2);
    Ok(())
}
