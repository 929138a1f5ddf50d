//! `PgCredentialStore` against a real Postgres. Each test gets a fresh
//! database with the migrations applied.
//!
//! Run with `cargo test --test postgres_store -- --ignored` once the
//! database from `configuration.yaml` is reachable.

use chrono::{Duration, Utc};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

use siwes_auth::configuration::{get_configuration, DatabaseSettings};
use siwes_auth::database::migrate;
use siwes_auth::error::{AppError, AuthError, DatabaseError};
use siwes_auth::users::{
    AccountChange, CredentialStore, NewUser, PasswordChange, PgCredentialStore, Role,
};

async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect_with(config.connect_options())
        .await
        .expect("Failed to connect to Postgres.");
    migrate(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn spawn_store() -> PgCredentialStore {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    PgCredentialStore::new(configure_database(&configuration.database).await)
}

fn new_user(email: &str, is_first_login: bool) -> NewUser {
    NewUser {
        email: email.to_string(),
        name: "Test User".to_string(),
        password_hash: "$2b$04$original".to_string(),
        role: Role::DepartmentalSupervisor,
        is_first_login,
    }
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn insert_and_find_user_by_email_ignores_case() {
    let store = spawn_store().await;
    let user = store
        .insert_user(new_user("mixed@example.com", true))
        .await
        .expect("Failed to insert user");

    let found = store
        .find_by_email("MIXED@Example.COM")
        .await
        .unwrap()
        .expect("user should be found");
    assert_eq!(found.id, user.id);
    assert_eq!(found.role, Role::DepartmentalSupervisor);
    assert!(found.is_active);
    assert!(found.is_first_login);
    assert!(!found.password_reset_required);

    let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "mixed@example.com");
    assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn duplicate_email_maps_to_unique_violation() {
    let store = spawn_store().await;
    store
        .insert_user(new_user("dup@example.com", false))
        .await
        .unwrap();

    let result = store.insert_user(new_user("DUP@example.com", false)).await;
    assert!(matches!(
        result,
        Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
    ));
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn replace_password_clears_flags_and_revokes_tokens_together() {
    let store = spawn_store().await;
    let user = store
        .insert_user(new_user("first@example.com", true))
        .await
        .unwrap();
    let expires = Utc::now() + Duration::days(1);
    store.save_refresh_token(user.id, "h1", expires).await.unwrap();
    store.save_refresh_token(user.id, "h2", expires).await.unwrap();

    let updated = store
        .replace_password(user.id, "$2b$04$changed", PasswordChange::FirstLoginReset)
        .await
        .unwrap();

    assert_eq!(updated.password_hash, "$2b$04$changed");
    assert!(!updated.is_first_login);
    assert!(!updated.password_reset_required);
    for hash in ["h1", "h2"] {
        assert!(store.find_refresh_token(hash).await.unwrap().unwrap().is_revoked);
    }
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn user_change_keeps_reset_flags() {
    let store = spawn_store().await;
    let user = store
        .insert_user(new_user("keep@example.com", true))
        .await
        .unwrap();

    let updated = store
        .replace_password(user.id, "$2b$04$changed", PasswordChange::UserChange)
        .await
        .unwrap();

    assert_eq!(updated.password_hash, "$2b$04$changed");
    assert!(updated.is_first_login);
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn mutating_unknown_user_is_not_found_and_leaves_tokens_alone() {
    let store = spawn_store().await;
    let user = store
        .insert_user(new_user("other@example.com", false))
        .await
        .unwrap();
    store
        .save_refresh_token(user.id, "live", Utc::now() + Duration::days(1))
        .await
        .unwrap();

    let result = store
        .replace_password(Uuid::new_v4(), "$2b$04$changed", PasswordChange::UserChange)
        .await;
    assert!(matches!(result, Err(AppError::Auth(AuthError::NotFound(_)))));

    let result = store
        .apply_account_change(Uuid::new_v4(), AccountChange::Deactivate)
        .await;
    assert!(matches!(result, Err(AppError::Auth(AuthError::NotFound(_)))));

    assert!(!store.find_refresh_token("live").await.unwrap().unwrap().is_revoked);
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn account_changes_revoke_refresh_tokens() {
    let store = spawn_store().await;
    let user = store
        .insert_user(new_user("admin-target@example.com", false))
        .await
        .unwrap();
    let expires = Utc::now() + Duration::days(1);

    store.save_refresh_token(user.id, "before-reset", expires).await.unwrap();
    let forced = store
        .apply_account_change(user.id, AccountChange::RequirePasswordReset)
        .await
        .unwrap();
    assert!(forced.password_reset_required);
    assert!(forced.requires_password_reset());
    assert!(store.find_refresh_token("before-reset").await.unwrap().unwrap().is_revoked);

    store.save_refresh_token(user.id, "before-deactivate", expires).await.unwrap();
    let deactivated = store
        .apply_account_change(user.id, AccountChange::Deactivate)
        .await
        .unwrap();
    assert!(!deactivated.is_active);
    assert!(
        store
            .find_refresh_token("before-deactivate")
            .await
            .unwrap()
            .unwrap()
            .is_revoked
    );
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn reset_token_is_consumed_once() {
    let store = spawn_store().await;
    let user = store
        .insert_user(new_user("token@example.com", true))
        .await
        .unwrap();
    store
        .set_reset_token(user.id, "reset-hash", Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    store
        .save_refresh_token(user.id, "session", Utc::now() + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(
        store.find_by_reset_token("reset-hash").await.unwrap().unwrap().id,
        user.id
    );

    let updated = store
        .consume_reset_token("reset-hash", "$2b$04$reset", Utc::now())
        .await
        .unwrap()
        .expect("live token should match");
    assert_eq!(updated.password_hash, "$2b$04$reset");
    assert!(updated.reset_token_hash.is_none());
    assert!(updated.reset_token_expires_at.is_none());
    assert!(updated.is_first_login);
    assert!(store.find_refresh_token("session").await.unwrap().unwrap().is_revoked);

    assert!(store
        .consume_reset_token("reset-hash", "$2b$04$again", Utc::now())
        .await
        .unwrap()
        .is_none());
    let stored = store.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash, "$2b$04$reset");
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn expired_or_cleared_reset_token_is_not_consumed() {
    let store = spawn_store().await;
    let user = store
        .insert_user(new_user("expired@example.com", false))
        .await
        .unwrap();

    store
        .set_reset_token(user.id, "expired-hash", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    assert!(store
        .consume_reset_token("expired-hash", "$2b$04$reset", Utc::now())
        .await
        .unwrap()
        .is_none());

    store
        .set_reset_token(user.id, "live-hash", Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    store.record_login(user.id, Utc::now()).await.unwrap();

    let stored = store.find_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.reset_token_hash.is_none());
    assert!(stored.last_login_at.is_some());
    assert!(store
        .consume_reset_token("live-hash", "$2b$04$reset", Utc::now())
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        store.find_by_id(user.id).await.unwrap().unwrap().password_hash,
        "$2b$04$original"
    );
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn refresh_tokens_rotate_and_expired_ones_are_pruned() {
    let store = spawn_store().await;
    let user = store
        .insert_user(new_user("refresh@example.com", false))
        .await
        .unwrap();

    store
        .save_refresh_token(user.id, "stale", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    store
        .save_refresh_token(user.id, "fresh", Utc::now() + Duration::days(1))
        .await
        .unwrap();
    assert!(store.find_refresh_token("stale").await.unwrap().is_none());

    let record = store.find_refresh_token("fresh").await.unwrap().unwrap();
    assert_eq!(record.user_id, user.id);
    assert!(!record.is_revoked);

    assert!(store.revoke_refresh_token("fresh").await.unwrap());
    assert!(!store.revoke_refresh_token("fresh").await.unwrap());
    assert!(!store.revoke_refresh_token("unknown").await.unwrap());
}
