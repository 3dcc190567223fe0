mod common;

use agriloop_server::auth::AuthUser;
use agriloop_server::error::AppError;
use agriloop_server::models::{ChangePasswordRequest, LoginRequest, UpdateProfileRequest, UserRole};
use agriloop_server::services::{SessionService, UserService};

macro_rules! require_db {
    ($name:literal) => {
        match common::live_db().await {
            Some(db) => db,
            None => {
                println!("Skipping {}: DATABASE_URL not set or database unreachable", $name);
                return;
            }
        }
    };
}

#[tokio::test]
async fn repeated_bad_passwords_lock_the_account() {
    let db = require_db!("repeated_bad_passwords_lock_the_account");
    let auth = common::auth_service();
    let users = UserService::new(db, auth.clone());

    let registration = common::register_request(UserRole::Buyer);
    let email = registration.email.clone();
    users.register_user(registration, common::client()).await.expect("register");

    let wrong = || LoginRequest { email: email.clone(), password: "WrongPassword1".to_string() };

    for attempt in 1..auth.max_login_attempts() {
        let err = users.login_user(wrong(), common::client()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)), "attempt {}: {:?}", attempt, err);
    }

    let err = users.login_user(wrong(), common::client()).await.unwrap_err();
    assert!(matches!(err, AppError::Locked(_)), "{:?}", err);

    // Even the right password is refused while the lock holds
    let right = LoginRequest { email: email.clone(), password: common::TEST_PASSWORD.to_string() };
    let err = users.login_user(right, common::client()).await.unwrap_err();
    assert!(matches!(err, AppError::Locked(_)), "{:?}", err);
}

#[tokio::test]
async fn successful_login_clears_the_failure_counter() {
    let db = require_db!("successful_login_clears_the_failure_counter");
    let auth = common::auth_service();
    let users = UserService::new(db, auth.clone());

    let registration = common::register_request(UserRole::Producer);
    let email = registration.email.clone();
    users.register_user(registration, common::client()).await.expect("register");

    let wrong = || LoginRequest { email: email.clone(), password: "WrongPassword1".to_string() };
    let right = || LoginRequest { email: email.clone(), password: common::TEST_PASSWORD.to_string() };

    for _ in 1..auth.max_login_attempts() {
        assert!(users.login_user(wrong(), common::client()).await.is_err());
    }
    users.login_user(right(), common::client()).await.expect("login resets counter");

    // A fresh run of failures starts from zero again
    for _ in 1..auth.max_login_attempts() {
        let err = users.login_user(wrong(), common::client()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)), "{:?}", err);
    }
}

#[tokio::test]
async fn refresh_tokens_are_single_use() {
    let db = require_db!("refresh_tokens_are_single_use");
    let auth = common::auth_service();
    let users = UserService::new(db.clone(), auth.clone());

    let first = users
        .register_user(common::register_request(UserRole::Transporter), common::client())
        .await
        .expect("register");
    let old_access = auth.validate_access_token(&first.access_token).expect("claims");

    let second = users
        .refresh_token(&first.refresh_token, common::client())
        .await
        .expect("first refresh");
    assert_ne!(second.refresh_token, first.refresh_token);
    assert!(db.is_token_revoked(&old_access.jti).await.expect("revocation lookup"));

    let replay = users.refresh_token(&first.refresh_token, common::client()).await;
    assert!(matches!(replay, Err(AppError::Unauthorized(_))), "{:?}", replay.err());

    // The rotated token still works exactly once
    users
        .refresh_token(&second.refresh_token, common::client())
        .await
        .expect("rotated refresh");
}

#[tokio::test]
async fn logout_revokes_the_access_token() {
    let db = require_db!("logout_revokes_the_access_token");
    let auth = common::auth_service();
    let users = UserService::new(db.clone(), auth.clone());

    let session = users
        .register_user(common::register_request(UserRole::Buyer), common::client())
        .await
        .expect("register");
    let claims = auth.validate_access_token(&session.access_token).expect("claims");

    users.logout_user(&claims).await.expect("logout");
    assert!(db.is_token_revoked(&claims.jti).await.expect("revocation lookup"));

    let reuse = users.refresh_token(&session.refresh_token, common::client()).await;
    assert!(reuse.is_err());
}

#[tokio::test]
async fn duplicate_emails_conflict() {
    let db = require_db!("duplicate_emails_conflict");
    let users = UserService::new(db, common::auth_service());

    let registration = common::register_request(UserRole::Buyer);
    let mut again = registration.clone();
    again.username = common::unique("other");

    users.register_user(registration, common::client()).await.expect("register");
    let err = users.register_user(again, common::client()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
}

#[tokio::test]
async fn profile_updates_touch_only_the_fields_sent() {
    let db = require_db!("profile_updates_touch_only_the_fields_sent");
    let users = UserService::new(db, common::auth_service());

    let session = users
        .register_user(common::register_request(UserRole::Producer), common::client())
        .await
        .expect("register");
    let before = session.user;

    let updated = users
        .update_user_profile(
            before.id,
            UpdateProfileRequest {
                location: Some("Evora".to_string()),
                bio: Some("Cereal farm with straw to spare".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.location.as_deref(), Some("Evora"));
    assert_eq!(updated.bio.as_deref(), Some("Cereal farm with straw to spare"));
    assert_eq!(updated.username, before.username);
    assert_eq!(updated.email, before.email);
    assert_eq!(updated.full_name, before.full_name);

    let err = users
        .update_user_profile(before.id, UpdateProfileRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "No fields to update"), "{:?}", err);
}

#[tokio::test]
async fn changing_the_password_ends_other_sessions() {
    let db = require_db!("changing_the_password_ends_other_sessions");
    let auth = common::auth_service();
    let users = UserService::new(db.clone(), auth.clone());
    let sessions = SessionService::new(db);

    let registration = common::register_request(UserRole::Buyer);
    let email = registration.email.clone();
    let first = users.register_user(registration, common::client()).await.expect("register");
    let login = |password: &str| LoginRequest { email: email.clone(), password: password.to_string() };
    users.login_user(login(common::TEST_PASSWORD), common::client()).await.expect("second session");

    let claims = auth.validate_access_token(&first.access_token).expect("claims");
    let caller = AuthUser::try_from(claims.clone()).expect("caller");
    assert_eq!(sessions.get_user_sessions(caller.id).await.unwrap().len(), 2);

    let err = users
        .change_password(
            &caller,
            ChangePasswordRequest {
                current_password: "NotMyPassword1".to_string(),
                new_password: "Compost2025x".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "{:?}", err);

    users
        .change_password(
            &caller,
            ChangePasswordRequest {
                current_password: common::TEST_PASSWORD.to_string(),
                new_password: "Compost2025x".to_string(),
            },
        )
        .await
        .expect("change password");

    let remaining = sessions.get_user_sessions(caller.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].access_jti, claims.jti);

    let err = users.login_user(login(common::TEST_PASSWORD), common::client()).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "{:?}", err);
    users.login_user(login("Compost2025x"), common::client()).await.expect("new password");
}

#[tokio::test]
async fn deactivated_accounts_cannot_log_in() {
    let db = require_db!("deactivated_accounts_cannot_log_in");
    let users = UserService::new(db, common::auth_service());

    let registration = common::register_request(UserRole::Transporter);
    let login = LoginRequest { email: registration.email.clone(), password: common::TEST_PASSWORD.to_string() };
    let account = users.register_user(registration, common::client()).await.expect("register").user;

    let admin = common::admin();
    let profile = users.set_user_active(&admin, account.id, false).await.expect("deactivate");
    assert!(!profile.is_active);

    let err = users.login_user(login.clone(), common::client()).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{:?}", err);

    users.set_user_active(&admin, account.id, true).await.expect("reactivate");
    users.login_user(login, common::client()).await.expect("login after reactivation");
}
