/// Integration tests for registration and login
///
/// These tests drive the full router against the in-memory store:
/// - Code-mode registration (submit, wrong code, expiry, success)
/// - Link-mode registration through the confirmation callback
/// - Login errors, role routing and reconciliation of stalled registrations

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{TestContext, PASSWORD};
use gathered_shared::models::pending_registration::{PendingRegistration, PendingStage};
use gathered_shared::models::profile::{NewProfile, Role};
use gathered_shared::store::{IdentityStore, PendingStore, ProfileStore};
use gathered_web::flash::Level;
use uuid::Uuid;

fn student_form<'a>(email: &'a str, school_id: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("email", email),
        ("password", PASSWORD),
        ("confirm_password", PASSWORD),
        ("name", "Ada Lovelace"),
        ("role", "student"),
        ("school_id", school_id),
    ]
}

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();
    let mut client = ctx.client();

    let response = client.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["store"], "connected");
}

#[tokio::test]
async fn test_code_registration_end_to_end() {
    let ctx = TestContext::new();
    let school = ctx.seed_school("Cebu Institute of Technology").await;
    let school_id = school.id.to_string();
    let mut client = ctx.client();

    let page = client.get("/register").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Cebu Institute of Technology"));

    let response = client
        .post_form("/register", &student_form("ada@cit.edu", &school_id))
        .await;
    let flash = response.assert_redirect("/register/verify").unwrap();
    assert_eq!(flash.level, Level::Success);
    assert!(flash.message.contains("ada@cit.edu"));
    assert!(client.cookies.contains_key("gathered_pending"));
    assert_eq!(ctx.store.pending_count().await, 1);
    assert_eq!(ctx.store.identity_count().await, 0);

    let page = client.get("/register/verify").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("ada@cit.edu"));

    let code = ctx.mailed_code("ada@cit.edu").await;
    assert_eq!(code.len(), 6);

    // A wrong code keeps the pending registration
    let wrong = if code == "000000" { "111111" } else { "000000" };
    let response = client.post_form("/register/verify", &[("code", wrong)]).await;
    response.assert_redirect("/register/verify");
    assert_eq!(
        response.flash_message(),
        "Invalid verification code. Please try again."
    );
    assert_eq!(ctx.store.pending_count().await, 1);

    let response = client.post_form("/register/verify", &[("code", &code)]).await;
    response.assert_redirect("/login");
    assert_eq!(
        response.flash_message(),
        "Account confirmed and profile created! You can now log in."
    );
    assert!(!client.cookies.contains_key("gathered_pending"));
    assert_eq!(ctx.store.pending_count().await, 0);
    assert_eq!(ctx.store.identity_count().await, 1);
    assert_eq!(ctx.store.profile_count(Role::Student).await, 1);

    let response = client.login("ada@cit.edu", PASSWORD).await;
    response.assert_redirect("/student/dashboard");
    assert!(client.cookies.contains_key("gathered_session"));

    let page = client.get("/student/dashboard").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Student Dashboard"));
}

#[tokio::test]
async fn test_padded_code_is_rejected() {
    let ctx = TestContext::new();
    let school = ctx.seed_school("CIT").await;
    let school_id = school.id.to_string();
    let mut client = ctx.client();

    client
        .post_form("/register", &student_form("ada@cit.edu", &school_id))
        .await
        .assert_redirect("/register/verify");
    let code = ctx.mailed_code("ada@cit.edu").await;

    let padded = format!("  {code}  ");
    let response = client.post_form("/register/verify", &[("code", &padded)]).await;
    response.assert_redirect("/register/verify");
    assert_eq!(
        response.flash_message(),
        "Invalid verification code. Please try again."
    );
    assert!(client.cookies.contains_key("gathered_pending"));
    assert_eq!(ctx.store.pending_count().await, 1);
    assert_eq!(ctx.store.profile_count(Role::Student).await, 0);

    client
        .post_form("/register/verify", &[("code", &code)])
        .await
        .assert_redirect("/login");
    assert_eq!(ctx.store.profile_count(Role::Student).await, 1);
}

#[tokio::test]
async fn test_cookies_are_secure_in_production() {
    let ctx = TestContext::with_env(&[("APP_PRODUCTION", "true")]);
    ctx.seed_account("ada@cit.edu", Role::Student, None).await;
    let mut client = ctx.client();

    let response = client.login("ada@cit.edu", "wrong password").await;
    response.assert_redirect("/login");
    assert_eq!(response.flash_message(), "Invalid email or password.");
    let flash_cookie = response
        .set_cookies
        .iter()
        .find(|c| c.starts_with("gathered_flash="))
        .unwrap();
    assert!(flash_cookie.contains("Secure"));
    assert!(flash_cookie.contains("HttpOnly"));

    let response = client.login("ada@cit.edu", PASSWORD).await;
    response.assert_redirect("/student/dashboard");
    let session_cookie = response
        .set_cookies
        .iter()
        .find(|c| c.starts_with("gathered_session="))
        .unwrap();
    assert!(session_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_expired_code_restarts_registration() {
    let ctx = TestContext::new();
    let school = ctx.seed_school("CIT").await;
    let school_id = school.id.to_string();
    let mut client = ctx.client();

    client
        .post_form("/register", &student_form("late@cit.edu", &school_id))
        .await
        .assert_redirect("/register/verify");
    let code = ctx.mailed_code("late@cit.edu").await;

    ctx.store.age_pending(Duration::minutes(11)).await;

    let response = client.post_form("/register/verify", &[("code", &code)]).await;
    response.assert_redirect("/register");
    assert_eq!(
        response.flash_message(),
        "Verification has expired. Please register again."
    );
    assert!(!client.cookies.contains_key("gathered_pending"));
    assert_eq!(ctx.store.pending_count().await, 0);
    assert_eq!(ctx.store.identity_count().await, 0);
}

#[tokio::test]
async fn test_verify_without_pending_registration() {
    let ctx = TestContext::new();
    let mut client = ctx.client();

    let response = client.post_form("/register/verify", &[("code", "123456")]).await;
    response.assert_redirect("/register");
    assert_eq!(
        response.flash_message(),
        "Session expired or invalid. Please register again."
    );

    client.get("/register/verify").await.assert_redirect("/register");
}

#[tokio::test]
async fn test_registration_validation_messages() {
    let ctx = TestContext::new();
    let school = ctx.seed_school("CIT").await;
    let school_id = school.id.to_string();
    let mut client = ctx.client();

    let response = client.post_form("/register", &[("email", "ada@cit.edu")]).await;
    response.assert_redirect("/register");
    assert_eq!(response.flash_message(), "All fields are required.");

    let mut form = student_form("ada@cit.edu", &school_id);
    form[2] = ("confirm_password", "something else");
    let response = client.post_form("/register", &form).await;
    assert_eq!(response.flash_message(), "Passwords do not match.");

    let response = client
        .post_form("/register", &student_form("ada@gmail.com", &school_id))
        .await;
    assert_eq!(
        response.flash_message(),
        "Registration is limited to @cit.edu email addresses only."
    );

    let response = client.post_form("/register", &student_form("ada@cit.edu", "")).await;
    assert_eq!(response.flash_message(), "Students must select a school.");

    assert!(ctx.mailer.sent().await.is_empty());
    assert_eq!(ctx.store.pending_count().await, 0);
}

#[tokio::test]
async fn test_institutional_id_rules() {
    let ctx = TestContext::with_env(&[("REGISTRATION_REQUIRE_ID", "true")]);
    let school = ctx.seed_school("CIT").await;
    let school_id = school.id.to_string();
    let mut client = ctx.client();

    let mut form = student_form("ada@cit.edu", &school_id);
    form.push(("institutional_id", "1234"));
    let response = client.post_form("/register", &form).await;
    assert_eq!(response.flash_message(), "The ID must be exactly 9 digits long.");

    let taken = Uuid::new_v4();
    ctx.store
        .insert_profile(
            Role::Student,
            NewProfile {
                id: taken,
                name: "Grace".to_string(),
                school_id: Some(school.id),
                institutional_id: Some("12-3456-789".to_string()),
            },
        )
        .await
        .unwrap();

    let mut form = student_form("ada@cit.edu", &school_id);
    form.push(("institutional_id", "123456789"));
    let response = client.post_form("/register", &form).await;
    response.assert_redirect("/register");
    assert_eq!(response.flash_message(), "This ID is already registered.");
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let ctx = TestContext::new();
    let school = ctx.seed_school("CIT").await;
    ctx.seed_account("ada@cit.edu", Role::Student, Some(school.id)).await;
    let school_id = school.id.to_string();
    let mut client = ctx.client();

    let response = client
        .post_form("/register", &student_form("ada@cit.edu", &school_id))
        .await;
    response.assert_redirect("/register");
    assert_eq!(
        response.flash_message(),
        "A user with this email already exists."
    );
}

#[tokio::test]
async fn test_mail_failure_keeps_nothing() {
    let ctx = TestContext::new();
    let school = ctx.seed_school("CIT").await;
    let school_id = school.id.to_string();
    ctx.mailer.fail_deliveries(true);
    let mut client = ctx.client();

    let response = client
        .post_form("/register", &student_form("ada@cit.edu", &school_id))
        .await;
    response.assert_redirect("/register");
    assert_eq!(
        response.flash_message(),
        "Registration failed. Please try again later."
    );
    assert!(!client.cookies.contains_key("gathered_pending"));
    assert_eq!(ctx.store.pending_count().await, 0);
}

#[tokio::test]
async fn test_link_registration_creates_school() {
    let ctx = TestContext::with_env(&[("VERIFICATION_MODE", "link")]);
    let mut client = ctx.client();

    let response = client
        .post_form(
            "/register",
            &[
                ("email", "dean@cit.edu"),
                ("password", PASSWORD),
                ("confirm_password", PASSWORD),
                ("name", "Dean"),
                ("role", "administrator"),
                ("new_school_name", "Cebu Tech"),
            ],
        )
        .await;
    response.assert_redirect("/register/confirmation-sent");

    let page = client.get("/register/confirmation-sent").await;
    assert_eq!(page.status, StatusCode::OK);

    // Not confirmed yet
    let response = client.login("dean@cit.edu", PASSWORD).await;
    response.assert_redirect("/login");
    assert_eq!(
        response.flash_message(),
        "Please confirm your email address before logging in."
    );

    let link = ctx.mailed_link("dean@cit.edu").await;
    let response = client.get(&link).await;
    response.assert_redirect("/login");
    assert_eq!(
        response.flash_message(),
        "Account confirmed and profile created! You can now log in."
    );
    assert_eq!(ctx.store.profile_count(Role::Administrator).await, 1);

    client
        .login("dean@cit.edu", PASSWORD)
        .await
        .assert_redirect("/admin/dashboard");

    let page = client.get("/admin/dashboard").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Cebu Tech"));
}

#[tokio::test]
async fn test_callback_with_bad_token() {
    let ctx = TestContext::with_env(&[("VERIFICATION_MODE", "link")]);
    let mut client = ctx.client();

    let response = client.get("/auth/callback?token=not-a-token").await;
    response.assert_redirect("/register");
    assert!(response.flash_message().starts_with("Confirmation failed:"));

    let response = client.get("/auth/callback").await;
    response.assert_redirect("/register");
    assert!(response.flash_message().starts_with("Confirmation failed:"));
}

#[tokio::test]
async fn test_login_errors() {
    let ctx = TestContext::new();
    ctx.seed_account("ada@cit.edu", Role::Student, None).await;
    let mut client = ctx.client();

    let response = client.login("", "").await;
    response.assert_redirect("/login");
    assert_eq!(response.flash_message(), "Email and password are required.");

    let response = client.login("ada@cit.edu", "wrong password").await;
    response.assert_redirect("/login");
    assert_eq!(response.flash_message(), "Invalid email or password.");

    let response = client.login("nobody@cit.edu", PASSWORD).await;
    assert_eq!(response.flash_message(), "Invalid email or password.");
    assert!(!client.cookies.contains_key("gathered_session"));
}

#[tokio::test]
async fn test_administrator_profile_wins() {
    let ctx = TestContext::new();
    let id = ctx.seed_account("both@cit.edu", Role::Administrator, None).await;
    ctx.store
        .insert_profile(
            Role::Student,
            NewProfile {
                id,
                name: "Both".to_string(),
                school_id: None,
                institutional_id: None,
            },
        )
        .await
        .unwrap();
    let mut client = ctx.client();

    client
        .login("both@cit.edu", PASSWORD)
        .await
        .assert_redirect("/admin/dashboard");
}

#[tokio::test]
async fn test_login_without_profile() {
    let ctx = TestContext::new();
    let hash = gathered_shared::auth::password::hash_password(PASSWORD).unwrap();
    ctx.store.create_identity("ghost@cit.edu", &hash).await.unwrap();
    let mut client = ctx.client();

    let response = client.login("ghost@cit.edu", PASSWORD).await;
    response.assert_redirect("/login");
    assert_eq!(
        response.flash_message(),
        "User profile not found. Contact support."
    );
    assert!(!client.cookies.contains_key("gathered_session"));
}

#[tokio::test]
async fn test_login_reconciles_stalled_registration() {
    let ctx = TestContext::new();
    let school = ctx.seed_school("CIT").await;
    let hash = gathered_shared::auth::password::hash_password(PASSWORD).unwrap();
    let identity_id = ctx.store.create_identity("stalled@cit.edu", &hash).await.unwrap();

    let now = Utc::now();
    ctx.store
        .save(&PendingRegistration {
            id: Uuid::new_v4(),
            email: "stalled@cit.edu".to_string(),
            password_hash: hash,
            name: "Stalled".to_string(),
            role: Role::Student,
            school_id: Some(school.id),
            new_school_name: None,
            institutional_id: None,
            code_hash: None,
            stage: PendingStage::IdentityCreated,
            identity_id: Some(identity_id),
            expires_at: now,
            created_at: now,
        })
        .await
        .unwrap();

    let mut client = ctx.client();
    client
        .login("stalled@cit.edu", PASSWORD)
        .await
        .assert_redirect("/student/dashboard");

    assert_eq!(ctx.store.profile_count(Role::Student).await, 1);
    assert_eq!(ctx.store.pending_count().await, 0);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let ctx = TestContext::new();
    ctx.seed_account("ada@cit.edu", Role::Student, None).await;
    let mut client = ctx.client();

    client.login("ada@cit.edu", PASSWORD).await;
    client.get("/dashboard").await.assert_redirect("/student/dashboard");

    let response = client.post_form("/logout", &[]).await;
    response.assert_redirect("/");
    assert_eq!(response.flash_message(), "You have been logged out.");
    assert!(!client.cookies.contains_key("gathered_session"));

    let response = client.get("/student/dashboard").await;
    response.assert_redirect("/login");
    assert_eq!(response.flash_message(), "Please log in to continue.");
}
