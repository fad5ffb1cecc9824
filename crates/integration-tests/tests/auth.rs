//! Registration, login, logout and session handling.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;

use bazaar_integration_tests::{PASSWORD, TestApp, location};

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let response = browser.register("new@x.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = browser.login("NEW@x.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let body = browser.get("/").await.text().await.unwrap();
    assert!(body.contains("new@x.com"));
    assert!(body.contains("Logged in successfully"));
}

#[tokio::test]
async fn test_duplicate_email_is_a_conflict() {
    let app = TestApp::spawn().await;
    app.browser().register("dup@x.com", PASSWORD).await;

    let response = app.browser().register("Dup@X.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(response.text().await.unwrap().contains("already exists"));
    assert_eq!(app.count("users").await, 1);
}

#[tokio::test]
async fn test_register_reports_every_invalid_field() {
    let app = TestApp::spawn().await;

    let response = app
        .browser()
        .post_form(
            "/register",
            &[
                ("email", "not-an-email"),
                ("password", "short"),
                ("confirm_password", "different"),
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.text().await.unwrap();
    assert!(body.contains("Password must be at least 8 characters"));
    assert!(body.contains("Passwords do not match"));
    assert_eq!(app.count("users").await, 0);
}

#[tokio::test]
async fn test_failed_logins_are_indistinguishable() {
    let app = TestApp::spawn().await;
    app.browser().register("real@x.com", PASSWORD).await;

    let wrong_password = app.browser().login("real@x.com", "password2").await;
    let unknown_email = app.browser().login("ghost@x.com", PASSWORD).await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert!(
        wrong_password
            .text()
            .await
            .unwrap()
            .contains("Invalid email or password")
    );
    assert!(
        unknown_email
            .text()
            .await
            .unwrap()
            .contains("Invalid email or password")
    );
}

#[tokio::test]
async fn test_protected_page_redirects_to_login_and_back() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.register("back@x.com", PASSWORD).await;

    let response = browser.get("/shop/create").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=%2Fshop%2Fcreate");

    let page = browser.get("/login?next=%2Fshop%2Fcreate").await;
    assert!(page.text().await.unwrap().contains("value=\"/shop/create\""));

    let response = browser
        .post_form(
            "/login",
            &[
                ("email", "back@x.com"),
                ("password", PASSWORD),
                ("next", "/shop/create"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/shop/create");
}

#[tokio::test]
async fn test_login_ignores_external_next() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.register("safe@x.com", PASSWORD).await;

    let response = browser
        .post_form(
            "/login",
            &[
                ("email", "safe@x.com"),
                ("password", PASSWORD),
                ("next", "//evil.example/phish"),
            ],
        )
        .await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_logged_in_user_skips_login_and_register() {
    let app = TestApp::spawn().await;
    let browser = app.logged_in("here@x.com").await;

    for path in ["/login", "/register"] {
        let response = browser.get(path).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), "/");
    }
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::spawn().await;
    let browser = app.logged_in("bye@x.com").await;
    assert_eq!(browser.get("/account").await.status(), StatusCode::OK);

    let response = browser.get("/logout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = browser.get("/account").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=%2Faccount");
}

#[tokio::test]
async fn test_session_of_deleted_user_becomes_anonymous() {
    let app = TestApp::spawn().await;
    let browser = app.logged_in("gone@x.com").await;

    sqlx::query("DELETE FROM users WHERE email = ?")
        .bind("gone@x.com")
        .execute(&app.pool)
        .await
        .unwrap();

    let response = browser.get("/account").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=%2Faccount");

    let body = browser.get("/").await.text().await.unwrap();
    assert!(!body.contains("gone@x.com"));
    assert!(body.contains("href=\"/login\""));
}
