pub mod common;

use deskflow::api;
use reqwest::StatusCode;

#[tokio::test]
async fn retrieves_access_token() {
    let server = common::Server::start().await;
    let client = server.sign_in("alex@mail.com", "password").await;
    assert!(client.auth_token.is_some());
}

#[tokio::test]
async fn login_is_case_insensitive() {
    let server = common::Server::start().await;
    let token = server.client().auth(" Alex@Mail.com ", "password").await;
    assert!(token.is_ok());
}

#[tokio::test]
async fn rejects_wrong_password() {
    let server = common::Server::start().await;
    let status = server
        .client()
        .auth("alex@mail.com", "hunter22")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rejects_unknown_login() {
    let server = common::Server::start().await;
    let status = server
        .client()
        .auth("nobody@mail.com", "password")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn registers_new_user() {
    let server = common::Server::start().await;
    let user = server
        .client()
        .register("Rosa Park", "Rosa@Mail.com", "correct horse")
        .await
        .unwrap();
    assert_eq!(user.name, "Rosa Park");
    assert_eq!(user.role, api::user::Role::User);

    let rosa = server.sign_in("rosa@mail.com", "correct horse").await;
    assert_eq!(rosa.user().await.unwrap(), user);
}

#[tokio::test]
async fn rejects_taken_login() {
    let server = common::Server::start().await;
    let status = server
        .client()
        .register("Alex Again", "alex@mail.com", "password")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn rejects_short_password() {
    let server = common::Server::start().await;
    let status = server
        .client()
        .register("Rosa Park", "rosa@mail.com", "1234")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_malformed_token() {
    let server = common::Server::start().await;
    let mut client = server.client();
    client.auth_token = Some("not-a-token".to_owned());
    let status = client.user().await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn concurrent_registrations_share_one_login() {
    let server = common::Server::start().await;
    let first = server.client();
    let second = server.client();
    let (a, b) = tokio::join!(
        first.register("Rosa Park", "rosa@mail.com", "correct horse"),
        second.register("Rosa Parks", "ROSA@mail.com", "battery staple"),
    );

    let mut statuses = [a.map(drop), b.map(drop)]
        .map(|r| r.err().unwrap_or(StatusCode::OK));
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);
}

#[tokio::test]
async fn sign_in_keeps_server_responsive() {
    let server = common::Server::start().await;
    let alex = server.sign_in("alex@mail.com", "password").await;
    let client = server.client();
    let (token, user) = tokio::join!(
        client.auth("maria@mail.com", "password"),
        alex.user(),
    );
    assert!(token.is_ok());
    assert_eq!(user.unwrap().name, "Alex Johnson");
}
