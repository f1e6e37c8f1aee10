//! Slack adapter against a mock Web API.

use onboard_daemon::collaborators::{
    ChannelProvisioner, CollaboratorError, InviteOutcome, MembershipResolver, NotificationSink,
    SlackClient,
};
use onboard_daemon::config::SlackConfig;
use onboard_types::{ChannelRef, UserRef};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> SlackConfig {
    SlackConfig {
        base_url: server.uri(),
        bot_token: "xoxb-test".into(),
        ..SlackConfig::default()
    }
}

fn ok(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn api_error(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "error": code }))
}

async fn mount_join(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/conversations.join"))
        .respond_with(ok(json!({ "ok": true })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_channel_slugs_the_company_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.create"))
        .and(header("authorization", "Bearer xoxb-test"))
        .and(body_string_contains("name=vendor-acme_corp&"))
        .and(body_string_contains("is_private=true"))
        .respond_with(ok(json!({ "ok": true, "channel": { "id": "C100" } })))
        .expect(1)
        .mount(&server)
        .await;
    mount_join(&server).await;

    let client = SlackClient::new(&config(&server)).unwrap();
    let channel = client.create_channel("Acme Corp").await.unwrap();
    assert_eq!(channel, ChannelRef::new("C100"));
}

#[tokio::test]
async fn name_taken_retries_with_suffix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.create"))
        .and(body_string_contains("name=vendor-acme&"))
        .respond_with(api_error("name_taken"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conversations.create"))
        .and(body_string_contains("name=vendor-acme-"))
        .respond_with(ok(json!({ "ok": true, "channel": { "id": "C200" } })))
        .expect(1)
        .mount(&server)
        .await;
    mount_join(&server).await;

    let client = SlackClient::new(&config(&server)).unwrap();
    assert_eq!(
        client.create_channel("Acme").await.unwrap(),
        ChannelRef::new("C200")
    );
}

#[tokio::test]
async fn required_admin_invite_failure_fails_creation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.create"))
        .respond_with(ok(json!({ "ok": true, "channel": { "id": "C300" } })))
        .mount(&server)
        .await;
    mount_join(&server).await;
    Mock::given(method("POST"))
        .and(path("/conversations.invite"))
        .and(body_string_contains("users=UADMIN1%2CUADMIN2"))
        .respond_with(api_error("not_in_channel"))
        .mount(&server)
        .await;

    let mut cfg = config(&server);
    cfg.admin_user_ids = vec!["UADMIN1".into(), "UADMIN2".into()];

    let lenient = SlackClient::new(&cfg).unwrap();
    assert!(lenient.create_channel("Acme").await.is_ok());

    cfg.require_admin_invite = true;
    let strict = SlackClient::new(&cfg).unwrap();
    let err = strict.create_channel("Acme").await.unwrap_err();
    assert_eq!(err.api_code(), Some("not_in_channel"));
}

#[tokio::test]
async fn lookup_maps_users_not_found_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users.lookupByEmail"))
        .and(body_string_contains("email=ops%40acme.test"))
        .respond_with(ok(json!({ "ok": true, "user": { "id": "U42" } })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users.lookupByEmail"))
        .and(body_string_contains("email=new%40acme.test"))
        .respond_with(api_error("users_not_found"))
        .mount(&server)
        .await;

    let client = SlackClient::new(&config(&server)).unwrap();
    assert_eq!(
        client.lookup("ops@acme.test").await.unwrap(),
        Some(UserRef::new("U42"))
    );
    assert_eq!(client.lookup("new@acme.test").await.unwrap(), None);
}

#[tokio::test]
async fn invite_treats_already_in_channel_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.invite"))
        .respond_with(api_error("already_in_channel"))
        .mount(&server)
        .await;

    let client = SlackClient::new(&config(&server)).unwrap();
    let outcome = client
        .invite(&ChannelRef::new("C1"), &UserRef::new("U1"))
        .await
        .unwrap();
    assert_eq!(outcome, InviteOutcome::AlreadyMember);
}

#[tokio::test]
async fn invite_surfaces_other_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.invite"))
        .respond_with(api_error("channel_not_found"))
        .mount(&server)
        .await;

    let client = SlackClient::new(&config(&server)).unwrap();
    let err = client
        .invite(&ChannelRef::new("C1"), &UserRef::new("U1"))
        .await
        .unwrap_err();
    assert_eq!(err.api_code(), Some("channel_not_found"));
}

#[tokio::test]
async fn rate_limit_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_string_contains("channel=C-OPS"))
        .respond_with(ok(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SlackClient::new(&config(&server)).unwrap();
    client.send("C-OPS", "hello").await.unwrap();
}

#[tokio::test]
async fn persistent_rate_limit_gives_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .expect(2)
        .mount(&server)
        .await;

    let client = SlackClient::new(&config(&server)).unwrap();
    let err = client.send("C-OPS", "hello").await.unwrap_err();
    assert!(matches!(err, CollaboratorError::RateLimited(m) if m == "chat.postMessage"));
}

#[tokio::test]
async fn server_error_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = SlackClient::new(&config(&server)).unwrap();
    let err = client.send("C-OPS", "hello").await.unwrap_err();
    assert!(matches!(
        err,
        CollaboratorError::Status { status: 503, ref body, .. } if body == "maintenance"
    ));
}
