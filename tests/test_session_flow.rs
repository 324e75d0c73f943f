//! End-to-end session flows: file storage, profile reconciliation over HTTP,
//! the request pipeline and the route guard wired through `GuardContext`.

mod common;

use common::{
    build_context, config_for, identity_json, mount_profile, seed_raw, seed_storage, stored,
};
use reqwest::StatusCode;
use session_guard::guard::GuardState;
use session_guard::role::Role;
use session_guard::session::{IDENTITY_KEY, TOKEN_KEY};
use session_guard::types::UserIdentity;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_restored_session_is_authorized() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    seed_storage(&file, Some("abc123"), Some(identity_json("u-1", "manager"))).await;

    let (ctx, _) = build_context(config_for(&server, &file), "/manager/reports");
    let session = ctx.start().await;

    assert_eq!(session.token.as_deref(), Some("abc123"));
    assert_eq!(session.role(), Some(Role::Manager));
    assert!(!ctx.session.is_reconciling());
    assert!(ctx.guard.evaluate(&[Role::Manager], "/manager/reports").is_authorized());
    assert_eq!(ctx.session.landing_path(), "/manager/dashboard");
}

#[tokio::test]
async fn test_guard_resolving_before_start() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _) = build_context(config_for(&server, &dir.path().join("s.json")), "/");

    assert_eq!(ctx.guard.evaluate(&[], "/orders").state, GuardState::Resolving);
    ctx.start().await;
    assert_eq!(
        ctx.guard.evaluate(&[], "/orders").state,
        GuardState::Unauthenticated
    );
}

#[tokio::test]
async fn test_placeholder_values_restore_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    seed_raw(&file, TOKEN_KEY, "undefined").await;
    seed_raw(&file, IDENTITY_KEY, "null").await;

    let (ctx, _) = build_context(config_for(&server, &file), "/");
    let session = ctx.start().await;

    assert!(session.hydrated);
    assert!(session.is_empty());
    assert!(!ctx.session.is_reconciling());
    let decision = ctx.guard.evaluate(&[Role::Admin], "/admin");
    assert_eq!(decision.state, GuardState::Unauthenticated);
    assert_eq!(decision.redirect.as_deref(), Some("/login?redirect=%2Fadmin"));
}

#[tokio::test]
async fn test_token_only_reconciles_identity() {
    let server = MockServer::start().await;
    mount_profile(&server, "abc123", "u-7", "staff").await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    seed_storage(&file, Some("abc123"), None).await;

    let (ctx, _) = build_context(config_for(&server, &file), "/staff/dashboard");
    let session = ctx.start().await;
    assert!(session.awaiting_identity());

    ctx.session.wait_for_reconciliation().await;

    let identity = ctx.session.identity().unwrap();
    assert_eq!(identity.id, "u-7");
    assert_eq!(identity.role, Some(Role::Staff));
    assert!(ctx.guard.evaluate(&[Role::Staff], "/staff/dashboard").is_authorized());

    let (token, identity_json) = stored(&file).await;
    assert_eq!(token.as_deref(), Some("abc123"));
    let persisted: UserIdentity = serde_json::from_str(&identity_json.unwrap()).unwrap();
    assert_eq!(persisted.id, "u-7");
}

#[tokio::test]
async fn test_rejected_token_clears_storage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    seed_storage(&file, Some("expired"), None).await;

    let (ctx, _) = build_context(config_for(&server, &file), "/");
    ctx.start().await;
    ctx.session.wait_for_reconciliation().await;

    assert!(ctx.session.session().is_empty());
    assert_eq!(stored(&file).await, (None, None));
    assert_eq!(
        ctx.guard.evaluate(&[], "/orders").state,
        GuardState::Unauthenticated
    );
}

#[tokio::test]
async fn test_logout_during_reconciliation_stays_logged_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(identity_json("u-1", "admin"))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    seed_storage(&file, Some("abc123"), None).await;

    let (ctx, _) = build_context(config_for(&server, &file), "/");
    ctx.start().await;
    assert!(ctx.session.is_reconciling());

    assert!(ctx.session.logout().await);
    ctx.session.wait_for_reconciliation().await;
    // Give the late profile response time to arrive and be discarded.
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(ctx.session.session().is_empty());
    assert_eq!(stored(&file).await, (None, None));
}

#[tokio::test]
async fn test_login_persists_across_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");

    let (ctx, _) = build_context(config_for(&server, &file), "/login");
    ctx.start().await;
    ctx.session
        .login(
            UserIdentity::new("u-3", Some(Role::Doctor)).with_email("doc@example.com"),
            "tok-3",
        )
        .await
        .unwrap();
    assert_eq!(ctx.guard.post_login_target(Some("%2Fclinic%2Fqueue")), "/clinic/queue");
    assert_eq!(ctx.guard.post_login_target(None), "/doctor/dashboard");
    drop(ctx);

    let (restarted, _) = build_context(config_for(&server, &file), "/clinic");
    let session = restarted.start().await;
    assert_eq!(session.token.as_deref(), Some("tok-3"));
    assert_eq!(
        session.identity.and_then(|i| i.email).as_deref(),
        Some("doc@example.com")
    );
    assert!(restarted.guard.evaluate(&[Role::Doctor], "/clinic").is_authorized());
}

#[tokio::test]
async fn test_forbidden_redirects_to_role_landing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    seed_storage(&file, Some("abc123"), Some(identity_json("u-1", "staff"))).await;

    let (ctx, _) = build_context(config_for(&server, &file), "/manager/reports");
    ctx.start().await;

    let decision = ctx.guard.evaluate(&[Role::Manager], "/manager/reports");
    assert_eq!(decision.state, GuardState::Forbidden);
    assert_eq!(decision.redirect.as_deref(), Some("/staff/dashboard"));
}

#[tokio::test]
async fn test_api_401_logs_out_and_guard_observes_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    seed_storage(&file, Some("abc123"), Some(identity_json("u-1", "customer"))).await;

    let (ctx, navigator) = build_context(config_for(&server, &file), "/orders");
    ctx.start().await;

    let mut watch = ctx.guard.watch(vec![Role::Customer], "/orders");
    assert!(watch.current().is_authorized());

    let err = ctx
        .pipeline
        .send(ctx.pipeline.get("/orders").unwrap())
        .await
        .unwrap_err();
    assert!(err.is_auth_rejected());

    let decision = watch.changed().await.unwrap();
    assert_eq!(decision.state, GuardState::Unauthenticated);
    assert_eq!(decision.redirect.as_deref(), Some("/login?redirect=%2Forders"));

    assert_eq!(stored(&file).await, (None, None));
    assert_eq!(navigator.history().last().unwrap(), "/login?redirect=%2Forders");
    assert_eq!(ctx.pipeline.loading().in_flight(), 0);
}

#[tokio::test]
async fn test_one_401_among_concurrent_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/expired"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(150)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    seed_storage(&file, Some("abc123"), Some(identity_json("u-1", "admin"))).await;

    let (ctx, navigator) = build_context(config_for(&server, &file), "/orders");
    ctx.start().await;

    let pipeline = &ctx.pipeline;
    let call = |url: &'static str| async move { pipeline.send(pipeline.get(url)?).await };
    let (a, b, c, d) = tokio::join!(
        call("/orders/slow"),
        call("/orders/slow"),
        call("/orders/slow"),
        call("/orders/expired"),
    );

    for slow in [a, b, c] {
        assert_eq!(slow.unwrap().status(), StatusCode::OK);
    }
    assert!(d.unwrap_err().is_auth_rejected());

    assert_eq!(pipeline.loading().in_flight(), 0);
    assert!(!pipeline.loading().is_visible());
    assert!(ctx.session.session().is_empty());
    assert_eq!(
        navigator.history(),
        vec!["/orders", "/login?redirect=%2Forders"]
    );
}

#[tokio::test]
async fn test_concurrent_401s_keep_return_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/a"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/b"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    seed_storage(&file, Some("abc123"), Some(identity_json("u-1", "customer"))).await;

    let (ctx, navigator) = build_context(config_for(&server, &file), "/orders");
    ctx.start().await;

    let pipeline = &ctx.pipeline;
    let call = |url: &'static str| async move { pipeline.send(pipeline.get(url)?).await };
    let (a, b) = tokio::join!(call("/orders/a"), call("/orders/b"));

    assert!(a.unwrap_err().is_auth_rejected());
    assert!(b.unwrap_err().is_auth_rejected());
    assert!(ctx.session.session().is_empty());
    assert_eq!(
        navigator.history(),
        vec!["/orders", "/login?redirect=%2Forders"]
    );
    assert_eq!(pipeline.loading().in_flight(), 0);
}

#[tokio::test]
async fn test_counter_settles_after_mixed_outcomes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (ctx, _) = build_context(config_for(&server, &dir.path().join("s.json")), "/");
    ctx.start().await;

    let pipeline = &ctx.pipeline;
    let call = |url: &'static str| async move { pipeline.send(pipeline.get(url)?).await };
    let (ok, broken, health, refused, ok2) = tokio::join!(
        call("/ok"),
        call("/broken"),
        call("/health"),
        call("http://127.0.0.1:9/unreachable"),
        call("/ok"),
    );

    assert_eq!(ok.unwrap().status(), StatusCode::OK);
    assert_eq!(ok2.unwrap().status(), StatusCode::OK);
    assert_eq!(broken.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(health.unwrap().status(), StatusCode::OK);
    assert!(refused.is_err());
    assert_eq!(pipeline.loading().in_flight(), 0);
}
