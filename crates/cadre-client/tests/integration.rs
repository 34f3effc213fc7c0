use std::time::Duration;

use cadre_api_models::LoginRequest;
use cadre_client::{ApiClient, ApiError, ApiRequest, Method};
use cadre_config::ClientConfig;
use cadre_events::{LogoutReason, SessionEvent};
use cadre_test_support::fixtures::{
    login_body, problem_body, refresh_body, sample_identity, token_expiring_in,
};
use futures_util::future::join_all;
use httpmock::MockServer;
use httpmock::prelude::*;
use serde_json::{Value, json};

fn client_for(server: &MockServer) -> anyhow::Result<ApiClient> {
    let config = ClientConfig::new(server.base_url().parse()?);
    Ok(ApiClient::new(&config)?)
}

fn alice_credentials() -> LoginRequest {
    LoginRequest {
        username: "alice@cadre.test".to_string(),
        password: "correct-pw".to_string(),
    }
}

fn mock_login(server: &MockServer, token: &str) -> httpmock::Mock<'_> {
    let body = login_body(&sample_identity(), token, "refresh-1");
    server.mock(move |when, then| {
        when.method(POST)
            .path("/auth/login")
            .json_body_partial(r#"{"username": "alice@cadre.test", "password": "correct-pw"}"#);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(body.clone());
    })
}

#[tokio::test]
async fn login_fetch_expire_refresh_retry_end_to_end() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let first_token = token_expiring_in(900);
    let second_token = token_expiring_in(1800);

    mock_login(&server, &first_token);
    let mut employees_fresh = server.mock(|when, then| {
        when.method(GET)
            .path("/employees")
            .header("authorization", format!("Bearer {first_token}"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([{"id": 7, "display_name": "Grace"}]));
    });

    let client = client_for(&server)?;
    assert!(!client.is_authenticated());

    let user = client.login(&alice_credentials()).await?;
    assert_eq!(user.display_name, "Alice");
    assert_eq!(client.current_user(), Some(sample_identity()));

    let employees: Vec<Value> = client
        .fetch_json(ApiRequest::new(Method::GET, "/employees"))
        .await?;
    assert_eq!(employees[0]["id"], 7);
    employees_fresh.assert();

    // The server now considers the first token expired.
    employees_fresh.delete();
    let employees_stale = server.mock(|when, then| {
        when.method(GET)
            .path("/employees")
            .header("authorization", format!("Bearer {first_token}"));
        then.status(401)
            .header("content-type", "application/json")
            .json_body(problem_body(401, "unauthorized", "token expired"));
    });
    let refresh = server.mock(|when, then| {
        when.method(POST)
            .path("/auth/refresh")
            .json_body_partial(r#"{"refresh_token": "refresh-1"}"#);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(refresh_body(&second_token));
    });
    let employees_refreshed = server.mock(|when, then| {
        when.method(GET)
            .path("/employees")
            .header("authorization", format!("Bearer {second_token}"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([{"id": 7, "display_name": "Grace"}]));
    });

    // The caller sees the data, transparently, with no error surfaced.
    let employees: Vec<Value> = client
        .fetch_json(ApiRequest::new(Method::GET, "/employees"))
        .await?;
    assert_eq!(employees[0]["id"], 7);

    employees_stale.assert();
    refresh.assert();
    employees_refreshed.assert();
    assert!(client.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn a_401_after_retry_never_triggers_a_second_refresh() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let token = token_expiring_in(900);

    mock_login(&server, &token);
    let employees = server.mock(|when, then| {
        when.method(GET).path("/employees");
        then.status(401)
            .header("content-type", "application/json")
            .json_body(problem_body(401, "unauthorized", "nope"));
    });
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"token": token_expiring_in(1800)}));
    });

    let client = client_for(&server)?;
    client.login(&alice_credentials()).await?;

    let err = client.get("/employees").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    // Original attempt plus exactly one retry; exactly one refresh.
    employees.assert_hits(2);
    refresh.assert_hits(1);
    // An unrecoverable authorization failure ends the session.
    assert!(!client.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn concurrent_401s_share_a_single_refresh() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let first_token = token_expiring_in(900);
    let second_token = token_expiring_in(1800);

    mock_login(&server, &first_token);
    let stale = server.mock(|when, then| {
        when.method(GET)
            .path("/employees")
            .header("authorization", format!("Bearer {first_token}"));
        then.status(401)
            .header("content-type", "application/json")
            .json_body(problem_body(401, "unauthorized", "token expired"));
    });
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(200)
            .delay(Duration::from_millis(150))
            .header("content-type", "application/json")
            .json_body(refresh_body(&second_token));
    });
    let refreshed = server.mock(|when, then| {
        when.method(GET)
            .path("/employees")
            .header("authorization", format!("Bearer {second_token}"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([{"id": 7}]));
    });

    let client = client_for(&server)?;
    client.login(&alice_credentials()).await?;

    let calls = (0..5).map(|_| {
        let client = client.clone();
        async move {
            client
                .fetch_json::<Vec<Value>>(ApiRequest::new(Method::GET, "/employees"))
                .await
        }
    });
    let results = join_all(calls).await;

    for result in results {
        let employees = result.expect("each caller should see the data");
        assert_eq!(employees[0]["id"], 7);
    }
    // One refresh storm, one network refresh.
    refresh.assert_hits(1);
    stale.assert_hits(5);
    refreshed.assert_hits(5);
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_clears_session_exactly_once() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let token = token_expiring_in(900);

    mock_login(&server, &token);
    server.mock(|when, then| {
        when.method(GET).path("/payroll");
        then.status(401)
            .header("content-type", "application/json")
            .json_body(problem_body(401, "unauthorized", "token expired"));
    });
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(401)
            .delay(Duration::from_millis(100))
            .header("content-type", "application/json")
            .json_body(problem_body(401, "unauthorized", "refresh token revoked"));
    });

    let client = client_for(&server)?;
    client.login(&alice_credentials()).await?;
    let mut events = client.subscribe(Some(0));

    let calls = (0..3).map(|_| {
        let client = client.clone();
        async move { client.get("/payroll").await }
    });
    for result in join_all(calls).await {
        assert!(matches!(result.unwrap_err(), ApiError::Unauthorized));
    }

    refresh.assert_hits(1);
    assert!(!client.is_authenticated());
    assert!(client.current_user().is_none());

    // All three failures collapse into one observable logout.
    let first = events.next().await.expect("login event");
    assert_eq!(first.event.kind(), "logged_in");
    let second = events.next().await.expect("logout event");
    assert!(matches!(
        second.event,
        SessionEvent::LoggedOut {
            reason: LogoutReason::SessionExpired
        }
    ));
    let third = tokio::time::timeout(Duration::from_millis(100), events.next()).await;
    assert!(third.is_err(), "no further session transitions expected");
    Ok(())
}

#[tokio::test]
async fn refresh_transport_failure_keeps_the_session() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let token = token_expiring_in(900);

    mock_login(&server, &token);
    server.mock(|when, then| {
        when.method(GET).path("/employees");
        then.status(401)
            .header("content-type", "application/json")
            .json_body(problem_body(401, "unauthorized", "token expired"));
    });
    server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(200)
            .delay(Duration::from_secs(2))
            .header("content-type", "application/json")
            .json_body(json!({"token": "never-delivered-in-time"}));
    });

    let mut config = ClientConfig::new(server.base_url().parse()?);
    config.timeout_secs = 1;
    let client = ApiClient::new(&config)?;
    client.login(&alice_credentials()).await?;

    let err = client.get("/employees").await.unwrap_err();
    assert!(matches!(err, ApiError::Network { .. }));
    // No response is not a rejection: the session survives.
    assert!(client.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn proactive_maintenance_refreshes_ahead_of_expiry() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    // Expires inside the default 30s margin, so maintenance is due now.
    let expiring_token = token_expiring_in(10);
    let long_lived_token = token_expiring_in(3600);

    mock_login(&server, &expiring_token);
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"token": long_lived_token}));
    });

    let client = client_for(&server)?;
    client.login(&alice_credentials()).await?;
    assert!(client.is_token_expired());

    assert!(client.refresh_if_expiring().await?);
    refresh.assert_hits(1);
    assert!(!client.is_token_expired());

    // Nothing left to do on the next tick.
    assert!(!client.refresh_if_expiring().await?);
    refresh.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn token_maintenance_loop_refreshes_on_its_first_tick() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let expiring_token = token_expiring_in(10);
    let fresh_token = token_expiring_in(3600);

    mock_login(&server, &expiring_token);
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(refresh_body(&fresh_token));
    });

    let client = client_for(&server)?;
    client.login(&alice_credentials()).await?;
    assert!(client.is_token_expired());

    let handle = client.spawn_token_maintenance();
    // The maintenance interval's first tick fires immediately; the next one
    // is minutes away, so exactly one refresh is expected.
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.abort();

    refresh.assert_hits(1);
    assert!(!client.is_token_expired());
    Ok(())
}

#[tokio::test]
async fn proactive_refresh_and_concurrent_401_share_one_flight() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    // Inside the default margin, so the maintenance path is due immediately.
    let expiring_token = token_expiring_in(10);
    let fresh_token = token_expiring_in(3600);

    mock_login(&server, &expiring_token);
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(200)
            .delay(Duration::from_millis(150))
            .header("content-type", "application/json")
            .json_body(refresh_body(&fresh_token));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/employees")
            .header("authorization", format!("Bearer {expiring_token}"));
        then.status(401)
            .header("content-type", "application/json")
            .json_body(problem_body(401, "unauthorized", "token expired"));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/employees")
            .header("authorization", format!("Bearer {fresh_token}"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([{"id": 7}]));
    });

    let client = client_for(&server)?;
    client.login(&alice_credentials()).await?;

    let (maintenance, fetched) =
        tokio::join!(client.refresh_if_expiring(), client.get("/employees"));
    assert!(maintenance?);
    assert!(fetched?.status().is_success());

    // Both paths joined the same in-flight refresh.
    refresh.assert_hits(1);
    assert!(!client.is_token_expired());
    Ok(())
}

#[tokio::test]
async fn session_survives_client_restarts_until_logout() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let token = token_expiring_in(900);
    let session_dir = tempfile::tempdir()?;

    mock_login(&server, &token);
    server.mock(|when, then| {
        when.method(POST).path("/auth/logout");
        then.status(204);
    });

    let mut config = ClientConfig::new(server.base_url().parse()?);
    config.session_dir = Some(session_dir.path().to_path_buf());

    let client = ApiClient::new(&config)?;
    client.login(&alice_credentials()).await?;
    drop(client);

    let revived = ApiClient::new(&config)?;
    assert!(revived.is_authenticated());
    assert_eq!(revived.current_user(), Some(sample_identity()));

    revived.logout().await;
    drop(revived);

    let after_logout = ApiClient::new(&config)?;
    assert!(!after_logout.is_authenticated());
    assert!(after_logout.current_user().is_none());
    Ok(())
}
