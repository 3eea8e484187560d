use registry_circuitbreaker::CircuitBreakerConfig;
use registry_ratelimiter::RateLimiterConfig;
use registry_token::TokenManagerConfig;
use registry_upstream::{UpstreamClient, UpstreamClientConfig, UpstreamError};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body() -> serde_json::Value {
    serde_json::json!({
        "access_token": "tok-1",
        "token_type": "Bearer",
        "expires_in": 3600,
    })
}

#[tokio::test]
async fn fetches_token_then_organization_on_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/organisationer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "organisationer": [{ "identitetsbeteckning": "5560001712", "namn": "Acme AB" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = UpstreamClient::new(
        UpstreamClientConfig::new(server.uri()),
        TokenManagerConfig::new(format!("{}/token", server.uri()), "id", "secret", "scope"),
        RateLimiterConfig::default(),
        CircuitBreakerConfig::default(),
    );

    let result = client.organization("5560001712").await.unwrap();
    assert_eq!(result["organisationer"][0]["namn"], "Acme AB");
}

#[tokio::test]
async fn retries_exactly_once_after_a_401_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;

    // First call is unauthorized, second (after token invalidation) succeeds.
    Mock::given(method("POST"))
        .and(path("/organisationer"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/organisationer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "organisationer": [{ "identitetsbeteckning": "5560001712" }]
        })))
        .mount(&server)
        .await;

    let client = UpstreamClient::new(
        UpstreamClientConfig::new(server.uri()),
        TokenManagerConfig::new(format!("{}/token", server.uri()), "id", "secret", "scope"),
        RateLimiterConfig::default(),
        CircuitBreakerConfig::default(),
    );

    let result = client.organization("5560001712").await.unwrap();
    assert_eq!(result["organisationer"][0]["identitetsbeteckning"], "5560001712");
}

#[tokio::test]
async fn persistent_server_errors_exhaust_retries_and_open_the_circuit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/organisationer"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = UpstreamClient::new(
        UpstreamClientConfig::new(server.uri())
            .with_max_retries(1)
            .with_timeout(Duration::from_secs(2)),
        TokenManagerConfig::new(format!("{}/token", server.uri()), "id", "secret", "scope"),
        RateLimiterConfig::default(),
        CircuitBreakerConfig::builder().failure_threshold(1).build(),
    );

    let first = client.organization("5560001712").await;
    assert!(matches!(first, Err(UpstreamError::ServerError(_))));

    let second = client.organization("5560001712").await;
    assert!(matches!(second, Err(UpstreamError::CircuitOpen)));
}
