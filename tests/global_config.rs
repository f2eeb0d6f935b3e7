//! Transport built from the process-wide provider config.

use llm_decorate::config;
use llm_decorate::{
    ChatRequest, ChatTransport, ConfigError, HttpTransport, Message, Options, ProviderConfig,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn from_global_uses_installed_config() {
    assert!(matches!(
        HttpTransport::from_global(),
        Err(ConfigError::NotInitialized)
    ));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer global-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "from global" }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    config::set_global(ProviderConfig::custom(server.uri(), "global-key", "global-model"))
        .unwrap();
    assert!(matches!(
        config::set_global(ProviderConfig::openrouter("late")),
        Err(ConfigError::AlreadyInitialized)
    ));

    let transport = HttpTransport::from_global().unwrap();
    assert_eq!(transport.config().model, "global-model");

    let reply = transport
        .send(ChatRequest::new(vec![Message::user("hi")]), &Options::default())
        .await
        .unwrap();
    assert_eq!(reply.top().unwrap().text(), "from global");

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "global-model");
}
