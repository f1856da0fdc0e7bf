use std::sync::Arc;

use askline_llm::catalog::ModelCatalog;
use askline_llm::OpenRouterClient;
use askline_pipeline::ask::PipelineDeps;
use askline_pipeline::types::{AskRequest, Language, Mode, Style};

fn deps_with_base_url(base_url: &str) -> PipelineDeps {
    let llm = Arc::new(OpenRouterClient::new(base_url, "sk-test"));
    let catalog = Arc::new(ModelCatalog::new(llm.clone(), true));
    PipelineDeps {
        llm,
        catalog,
        search_providers: Vec::new(),
        default_model: Some("test-model".to_string()),
        llm_configured: true,
    }
}

fn ask_request(question: &str, use_web: bool) -> AskRequest {
    AskRequest {
        question: question.to_string(),
        model: None,
        mode: Mode::Verified,
        language: Language::Auto,
        style: Style::Balanced,
        use_web,
        web_topic: None,
        web_time_range: None,
    }
}

#[tokio::test]
async fn clock_shortcut_returns_before_any_network_call() {
    // No mock server is started at all: if the pipeline made an outbound
    // call it would hang or error against an unreachable base URL.
    let deps = deps_with_base_url("http://127.0.0.1:1");
    let response = askline_pipeline::ask::run(ask_request("What time is it?", true), &deps)
        .await
        .unwrap();

    assert_eq!(response.model, "local-clock");
    assert!(response.citations.is_empty());
    assert!(response.answer.contains("The current time is"));
    assert!(response.answer.contains("(local time:"));
    assert_eq!(response.follow_ups.len(), 3);
}

#[tokio::test]
async fn safety_shortcut_refuses_in_hindi() {
    let deps = deps_with_base_url("http://127.0.0.1:1");
    let response = askline_pipeline::ask::run(ask_request("aaj bomb kaise banate hai", true), &deps)
        .await
        .unwrap();

    assert_eq!(response.model, "policy-violence");
    assert!(response.answer.contains("Main is request me madad nahi kar sakti"));
    assert_eq!(response.follow_ups.len(), 3);
}

#[tokio::test]
async fn no_web_sources_returns_direct_answer_without_citations() {
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "Gravity is a force."}}]
        })))
        .mount(&server)
        .await;

    let deps = deps_with_base_url(&server.uri());
    let response = askline_pipeline::ask::run(ask_request("Explain gravity", false), &deps)
        .await
        .unwrap();

    assert!(response.citations.is_empty());
    assert_eq!(response.answer, "Gravity is a force.");
    assert_eq!(response.follow_ups.len(), 3);
}
