//! Shared test harness for E2E integration tests.
//!
//! Wires the real pipeline (config → LLM backend → planner → executor) and
//! the HTTP router to a wiremock LLM server and a scripted mock device.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use np_agent::Pipeline;
use np_agent::config::{AgentConfig, Secret};
use np_agent::inference::LlmBackend;
use np_api::routes::build_router;
use np_api::state::AppState;
use np_device::MockConnector;
use np_protocol::PipelineState;

/// End-to-end harness: one mock LLM server, one mock device.
pub struct TestHarness {
    /// Mock LLM HTTP server.
    pub llm: MockServer,
    /// Which API the mock server imitates.
    pub backend: LlmBackend,
    /// Scripted device shared with the pipeline.
    pub device: MockConnector,
    /// API state (shares the pipeline with `router`).
    pub state: AppState,
    /// Axum router for HTTP requests via `tower::oneshot`.
    pub router: Router,
}

impl TestHarness {
    /// Harness with an Ollama-style LLM and the given device script.
    pub async fn ollama(device: MockConnector) -> Self {
        Self::start(LlmBackend::Ollama, device, "cisco_xe").await
    }

    /// Harness with an OpenAI-compatible LLM and the given device script.
    pub async fn openai(device: MockConnector) -> Self {
        Self::start(LlmBackend::OpenAi, device, "cisco_xe").await
    }

    pub async fn start(backend: LlmBackend, device: MockConnector, device_type: &str) -> Self {
        let llm = MockServer::start().await;
        let config = agent_config(backend, &llm.uri(), device_type);
        let pipeline = Pipeline::from_config(&config, Arc::new(device.clone()))
            .expect("harness config is complete");
        let state = AppState::new(pipeline);
        let router = build_router(state.clone());

        Self {
            llm,
            backend,
            device,
            state,
            router,
        }
    }

    /// Make the LLM answer every request with these command lists.
    pub async fn plan(&self, show: &[&str], config: &[&str], verify: &[&str]) {
        let arguments = json!({
            "show_commands": show,
            "config_commands": config,
            "verify_commands": verify,
        })
        .to_string();
        self.respond_with_text(&arguments).await;
    }

    /// Make the LLM answer with raw model text (may be malformed).
    pub async fn respond_with_text(&self, text: &str) {
        let (route, body) = match self.backend {
            LlmBackend::Ollama => ("/api/chat", ollama_response(text)),
            LlmBackend::OpenAi => ("/chat/completions", openai_tool_response(text)),
        };
        self.llm.reset().await;
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.llm)
            .await;
    }

    /// Make the LLM fail with an HTTP status.
    pub async fn llm_fails(&self, status: u16, body: &str) {
        self.llm.reset().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.llm)
            .await;
    }

    /// Run the pipeline directly.
    pub async fn run(&self, query: &str) -> PipelineState {
        self.state.pipeline.run(query).await
    }

    /// POST /api/v1/queries. Returns (HTTP status code, response JSON body).
    pub async fn post_query(&self, query: &str) -> (StatusCode, serde_json::Value) {
        let body = json!({ "query": query });
        let response = self
            .router
            .clone()
            .oneshot(
                Request::post("/api/v1/queries")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }

    /// Number of requests the LLM server received.
    pub async fn llm_calls(&self) -> usize {
        self.llm
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

fn agent_config(backend: LlmBackend, url: &str, device_type: &str) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.llm.backend = backend;
    config.llm.base_url = Some(url.to_string());
    config.llm.model = Some("test-model".into());
    config.llm.api_key = Some(Secret::new("sk-test"));
    config.llm.timeout_secs = 5;
    config.device.device_type = device_type.to_string();
    config.device.host = Some("10.0.0.1".into());
    config.device.username = Some("admin".into());
    config.device.password = Some(Secret::new("secret"));
    config
}

/// Build an Ollama `/api/chat` response body.
pub fn ollama_response(content: &str) -> serde_json::Value {
    json!({
        "model": "test-model",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

/// Build an OpenAI `/chat/completions` response with a forced tool call.
pub fn openai_tool_response(arguments: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "finish_reason": "stop",
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "CommandsList", "arguments": arguments }
                }]
            }
        }]
    })
}

/// Device with canned output for the commands used across scenarios.
pub fn lab_router() -> MockConnector {
    MockConnector::new()
        .with_output(
            "show version",
            "Cisco IOS XE Software, Version 17.09.04a\ncsr1000v uptime is 2 days",
        )
        .with_output(
            "show ip interface brief",
            "Interface          IP-Address   OK? Method Status Protocol\n\
             GigabitEthernet1   10.0.0.1     YES manual up     up",
        )
        .with_output(
            "show running-config interface Loopback1",
            "interface Loopback1\n ip address 1.1.1.1 255.255.255.0\nend",
        )
}
