//! # LLM Clients
//!
//! The model transport seam. The engine talks to models through the
//! [`LlmClient`] trait only: an HTTP transport with bounded retry/backoff,
//! a deterministic offline stub, and a fallback wrapper that downgrades
//! hard transport failures to the stub so a run always completes.

pub mod http;
pub mod offline;

use crate::config::EngineConfig;
use crate::models::ModelConfig;
use crate::trace::{TraceEvent, TraceSink};
use async_trait::async_trait;
use std::sync::Arc;

pub use http::HttpClient;
pub use offline::OfflineClient;

/// One completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Stable agent id, used for tracing and by the offline stub
    pub agent_id: String,
    /// System instructions
    pub system: String,
    /// User-side context
    pub user: String,
    /// Resolved model
    pub model: ModelConfig,
}

/// Model transport: `complete(prompt, model) -> raw text`
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String>;
}

/// Wraps a primary transport and falls back to the offline stub when the
/// primary fails hard (past its own retries). The fallback reason lands in
/// the trace, so a run that silently degraded is still auditable.
pub struct FallbackClient {
    primary: Arc<dyn LlmClient>,
    stub: OfflineClient,
    sink: Arc<dyn TraceSink>,
}

impl FallbackClient {
    pub fn new(primary: Arc<dyn LlmClient>, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            primary,
            stub: OfflineClient::new(),
            sink,
        }
    }
}

#[async_trait]
impl LlmClient for FallbackClient {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        match self.primary.complete(request).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(agent = %request.agent_id, "model call failed, falling back to offline stub: {}", e);
                self.sink.append(TraceEvent::error(
                    &request.agent_id,
                    &format!("transport failed, offline fallback used: {}", e),
                ));
                self.stub.complete(request).await
            }
        }
    }
}

/// Select the transport for one run from its config
pub fn client_for(config: &EngineConfig, sink: Arc<dyn TraceSink>) -> Arc<dyn LlmClient> {
    if config.offline {
        Arc::new(OfflineClient::new())
    } else {
        let http = Arc::new(HttpClient::new(
            config.model_timeout_secs,
            config.max_model_retries,
        ));
        Arc::new(FallbackClient::new(http, sink))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted clients for pipeline and swarm tests.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Canned reply or failure for one call
    #[derive(Debug, Clone)]
    pub enum Scripted {
        Text(String),
        Fail(String),
    }

    /// Client that serves scripted responses per agent id, falling back to
    /// the deterministic offline stub, and records every call it serves.
    pub struct ScriptedClient {
        responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
        stub: OfflineClient,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                stub: OfflineClient::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn script(&self, agent_id: &str, response: Scripted) {
            self.responses
                .lock()
                .unwrap()
                .entry(agent_id.to_string())
                .or_default()
                .push_back(response);
        }

        pub fn script_json(&self, agent_id: &str, value: serde_json::Value) {
            self.script(agent_id, Scripted::Text(value.to_string()));
        }

        /// Agent ids of every call served, in order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(request.agent_id.clone());
            let scripted = self
                .responses
                .lock()
                .unwrap()
                .get_mut(&request.agent_id)
                .and_then(VecDeque::pop_front);
            match scripted {
                Some(Scripted::Text(text)) => Ok(text),
                Some(Scripted::Fail(reason)) => Err(anyhow::anyhow!(reason)),
                None => self.stub.complete(request).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Scripted, ScriptedClient};
    use super::*;
    use crate::trace::MemorySink;

    fn request(agent_id: &str) -> CompletionRequest {
        CompletionRequest {
            agent_id: agent_id.to_string(),
            system: "system".into(),
            user: "user".into(),
            model: ModelConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_fallback_uses_stub_and_traces_reason() {
        let scripted = ScriptedClient::new();
        scripted.script("architect", Scripted::Fail("connection refused".into()));
        let sink = Arc::new(MemorySink::new());
        let client = FallbackClient::new(Arc::new(scripted), sink.clone());

        let text = client.complete(&request("architect")).await.unwrap();
        assert!(crate::validate::extract_payload(&text).is_some());

        let errors = sink.of_kind(crate::trace::TraceKind::Error);
        assert_eq!(errors.len(), 1);
        let message = errors[0].payload.as_ref().unwrap()["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.contains("offline fallback"));
        assert!(message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_client_for_offline_config() {
        let config = EngineConfig::offline();
        let client = client_for(&config, Arc::new(crate::trace::NullSink));
        // Offline client answers without any network
        let text = client.complete(&request("tester")).await.unwrap();
        assert!(!text.is_empty());
    }
}
