//! Agent Runner (spec.md §4.2, C2): invokes a configured agent with a
//! rendered prompt, applying compaction and returning token deltas.
//!
//! Grounded on the pack's `ChatOpenAI`/agent-cache pattern: an agent cache
//! keyed by `(runtime fingerprint, agent_id)` so identical keys reuse the
//! same conversational state across steps, and a model-client LRU keyed by
//! the runtime fingerprint so repeated steps against the same
//! provider/model/sampling configuration reuse one client.

pub mod token_counter;

use crate::budget::{CompactionConfig, ContextCompactor};
use crate::error::WorkflowError;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, TokenUsage};
use crate::spec::{AgentDef, ContextPolicyConfig, RuntimeDescriptor};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Builds a concrete [`LlmClient`] for a runtime descriptor. Implemented by
/// `wf-providers`; `wf-core` depends only on this seam, never on a
/// concrete provider crate (spec.md §1 "provider adapters... out of
/// scope").
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(&self, runtime: &RuntimeDescriptor) -> Arc<dyn LlmClient>;
}

/// Per-agent cached state: the system prompt it was configured with and
/// its running conversation, so repeated invocations accumulate history
/// the way a real multi-turn agent would.
struct AgentHandle {
    system_prompt: String,
    messages: Vec<Message>,
}

/// A small process-local LRU for model clients, keyed by the runtime
/// fingerprint (spec.md §9 "Agent & client caching": "Global LRU keyed on
/// an explicit config fingerprint; no hidden state").
struct ClientLru {
    capacity: usize,
    entries: HashMap<String, Arc<dyn LlmClient>>,
    order: VecDeque<String>,
}

impl ClientLru {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn touch(&mut self, key: &str) {
        self.order.retain(|k| k != key);
        self.order.push_back(key.to_string());
    }

    fn get(&mut self, key: &str) -> Option<Arc<dyn LlmClient>> {
        if let Some(client) = self.entries.get(key).cloned() {
            self.touch(key);
            Some(client)
        } else {
            None
        }
    }

    fn insert(&mut self, key: String, client: Arc<dyn LlmClient>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(evict) = self.order.pop_front() {
                self.entries.remove(&evict);
            }
        }
        self.touch(&key);
        self.entries.insert(key, client);
    }
}

pub struct AgentRunner {
    factory: Arc<dyn ClientFactory>,
    agent_cache: Mutex<HashMap<(String, String), AgentHandle>>,
    client_lru: Mutex<ClientLru>,
}

impl AgentRunner {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            agent_cache: Mutex::new(HashMap::new()),
            client_lru: Mutex::new(ClientLru::new(32)),
        }
    }

    async fn client_for(&self, runtime: &RuntimeDescriptor) -> Arc<dyn LlmClient> {
        let key = runtime.fingerprint();
        let mut lru = self.client_lru.lock().await;
        if let Some(client) = lru.get(&key) {
            return client;
        }
        let client = self.factory.build(runtime).await;
        lru.insert(key, client.clone());
        client
    }

    /// **invoke(agent_id, rendered_prompt, session_scoped_memory) →
    /// (response_text, input_tokens, output_tokens)** (spec.md §4.2).
    ///
    /// `warned` signals the budget tracker already crossed the warn ratio
    /// this run; when true and the context policy enables compaction, the
    /// agent's history is compacted once before this invocation, per
    /// agent instance, mirroring "applies conversation compaction once per
    /// agent instance".
    pub async fn invoke(
        &self,
        agent_id: &str,
        agent_def: &AgentDef,
        runtime: &RuntimeDescriptor,
        rendered_prompt: &str,
        context_policy: Option<&ContextPolicyConfig>,
        warned: bool,
    ) -> Result<(String, TokenUsage), WorkflowError> {
        let client = self.client_for(runtime).await;
        let fingerprint = runtime.fingerprint();
        let cache_key = (fingerprint, agent_id.to_string());

        let mut cache = self.agent_cache.lock().await;
        let handle = cache.entry(cache_key).or_insert_with(|| AgentHandle {
            system_prompt: agent_def.system_prompt.clone(),
            messages: Vec::new(),
        });

        if ContextCompactor::needs_compaction(warned, context_policy) {
            if let Some(policy) = context_policy {
                let config = CompactionConfig::from_policy(policy, runtime.model.as_str());
                match ContextCompactor::compact(&handle.messages, client.as_ref(), &config).await {
                    Ok(compacted) => handle.messages = compacted,
                    Err(e) => {
                        tracing::warn!(agent_id, error = %e, "compaction_failed_continuing_uncompacted");
                    }
                }
            }
        }

        handle.messages.push(Message::user(rendered_prompt));

        let request = CompletionRequest {
            system_prompt: handle.system_prompt.clone(),
            messages: handle.messages.clone(),
            model: runtime.model.clone(),
            temperature: runtime.sampling.temperature,
        };

        let response = client
            .complete(request)
            .await
            .map_err(|e: LlmError| WorkflowError::RuntimeFailure(e.to_string()))?;

        handle.messages.push(Message::assistant(response.text.clone()));

        let usage = if response.usage.total() > 0 {
            response.usage
        } else {
            let input_tokens = token_counter::count_messages(&handle.messages[..handle.messages.len() - 1], &runtime.model);
            let output_tokens = token_counter::count_text(
                &response.text,
                token_counter::encoding_for_model(&runtime.model),
            );
            TokenUsage {
                input_tokens,
                output_tokens,
            }
        };

        Ok((response.text, usage))
    }
}
