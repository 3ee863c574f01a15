//! Shared application state injected into every request handler.
//!
//! The loaded documents and the system prompt built from them live together
//! in one immutable [`Knowledge`] snapshot. Readers clone the current
//! `Arc<Knowledge>`; a reload builds a complete new snapshot first and then
//! swaps the pointer, so a request sees either the old or the new snapshot,
//! never a mix. Concurrent reloads are last-write-wins.

use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::completion::{CompletionProvider, CompletionRelay, OpenAiProvider};
use crate::config::{Config, PromptConfig};
use crate::line::{ChatTransport, LineClient};
use crate::loader::load_documents;
use crate::models::Knowledge;
use crate::prompt::compose_system_prompt;

/// Builds a snapshot from the current contents of `dir`.
pub fn build_knowledge(dir: &Path, prompt: &PromptConfig) -> Knowledge {
    let documents = load_documents(dir);
    let system_context = compose_system_prompt(&documents, prompt);
    Knowledge {
        documents,
        system_context,
        loaded_at: Utc::now(),
    }
}

/// Owner of the current knowledge snapshot.
pub struct KnowledgeBase {
    dir: PathBuf,
    prompt: PromptConfig,
    current: RwLock<Arc<Knowledge>>,
}

impl KnowledgeBase {
    /// Loads `dir` once and keeps the result as the current snapshot.
    pub fn load(dir: impl Into<PathBuf>, prompt: PromptConfig) -> Self {
        let dir = dir.into();
        let initial = build_knowledge(&dir, &prompt);
        Self {
            dir,
            prompt,
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot(&self) -> Arc<Knowledge> {
        // The lock only guards a pointer swap; a poisoned lock still holds a
        // complete snapshot.
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Rescans the directory and replaces the current snapshot. Blocking.
    pub fn reload(&self) -> Arc<Knowledge> {
        let fresh = Arc::new(build_knowledge(&self.dir, &self.prompt));
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = fresh.clone();
        fresh
    }
}

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub knowledge: Arc<KnowledgeBase>,
    pub relay: Arc<CompletionRelay>,
    pub transport: Arc<dyn ChatTransport>,
}

impl AppState {
    /// Wires the OpenAI provider and the LINE client from `config` and loads
    /// the document directory. Call once at process start.
    pub fn initialize(config: Config) -> Result<Self> {
        tracing::info!(dir = %config.documents.dir.display(), "initializing");
        config.warn_missing_secrets();

        let provider = OpenAiProvider::new(
            &config.completion,
            config.secrets.openai_api_key.clone(),
        )?;
        let transport = LineClient::new(
            &config.line.api_base,
            config.secrets.line_channel_access_token.clone(),
        )?;

        let state = Self::new(config, Arc::new(provider), Arc::new(transport));
        tracing::info!(
            docs = state.knowledge.snapshot().documents.len(),
            "initialization complete"
        );
        Ok(state)
    }

    /// Builds state around the given provider and transport, loading the
    /// configured document directory.
    pub fn new(
        config: Config,
        provider: Arc<dyn CompletionProvider>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        let knowledge = KnowledgeBase::load(&config.documents.dir, config.prompt.clone());
        let relay = CompletionRelay::new(provider, config.completion.fallback_reply.clone());
        Self {
            config: Arc::new(config),
            knowledge: Arc::new(knowledge),
            relay: Arc::new(relay),
            transport,
        }
    }

    /// Signature secret for incoming webhooks, if configured.
    pub fn channel_secret(&self) -> Option<&str> {
        self.config.secrets.line_channel_secret.as_deref()
    }
}
