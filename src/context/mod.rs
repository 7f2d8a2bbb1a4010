//! Conversation contexts and their navigation commands
//!
//! A context scopes what the assistant is allowed to do: which pages it
//! can send the client to and which keywords map to them. Contexts are
//! static for the lifetime of the process. Built-in contexts are embedded
//! in the binary and can be overlaid by JSON files from a directory.

mod keyword;

pub use keyword::{KeywordMatch, KeywordMatcher, normalize};

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of the context used when none is given or the given one is unknown
pub const GENERAL_CONTEXT_ID: &str = "general";

/// Page the client is sent to when an intent is detected without a usable target
pub const FALLBACK_PAGE: &str = "/dashboard";

/// Built-in context assets compiled into the binary
const EMBEDDED_CONTEXTS: &[(&str, &str)] = &[
    ("general", include_str!("../../contexts/general.json")),
    ("investments", include_str!("../../contexts/investments.json")),
];

/// Maps a set of spoken keywords to a page of the web client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationCommand {
    /// Words or phrases that trigger this command
    pub keywords: Vec<String>,
    /// Client-side route the command navigates to, e.g. `/transfers`
    pub target_page: String,
    /// Higher priority wins when several commands match one utterance
    pub priority: i32,
    /// Natural-language description of the page, used in LLM prompts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named scope of assistant behavior with its navigation commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    /// Stable identifier clients send as `contextId`
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Short description of what this context covers
    pub description: String,
    /// Commands available in this context, any order
    #[serde(default)]
    pub navigation_commands: Vec<NavigationCommand>,
}

impl ConversationContext {
    /// Parse a context from its JSON representation
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, the context has an
    /// empty `id`, or a command's `target_page` is not a client route
    /// starting with `/`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let context: Self = serde_json::from_str(raw)?;
        if context.id.trim().is_empty() {
            return Err(Error::Context("context id must not be empty".to_string()));
        }
        for command in &context.navigation_commands {
            if !command.target_page.starts_with('/') {
                return Err(Error::Context(format!(
                    "context {}: target page {:?} must start with /",
                    context.id, command.target_page
                )));
            }
        }
        Ok(context)
    }

    /// Target pages of this context, highest priority first, deduplicated
    #[must_use]
    pub fn pages(&self) -> Vec<&str> {
        let mut commands: Vec<&NavigationCommand> = self.navigation_commands.iter().collect();
        commands.sort_by(|a, b| b.priority.cmp(&a.priority));
        let mut pages = Vec::new();
        for command in commands {
            let page = command.target_page.as_str();
            if !pages.contains(&page) {
                pages.push(page);
            }
        }
        pages
    }

    /// Whether `page` is a target of any command in this context
    #[must_use]
    pub fn knows_page(&self, page: &str) -> bool {
        self.navigation_commands
            .iter()
            .any(|command| command.target_page == page)
    }
}

/// All contexts known to the gateway, keyed by id
///
/// Always contains the `general` context, which doubles as the fallback
/// for unknown or missing context ids.
#[derive(Debug, Clone)]
pub struct ContextRegistry {
    contexts: HashMap<String, ConversationContext>,
}

impl ContextRegistry {
    /// Build the registry from the embedded context assets
    ///
    /// # Errors
    ///
    /// Returns an error if an embedded asset fails to parse or the
    /// `general` context is missing from the set.
    pub fn builtin() -> Result<Self> {
        let mut contexts = HashMap::new();
        for (id, raw) in EMBEDDED_CONTEXTS {
            let context = ConversationContext::from_json(raw)
                .map_err(|e| Error::Context(format!("embedded context '{id}': {e}")))?;
            contexts.insert(context.id.clone(), context);
        }
        let registry = Self { contexts };
        registry.require_general()?;
        Ok(registry)
    }

    /// Build the registry from the embedded assets plus `*.json` files in `dir`
    ///
    /// Files overlay embedded contexts with the same id. Unreadable or
    /// malformed files are skipped with a warning so one bad file does not
    /// take the gateway down.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded assets are invalid or `dir` cannot
    /// be listed.
    pub fn with_overlay(dir: &Path) -> Result<Self> {
        let mut registry = Self::builtin()?;
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::Context(format!("context dir {}: {e}", dir.display())))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let loaded = std::fs::read_to_string(&path)
                .map_err(Error::from)
                .and_then(|raw| ConversationContext::from_json(&raw));
            match loaded {
                Ok(context) => {
                    tracing::debug!(id = %context.id, path = %path.display(), "loaded context overlay");
                    registry.contexts.insert(context.id.clone(), context);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping invalid context file");
                }
            }
        }
        registry.require_general()?;
        Ok(registry)
    }

    fn require_general(&self) -> Result<()> {
        if self.contexts.contains_key(GENERAL_CONTEXT_ID) {
            Ok(())
        } else {
            Err(Error::Context(format!(
                "required context '{GENERAL_CONTEXT_ID}' is missing"
            )))
        }
    }

    /// Look up a context by exact id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ConversationContext> {
        self.contexts.get(id)
    }

    /// Resolve an optional client-supplied id, falling back to `general`
    ///
    /// Unknown ids resolve to the `general` context rather than erroring,
    /// so a stale client keeps working after a context is removed.
    #[must_use]
    pub fn resolve(&self, id: Option<&str>) -> &ConversationContext {
        if let Some(context) = id.and_then(|id| self.contexts.get(id)) {
            return context;
        }
        if let Some(id) = id {
            tracing::debug!(id, "unknown context id, using general");
        }
        self.contexts
            .get(GENERAL_CONTEXT_ID)
            .expect("checked at construction")
    }

    /// All contexts sorted by id
    #[must_use]
    pub fn list(&self) -> Vec<&ConversationContext> {
        let mut contexts: Vec<&ConversationContext> = self.contexts.values().collect();
        contexts.sort_by(|a, b| a.id.cmp(&b.id));
        contexts
    }

    /// Number of registered contexts
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the registry is empty (never true for a constructed registry)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
