//! Placeholder substitution for step prompts

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use handlebars::Handlebars;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use super::TemplateStore;

/// Errors raised while turning a template id into a prompt
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template not found: {0}")]
    TemplateNotFound(String),

    #[error("Failed to render template {template}: {message}")]
    Render { template: String, message: String },
}

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_\-]*)\s*\}\}").expect("placeholder regex is valid"));

/// Simple `{{key}}` placeholders referenced by a template, sorted and deduplicated
///
/// Block helpers (`{{#if}}`, `{{/if}}`) and `{{else}}` are not variables.
pub fn placeholders(template: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .filter(|name| name != "else" && name != "this")
        .collect()
}

/// Renders templates from a store with string variables
pub struct PromptRenderer<S> {
    store: S,
    hbs: Handlebars<'static>,
}

impl<S: TemplateStore> PromptRenderer<S> {
    pub fn new(store: S) -> Self {
        let mut hbs = Handlebars::new();
        // Prompts are plain text, never HTML
        hbs.register_escape_fn(handlebars::no_escape);
        Self { store, hbs }
    }

    /// Render `template_id`, substituting `{{key}}` with `variables[key]`
    ///
    /// Placeholders without a value render empty and are reported with a
    /// warning; that is not an error. Returns the prompt plus the names that
    /// were left unresolved.
    pub fn render(
        &self,
        template_id: &str,
        variables: &HashMap<String, String>,
    ) -> Result<(String, Vec<String>), PromptError> {
        debug!(%template_id, var_count = variables.len(), "PromptRenderer::render: called");
        let template = self
            .store
            .load(template_id)
            .ok_or_else(|| PromptError::TemplateNotFound(template_id.to_string()))?;

        let unresolved: Vec<String> = placeholders(&template)
            .into_iter()
            .filter(|name| !variables.contains_key(name))
            .collect();
        if !unresolved.is_empty() {
            warn!(%template_id, ?unresolved, "Unresolved template variables");
        }

        let rendered = self
            .hbs
            .render_template(&template, variables)
            .map_err(|e| PromptError::Render {
                template: template_id.to_string(),
                message: e.to_string(),
            })?;

        debug!(%template_id, prompt_len = rendered.len(), "PromptRenderer::render: done");
        Ok((rendered, unresolved))
    }
}
