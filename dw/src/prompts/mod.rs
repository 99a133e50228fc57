//! Prompt template system
//!
//! Step prompts are `.pmt` files rendered with Handlebars. Templates are
//! resolved through a [`TemplateStore`] that is injected into the step
//! executor, so tests can supply in-memory fixtures.
//!
//! Loading chain for [`PromptLoader`]:
//! 1. `{prompts.dir}/{name}.pmt` (configured override directory)
//! 2. `.docweaver/prompts/{name}.pmt` under the workspace root
//! 3. Embedded fallback compiled into the binary

pub mod embedded;
mod loader;
mod render;

pub use loader::{MemoryTemplates, PromptLoader, TemplateStore};
pub use render::{PromptError, PromptRenderer, placeholders};
