//! # sfdoc
//!
//! Generates technical documentation for a Salesforce repository with an LLM
//! and publishes it to a Confluence space.
//!
//! ## Features
//!
//! - Discovery of Salesforce sources with `.gitignore` support
//! - Lightning and Aura bundles grouped by component
//! - Tera-based prompt with an overridable instruction template
//! - Markdown to Confluence storage markup conversion that never touches code
//! - Create-or-update publishing that finds pages under historical title spellings
//!
//! ## Quick Start
//!
//! ```no_run
//! use sfdoc::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./force-app")
//!     .api_key("sk-ant-...")
//!     .wiki_email("docs@example.com")
//!     .wiki_token("token")
//!     .wiki_base_url("https://example.atlassian.net/wiki")
//!     .space_key("DOCS")
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Scanner**: Collects Salesforce sources into a snapshot
//! 2. **Prompt**: Renders the snapshot and instructions into one prompt
//! 3. **Completion**: Sends the prompt to the generation API
//! 4. **Title / Markup**: Resolves the page title and converts the document
//! 5. **Publisher**: Creates or updates exactly one wiki page

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod file;
mod pipeline;
mod scanner;
mod template_validator;

pub mod artifact;
pub mod completion;
pub mod confluence;
pub mod markup;
pub mod preflight;
pub mod prompt;
pub mod publisher;
pub mod snapshot;
pub mod title;

pub use artifact::{ArtifactKind, Subtype};
pub use completion::CompletionClient;
pub use config::{
    Config, ConfigBuilder, Credentials, DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_GENERATION_URL,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_VERSION_LABEL, ENV_API_KEY, ENV_SPACE_KEY,
    ENV_WIKI_BASE_URL, ENV_WIKI_EMAIL, ENV_WIKI_TOKEN,
};
pub use confluence::{ConfluenceClient, RemoteDocument, WikiApi};
pub use error::{Error, Result};
pub use file::DiscoveredFile;
pub use pipeline::{Pipeline, PipelineStats};
pub use publisher::{PublishOutcome, Publisher};
pub use scanner::{ScanStats, Scanner};
pub use snapshot::RepositorySnapshot;

/// Runs one complete documentation run with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - No Salesforce sources are found
/// - The generation API fails or times out
/// - Publishing to the wiki fails
///
/// # Examples
///
/// ```no_run
/// use sfdoc::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .api_key("sk-ant-...")
///     .wiki_email("docs@example.com")
///     .wiki_token("token")
///     .wiki_base_url("https://example.atlassian.net/wiki")
///     .space_key("DOCS")
///     .build()?;
///
/// run(config)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<PipelineStats> {
    Pipeline::new(config)?.run()
}
