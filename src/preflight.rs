//! Setup verification for `sfdoc check`.
//!
//! Each check runs independently and reports its findings. Missing settings
//! are findings here, not startup errors, so checks read raw optional values
//! from [`PreflightSettings`].

use crate::completion::CompletionClient;
use crate::config::{
    DEFAULT_GENERATION_URL, DEFAULT_MODEL, ENV_API_KEY, ENV_SPACE_KEY, ENV_WIKI_BASE_URL,
    ENV_WIKI_EMAIL, ENV_WIKI_TOKEN,
};
use crate::confluence::{ConfluenceClient, WikiApi};
use crate::error::Error;
use crate::scanner::Scanner;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const API_KEY_PREFIX: &str = "sk-ant-";
const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// CI environment variables reported by the context check, with labels.
pub const CI_VARIABLES: [(&str, &str); 4] = [
    ("GITHUB_REPOSITORY", "Repository"),
    ("GITHUB_SHA", "Commit"),
    ("GITHUB_REF", "Ref"),
    ("GITHUB_ACTOR", "Actor"),
];

/// Raw settings inspected by the checks.
#[derive(Debug, Clone)]
pub struct PreflightSettings {
    /// Directory scanned for Salesforce sources
    pub root_dir: PathBuf,

    /// Generation API key, if set
    pub api_key: Option<String>,

    /// Generation API endpoint
    pub generation_url: String,

    /// Model used for the ping request
    pub model: String,

    /// Wiki account email, if set
    pub wiki_email: Option<String>,

    /// Wiki API token, if set
    pub wiki_token: Option<String>,

    /// Wiki base URL, if set
    pub wiki_base_url: Option<String>,

    /// Wiki space key, if set
    pub space_key: Option<String>,

    /// CI variables that were set, as `(label, value)`
    pub ci_context: Vec<(String, String)>,
}

impl Default for PreflightSettings {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            api_key: None,
            generation_url: DEFAULT_GENERATION_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            wiki_email: None,
            wiki_token: None,
            wiki_base_url: None,
            space_key: None,
            ci_context: Vec::new(),
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Check name
    pub name: &'static str,

    /// Whether the check passed
    pub passed: bool,

    /// Human-readable findings
    pub details: Vec<String>,
}

impl CheckResult {
    fn pass(name: &'static str, details: Vec<String>) -> Self {
        Self {
            name,
            passed: true,
            details,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            details: vec![detail.into()],
        }
    }
}

/// Results of every check, in execution order.
#[derive(Debug, Clone, Default)]
pub struct PreflightReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    /// Returns true if every check passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Returns the number of passed checks.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Prints the report to stdout.
    pub fn print(&self) {
        println!("\nsfdoc setup check");
        println!("{}", "=".repeat(60));
        for check in &self.checks {
            let mark = if check.passed { "✓" } else { "✗" };
            println!("\n{mark} {}", check.name);
            for detail in &check.details {
                println!("    {detail}");
            }
        }
        println!("\n{}", "=".repeat(60));
        if self.all_passed() {
            println!("All checks passed ({}/{})", self.passed_count(), self.checks.len());
        } else {
            println!(
                "Some checks failed ({}/{} passed)",
                self.passed_count(),
                self.checks.len()
            );
        }
    }
}

/// Runs every check.
#[must_use]
pub fn run_checks(settings: &PreflightSettings) -> PreflightReport {
    PreflightReport {
        checks: vec![
            check_sources(settings),
            check_generation_api(settings),
            check_wiki_api(settings),
            check_ci_context(settings),
        ],
    }
}

/// Counts Salesforce sources per artifact kind.
#[must_use]
pub fn check_sources(settings: &PreflightSettings) -> CheckResult {
    const NAME: &str = "Salesforce sources";

    let scanned = Scanner::new(&settings.root_dir).and_then(|scanner| scanner.scan());
    match scanned {
        Ok((snapshot, _)) => {
            let mut details: Vec<String> = snapshot
                .iter()
                .map(|(kind, files)| format!("{}: {} file(s)", kind.display_name(), files.file_count()))
                .collect();
            details.push(format!("Total: {} file(s)", snapshot.file_count()));
            CheckResult::pass(NAME, details)
        }
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// Verifies the generation API key with a minimal request.
#[must_use]
pub fn check_generation_api(settings: &PreflightSettings) -> CheckResult {
    const NAME: &str = "Generation API";

    let Some(key) = present(settings.api_key.as_deref()) else {
        return CheckResult::fail(NAME, format!("{ENV_API_KEY} is not set"));
    };
    if !key.starts_with(API_KEY_PREFIX) {
        return CheckResult::fail(
            NAME,
            format!("{ENV_API_KEY} has an invalid format (expected prefix '{API_KEY_PREFIX}')"),
        );
    }

    let pinged = CompletionClient::with_settings(
        key,
        &settings.generation_url,
        &settings.model,
        10,
        CHECK_TIMEOUT,
    )
    .and_then(|client| client.ping());

    match pinged {
        Ok(()) => CheckResult::pass(NAME, vec![format!("Connected ({})", settings.model)]),
        Err(Error::Upstream { status, .. }) => {
            CheckResult::fail(NAME, format!("API returned status {status}"))
        }
        Err(e) => CheckResult::fail(NAME, format!("Connection failed: {e}")),
    }
}

/// Verifies wiki credentials by looking up the configured space.
#[must_use]
pub fn check_wiki_api(settings: &PreflightSettings) -> CheckResult {
    const NAME: &str = "Wiki API";

    let email = present(settings.wiki_email.as_deref());
    let token = present(settings.wiki_token.as_deref());
    let base_url = present(settings.wiki_base_url.as_deref());
    let space_key = present(settings.space_key.as_deref());

    let (Some(email), Some(token), Some(base_url), Some(space_key)) =
        (email, token, base_url, space_key)
    else {
        let missing: Vec<&str> = [
            (email, ENV_WIKI_EMAIL),
            (token, ENV_WIKI_TOKEN),
            (base_url, ENV_WIKI_BASE_URL),
            (space_key, ENV_SPACE_KEY),
        ]
        .iter()
        .filter(|(value, _)| value.is_none())
        .map(|(_, name)| *name)
        .collect();
        return CheckResult::fail(NAME, format!("Missing settings: {}", missing.join(", ")));
    };

    let looked_up = ConfluenceClient::with_settings(base_url, email, token, space_key, CHECK_TIMEOUT)
        .and_then(|client| client.space(space_key));
    debug!("Space lookup result: {:?}", looked_up);

    match looked_up {
        Ok(space) => {
            let name = if space.name.is_empty() { space_key.to_string() } else { space.name };
            CheckResult::pass(NAME, vec![format!("Space: {name}"), format!("URL: {base_url}")])
        }
        Err(Error::Publish { status: 401, .. }) => CheckResult::fail(NAME, "Invalid credentials"),
        Err(Error::Publish { status: 404, .. }) => {
            CheckResult::fail(NAME, format!("Space '{space_key}' not found"))
        }
        Err(Error::Publish { status, .. }) => {
            CheckResult::fail(NAME, format!("API returned status {status}"))
        }
        Err(e) => CheckResult::fail(NAME, format!("Connection failed: {e}")),
    }
}

/// Reports CI context. Never fails.
#[must_use]
pub fn check_ci_context(settings: &PreflightSettings) -> CheckResult {
    const NAME: &str = "CI context";

    if settings.ci_context.is_empty() {
        return CheckResult::pass(NAME, vec!["No CI context (local run)".to_string()]);
    }
    CheckResult::pass(
        NAME,
        settings
            .ci_context
            .iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect(),
    )
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
