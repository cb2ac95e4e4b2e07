use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;

/// Default Messages API endpoint.
pub const DEFAULT_GENERATION_URL: &str = "https://api.anthropic.com/v1/messages";
/// Default model used for documentation generation.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default cap on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 4_000;
/// Default generation timeout in seconds.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 180;
const DEFAULT_WIKI_TIMEOUT_SECS: u64 = 30;
/// Default version label written into the document.
pub const DEFAULT_VERSION_LABEL: &str = "1.0";

/// Environment variable holding the generation API key.
pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
/// Environment variable holding the wiki account email.
pub const ENV_WIKI_EMAIL: &str = "ATLASSIAN_EMAIL";
/// Environment variable holding the wiki API token.
pub const ENV_WIKI_TOKEN: &str = "ATLASSIAN_API_TOKEN";
/// Environment variable holding the wiki base URL.
pub const ENV_WIKI_BASE_URL: &str = "ATLASSIAN_BASE_URL";
/// Environment variable holding the wiki space key.
pub const ENV_SPACE_KEY: &str = "CONFLUENCE_SPACE_KEY";

/// Credentials and endpoints of the two remote services.
#[derive(Debug)]
pub struct Credentials {
    /// Generation API key
    pub api_key: SecretString,

    /// Wiki account email (basic-auth user)
    pub wiki_email: String,

    /// Wiki API token (basic-auth password)
    pub wiki_token: SecretString,

    /// Wiki base URL without trailing slash
    pub wiki_base_url: String,

    /// Wiki space the documentation lives in
    pub space_key: String,
}

/// Configuration for one documentation run.
///
/// Built once at startup with [`Config::builder()`] and passed by reference
/// to the components that talk to remote services.
#[derive(Debug)]
#[non_exhaustive]
pub struct Config {
    /// Root directory scanned for Salesforce sources
    pub root_dir: PathBuf,

    /// Remote service credentials
    pub credentials: Credentials,

    /// Generation API endpoint
    pub generation_url: String,

    /// Model name sent to the generation API
    pub model: String,

    /// Maximum tokens the model may generate
    pub max_tokens: u32,

    /// Wait budget for the generation call
    pub generation_timeout: Duration,

    /// Wait budget for each wiki call
    pub wiki_timeout: Duration,

    /// Document version label rendered into the instructions
    pub version_label: String,

    /// Optional instruction template overriding the built-in one
    pub instructions_path: Option<PathBuf>,

    /// Generate and convert but do not publish
    pub dry_run: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sfdoc::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir(".")
    ///     .api_key("sk-ant-...")
    ///     .wiki_email("docs@example.com")
    ///     .wiki_token("token")
    ///     .wiki_base_url("https://example.atlassian.net/wiki")
    ///     .space_key("DOCS")
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the non-credential settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - Token or timeout limits are zero
    /// - The wiki base URL is not an HTTP(S) URL
    /// - The instruction template is missing or does not compile
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.max_tokens == 0 {
            return Err(Error::config("max_tokens must be greater than 0"));
        }

        if self.generation_timeout.is_zero() {
            return Err(Error::config("generation timeout must be greater than 0"));
        }

        let base = &self.credentials.wiki_base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::config(format!(
                "{ENV_WIKI_BASE_URL} must start with http:// or https://, got '{base}'"
            )));
        }

        if let Some(ref path) = self.instructions_path {
            crate::template_validator::TemplateValidator::validate_template(path)?;
        }

        Ok(())
    }

    /// Returns the API key for request headers.
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.credentials.api_key.expose_secret()
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    api_key: Option<String>,
    wiki_email: Option<String>,
    wiki_token: Option<String>,
    wiki_base_url: Option<String>,
    space_key: Option<String>,
    generation_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    generation_timeout: Option<Duration>,
    wiki_timeout: Option<Duration>,
    version_label: Option<String>,
    instructions_path: Option<PathBuf>,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Sets the root directory to scan.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the generation API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the wiki account email.
    #[must_use]
    pub fn wiki_email(mut self, email: impl Into<String>) -> Self {
        self.wiki_email = Some(email.into());
        self
    }

    /// Sets the wiki API token.
    #[must_use]
    pub fn wiki_token(mut self, token: impl Into<String>) -> Self {
        self.wiki_token = Some(token.into());
        self
    }

    /// Sets the wiki base URL.
    #[must_use]
    pub fn wiki_base_url(mut self, url: impl Into<String>) -> Self {
        self.wiki_base_url = Some(url.into());
        self
    }

    /// Sets the wiki space key.
    #[must_use]
    pub fn space_key(mut self, key: impl Into<String>) -> Self {
        self.space_key = Some(key.into());
        self
    }

    /// Overrides the generation API endpoint.
    #[must_use]
    pub fn generation_url(mut self, url: impl Into<String>) -> Self {
        self.generation_url = Some(url.into());
        self
    }

    /// Sets the model name.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the maximum number of generated tokens.
    #[must_use]
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the generation wait budget.
    #[must_use]
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = Some(timeout);
        self
    }

    /// Sets the wait budget of each wiki call.
    #[must_use]
    pub fn wiki_timeout(mut self, timeout: Duration) -> Self {
        self.wiki_timeout = Some(timeout);
        self
    }

    /// Sets the document version label.
    #[must_use]
    pub fn version_label(mut self, label: impl Into<String>) -> Self {
        self.version_label = Some(label.into());
        self
    }

    /// Sets a custom instruction template file.
    #[must_use]
    pub fn instructions_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.instructions_path = Some(path.into());
        self
    }

    /// Enables dry run mode (nothing is published).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming every missing credential, or
    /// any error from [`Config::validate`].
    pub fn build(self) -> Result<Config> {
        let mut missing = Vec::new();
        let api_key = required(self.api_key, ENV_API_KEY, &mut missing);
        let wiki_email = required(self.wiki_email, ENV_WIKI_EMAIL, &mut missing);
        let wiki_token = required(self.wiki_token, ENV_WIKI_TOKEN, &mut missing);
        let wiki_base_url = required(self.wiki_base_url, ENV_WIKI_BASE_URL, &mut missing);
        let space_key = required(self.space_key, ENV_SPACE_KEY, &mut missing);

        if !missing.is_empty() {
            return Err(Error::config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        let config = Config {
            root_dir: self.root_dir.unwrap_or_else(|| PathBuf::from(".")),
            credentials: Credentials {
                api_key: SecretString::from(api_key),
                wiki_email,
                wiki_token: SecretString::from(wiki_token),
                wiki_base_url: wiki_base_url.trim_end_matches('/').to_string(),
                space_key,
            },
            generation_url: self
                .generation_url
                .unwrap_or_else(|| DEFAULT_GENERATION_URL.to_string()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            generation_timeout: self
                .generation_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS)),
            wiki_timeout: self
                .wiki_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_WIKI_TIMEOUT_SECS)),
            version_label: self
                .version_label
                .unwrap_or_else(|| DEFAULT_VERSION_LABEL.to_string()),
            instructions_path: self.instructions_path,
            dry_run: self.dry_run,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Takes a non-blank value or records its variable name as missing.
fn required(value: Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => {
            missing.push(name);
            String::new()
        }
    }
}
