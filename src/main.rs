use anyhow::Context;
use clap::{Args, FromArgMatches, Parser, Subcommand};
use sfdoc::preflight::{self, CI_VARIABLES, PreflightSettings};
use sfdoc::{
    Config, DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_GENERATION_URL, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_VERSION_LABEL, Pipeline,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "sfdoc",
    version,
    author,
    about = "Document a Salesforce repository with an LLM and publish it to Confluence",
    long_about = "Scan a Salesforce repository, generate technical documentation with the \
    Anthropic Messages API and publish it to a Confluence space.\n\n\
    Credentials are read from the environment (or the matching flags). An existing page \
    is found under any of its usual title spellings and updated in place; otherwise a new \
    page is created.\n\n\
    USAGE EXAMPLES:\n  \
      # Document the current repository\n  \
      sfdoc\n\n  \
      # Preview the converted page without publishing\n  \
      sfdoc run --dir ./force-app --dry-run\n\n  \
      # Verify credentials and repository layout\n  \
      sfdoc check"
)]
struct Cli {
    /// Root directory to scan for Salesforce sources
    #[arg(short, long, default_value = ".", value_name = "PATH", global = true)]
    dir: PathBuf,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate and publish the documentation (default)
    Run(RunArgs),

    /// Verify repository layout and remote credentials
    Check,
}

#[derive(Args, Debug)]
struct CredentialArgs {
    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Anthropic Messages API endpoint
    #[arg(long, env = "ANTHROPIC_API_URL", default_value = DEFAULT_GENERATION_URL, global = true)]
    api_url: String,

    /// Atlassian account email
    #[arg(long, env = "ATLASSIAN_EMAIL", global = true)]
    wiki_email: Option<String>,

    /// Atlassian API token
    #[arg(long, env = "ATLASSIAN_API_TOKEN", hide_env_values = true, global = true)]
    wiki_token: Option<String>,

    /// Confluence base URL, e.g. https://example.atlassian.net/wiki
    #[arg(long, env = "ATLASSIAN_BASE_URL", global = true)]
    wiki_base_url: Option<String>,

    /// Confluence space key
    #[arg(long, env = "CONFLUENCE_SPACE_KEY", global = true)]
    space_key: Option<String>,

    /// Model used for generation
    #[arg(long, default_value = DEFAULT_MODEL, global = true)]
    model: String,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Max tokens the model may generate
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Generation timeout in seconds
    #[arg(long, default_value_t = DEFAULT_GENERATION_TIMEOUT_SECS, value_name = "SECONDS")]
    timeout: u64,

    /// Version label written into the document
    #[arg(long, default_value = DEFAULT_VERSION_LABEL)]
    doc_version: String,

    /// Path to a custom Tera instruction template
    ///
    /// Available variables: date, version_label, canonical_title, components.
    #[arg(long, value_name = "FILE")]
    instructions: Option<PathBuf>,

    /// Generate and convert, print the result, but do not publish
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(cli.verbose) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Some(Command::Check) => check(&cli.dir, cli.credentials),
        Some(Command::Run(args)) => run(cli.dir, cli.credentials, args),
        None => RunArgs::default_values().and_then(|args| run(cli.dir, cli.credentials, args)),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

impl RunArgs {
    /// Values `sfdoc` uses when no subcommand is given, taken from the argument defaults.
    fn default_values() -> anyhow::Result<Self> {
        let matches = Self::augment_args(clap::Command::new("run")).try_get_matches_from(["run"])?;
        Self::from_arg_matches(&matches).context("Failed to resolve default run arguments")
    }
}

fn run(dir: PathBuf, creds: CredentialArgs, args: RunArgs) -> anyhow::Result<bool> {
    let mut builder = Config::builder()
        .root_dir(dir)
        .generation_url(creds.api_url)
        .model(creds.model)
        .max_tokens(args.max_tokens)
        .generation_timeout(Duration::from_secs(args.timeout))
        .version_label(args.doc_version)
        .dry_run(args.dry_run);

    if let Some(key) = creds.api_key {
        builder = builder.api_key(key);
    }
    if let Some(email) = creds.wiki_email {
        builder = builder.wiki_email(email);
    }
    if let Some(token) = creds.wiki_token {
        builder = builder.wiki_token(token);
    }
    if let Some(url) = creds.wiki_base_url {
        builder = builder.wiki_base_url(url);
    }
    if let Some(space) = creds.space_key {
        builder = builder.space_key(space);
    }
    if let Some(path) = args.instructions {
        builder = builder.instructions_path(path);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Documentation run failed")?;

    stats.print_summary();
    Ok(true)
}

fn check(dir: &std::path::Path, creds: CredentialArgs) -> anyhow::Result<bool> {
    let ci_context = CI_VARIABLES
        .iter()
        .filter_map(|(var, label)| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| ((*label).to_string(), v))
        })
        .collect();

    let settings = PreflightSettings {
        root_dir: dir.to_path_buf(),
        api_key: creds.api_key,
        generation_url: creds.api_url,
        model: creds.model,
        wiki_email: creds.wiki_email,
        wiki_token: creds.wiki_token,
        wiki_base_url: creds.wiki_base_url,
        space_key: creds.space_key,
        ci_context,
    };

    let report = preflight::run_checks(&settings);
    report.print();
    Ok(report.all_passed())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::new("sfdoc=info"),
        1 => EnvFilter::new("sfdoc=debug"),
        _ => EnvFilter::new("sfdoc=trace"),
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_args_match_explicit_run() {
        let defaults = RunArgs::default_values().unwrap();
        let cli = Cli::try_parse_from(["sfdoc", "run"]).unwrap();
        let Some(Command::Run(explicit)) = cli.command else {
            panic!("expected run subcommand");
        };

        assert_eq!(defaults.max_tokens, explicit.max_tokens);
        assert_eq!(defaults.timeout, explicit.timeout);
        assert_eq!(defaults.doc_version, explicit.doc_version);
        assert_eq!(defaults.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(defaults.doc_version, DEFAULT_VERSION_LABEL);
        assert!(!defaults.dry_run);
    }
}
