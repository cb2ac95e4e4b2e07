use crate::{
    completion::CompletionClient,
    config::Config,
    confluence::{ConfluenceClient, WikiApi},
    error::Result,
    markup::to_storage_markup,
    prompt::PromptAssembler,
    publisher::{PublishOutcome, Publisher},
    scanner::Scanner,
    title::{canonical_title, extract_h1, resolve_final_title},
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Statistics collected during pipeline execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Files visited during scanning
    pub files_visited: usize,

    /// Salesforce source files included in the prompt
    pub files_included: usize,

    /// Matched files skipped because they could not be read
    pub files_skipped: usize,

    /// Number of artifact kinds present
    pub artifact_kinds: usize,

    /// Prompt size in characters
    pub prompt_chars: usize,

    /// Rough prompt size in tokens
    pub prompt_tokens: usize,

    /// Generated document size in characters
    pub generated_chars: usize,

    /// Storage markup size in characters
    pub markup_chars: usize,

    /// Title derived from the discovered artifacts
    pub canonical_title: String,

    /// Title the document was published under
    pub final_title: String,

    /// Page identifier, when published
    pub page_id: Option<String>,

    /// Page URL, when published
    pub page_url: Option<String>,

    /// Page version after publishing
    pub page_version: Option<u64>,

    /// Whether an existing page was updated rather than created
    pub updated_existing: bool,

    /// Total execution time
    pub duration: Duration,

    /// Time spent scanning
    pub scan_duration: Duration,

    /// Time spent waiting for the generation API
    pub generate_duration: Duration,

    /// Time spent publishing
    pub publish_duration: Duration,
}

impl PipelineStats {
    /// Returns true if a page was created or updated.
    #[must_use]
    pub const fn published(&self) -> bool {
        self.page_id.is_some()
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║            Documentation Run Summary                  ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Files Visited:        {:>8}                        ║",
            self.files_visited
        );
        println!(
            "║   - Included:         {:>8}                        ║",
            self.files_included
        );
        println!(
            "║   - Skipped:          {:>8}                        ║",
            self.files_skipped
        );
        println!(
            "║ Artifact Kinds:       {:>8}                        ║",
            self.artifact_kinds
        );
        println!("║                                                       ║");
        println!(
            "║ Prompt Tokens (est):  {:>8}                        ║",
            self.prompt_tokens
        );
        println!(
            "║ Generated Chars:      {:>8}                        ║",
            self.generated_chars
        );
        println!("║                                                       ║");
        println!("║ Title:                                                ║");
        println!("║   {}", self.final_title);
        match (&self.page_id, &self.page_url) {
            (Some(id), Some(url)) => {
                let action = if self.updated_existing { "Updated" } else { "Created" };
                println!(
                    "║ {} page {} (version {})",
                    action,
                    id,
                    self.page_version.unwrap_or(1)
                );
                println!("║   {url}");
            }
            _ => println!("║ ⚠ Nothing was published (dry run mode)               ║"),
        }
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Scanning:         {:>8.2}s                     ║",
            self.scan_duration.as_secs_f64()
        );
        println!(
            "║   - Generating:       {:>8.2}s                     ║",
            self.generate_duration.as_secs_f64()
        );
        println!(
            "║   - Publishing:       {:>8.2}s                     ║",
            self.publish_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Main pipeline: scan, generate, convert and publish one document.
pub struct Pipeline<W: WikiApi = ConfluenceClient> {
    config: Config,
    scanner: Scanner,
    assembler: PromptAssembler,
    completion: CompletionClient,
    wiki: W,
}

impl Pipeline<ConfluenceClient> {
    /// Creates a pipeline publishing to Confluence.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The instruction template cannot be loaded
    /// - An HTTP client cannot be built
    pub fn new(config: Config) -> Result<Self> {
        let wiki = ConfluenceClient::new(&config)?;
        Self::with_wiki(config, wiki)
    }
}

impl<W: WikiApi> Pipeline<W> {
    /// Creates a pipeline publishing through the given wiki client.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::new`].
    pub fn with_wiki(config: Config, wiki: W) -> Result<Self> {
        config.validate()?;

        let scanner = Scanner::new(&config.root_dir)?;
        let mut assembler = PromptAssembler::new(config.version_label.clone())?;
        if let Some(ref path) = config.instructions_path {
            assembler = assembler.with_instructions_file(path)?;
        }
        let completion = CompletionClient::new(&config)?;

        Ok(Self {
            config,
            scanner,
            assembler,
            completion,
            wiki,
        })
    }

    /// Executes the complete pipeline and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **Scan**: Collects Salesforce sources from the root directory
    /// 2. **Generate**: Sends one prompt to the generation API
    /// 3. **Convert**: Resolves the title and renders storage markup
    /// 4. **Publish**: Creates or updates one wiki page
    ///
    /// The title is resolved from the generated text before any wiki search,
    /// so searches always use the final title.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails. Nothing is retried.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sfdoc::{Config, Pipeline};
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
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let mut stats = PipelineStats::default();

        info!("Starting documentation run");

        // Stage 1: Scanning
        info!("Stage 1/4: Scanning Salesforce sources...");
        let scan_start = Instant::now();
        let (snapshot, scan_stats) = self.scanner.scan()?;
        stats.scan_duration = scan_start.elapsed();
        stats.files_visited = scan_stats.visited_files;
        stats.files_included = snapshot.file_count();
        stats.files_skipped = scan_stats.unreadable_files;
        stats.artifact_kinds = snapshot.kind_count();

        for (kind, files) in snapshot.iter() {
            info!("  {}: {} file(s)", kind.display_name(), files.file_count());
        }
        info!(
            "✓ Collected {} files of {} kind(s) in {:.2}s",
            stats.files_included,
            stats.artifact_kinds,
            stats.scan_duration.as_secs_f64()
        );

        // Stage 2: Generation
        stats.canonical_title = canonical_title(&snapshot);
        info!("Canonical title: {}", stats.canonical_title);

        let prompt = self.assembler.assemble(&snapshot, &stats.canonical_title)?;
        stats.prompt_chars = prompt.text.len();
        stats.prompt_tokens = prompt.approx_tokens;

        info!(
            "Stage 2/4: Generating documentation (~{} tokens)...",
            prompt.approx_tokens
        );
        let generate_start = Instant::now();
        let generated = self.completion.complete(&prompt.text)?;
        stats.generate_duration = generate_start.elapsed();
        stats.generated_chars = generated.len();

        // Stage 3: Conversion
        info!("Stage 3/4: Converting to storage markup...");
        stats.final_title = resolve_final_title(&generated, &stats.canonical_title);
        if extract_h1(&generated).is_none() {
            warn!("Generated text has no level-1 heading, using canonical title");
        }
        let markup = to_storage_markup(&generated);
        stats.markup_chars = markup.len();

        // Stage 4: Publishing
        let publish_start = Instant::now();
        if self.config.dry_run {
            warn!("Dry run mode enabled - skipping publishing");
            self.print_dry_run(&stats.final_title, &markup);
        } else {
            info!("Stage 4/4: Publishing '{}'...", stats.final_title);
            let outcome = Publisher::new(&self.wiki).publish(&stats.final_title, &markup)?;
            let page = outcome.page();

            stats.updated_existing = matches!(outcome, PublishOutcome::Updated { .. });
            stats.page_url = Some(self.wiki.page_url(&page.id));
            stats.page_id = Some(page.id.clone());
            stats.page_version = Some(page.version);

            info!(
                "✓ {} page {}",
                if stats.updated_existing { "Updated" } else { "Created" },
                self.wiki.page_url(&page.id)
            );
        }
        stats.publish_duration = publish_start.elapsed();
        stats.duration = start_time.elapsed();

        info!(
            "✓ Documentation run completed in {:.2}s",
            stats.duration.as_secs_f64()
        );

        Ok(stats)
    }

    /// Prints the resolved title and markup for dry run mode.
    fn print_dry_run(&self, title: &str, markup: &str) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║                 Dry Run Output                        ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Title: {title}");
        println!("║ Space: {}", self.config.credentials.space_key);
        println!("║ ⚠ Nothing was published (dry run mode)               ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");
        println!("{markup}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confluence::{RemoteDocument, SpaceInfo};
    use assert_fs::prelude::*;
    use serde_json::json;

    struct MemoryWiki;

    impl WikiApi for MemoryWiki {
        fn search_pages(&self, _title: &str) -> Result<Vec<RemoteDocument>> {
            Ok(Vec::new())
        }

        fn get_page(&self, id: &str) -> Result<RemoteDocument> {
            Ok(RemoteDocument {
                id: id.to_string(),
                title: String::new(),
                version: 1,
            })
        }

        fn create_page(&self, title: &str, _body: &str) -> Result<RemoteDocument> {
            Ok(RemoteDocument {
                id: "100".to_string(),
                title: title.to_string(),
                version: 1,
            })
        }

        fn update_page(&self, id: &str, title: &str, _body: &str, version: u64) -> Result<RemoteDocument> {
            Ok(RemoteDocument {
                id: id.to_string(),
                title: title.to_string(),
                version,
            })
        }

        fn space(&self, key: &str) -> Result<SpaceInfo> {
            Ok(SpaceInfo {
                key: key.to_string(),
                name: String::new(),
            })
        }

        fn page_url(&self, id: &str) -> String {
            format!("https://wiki.test/pages/viewpage.action?pageId={id}")
        }
    }

    fn create_test_config(root: &std::path::Path, generation_url: &str, dry_run: bool) -> Config {
        Config::builder()
            .root_dir(root)
            .api_key("sk-ant-test")
            .wiki_email("docs@example.com")
            .wiki_token("token")
            .wiki_base_url("https://wiki.test")
            .space_key("DOCS")
            .generation_url(generation_url)
            .generation_timeout(Duration::from_secs(5))
            .dry_run(dry_run)
            .build()
            .unwrap()
    }

    fn mock_generation(server: &mut mockito::ServerGuard, text: &str) -> mockito::Mock {
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(json!({"content": [{"type": "text", "text": text}]}).to_string())
            .create()
    }

    #[test]
    fn test_pipeline_publishes_under_generated_title() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("classes/InvoiceService.cls")
            .write_str("public class InvoiceService {}")
            .unwrap();

        let mut server = mockito::Server::new();
        let generation = mock_generation(&mut server, "# Invoice Service\n\n**Bold** text");

        let config = create_test_config(
            temp.path(),
            &format!("{}/v1/messages", server.url()),
            false,
        );
        let pipeline = Pipeline::with_wiki(config, MemoryWiki).unwrap();
        let stats = pipeline.run().unwrap();

        generation.assert();
        assert_eq!(stats.canonical_title, "Apex InvoiceService");
        assert_eq!(stats.final_title, "Invoice Service");
        assert_eq!(stats.page_id.as_deref(), Some("100"));
        assert!(!stats.updated_existing);
        assert!(stats.published());
        assert_eq!(stats.files_included, 1);
    }

    #[test]
    fn test_pipeline_dry_run_does_not_publish() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("classes/InvoiceService.cls")
            .write_str("public class InvoiceService {}")
            .unwrap();

        let mut server = mockito::Server::new();
        let _generate = mock_generation(&mut server, "No heading here");

        let config = create_test_config(
            temp.path(),
            &format!("{}/v1/messages", server.url()),
            true,
        );
        let stats = Pipeline::with_wiki(config, MemoryWiki)
            .unwrap()
            .run()
            .unwrap();

        assert!(!stats.published());
        assert_eq!(stats.final_title, "Apex InvoiceService");
        assert!(stats.markup_chars > 0);
    }

    #[test]
    fn test_pipeline_stops_on_generation_failure() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("classes/InvoiceService.cls")
            .write_str("public class InvoiceService {}")
            .unwrap();

        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(500)
            .with_body("boom")
            .create();

        let config = create_test_config(
            temp.path(),
            &format!("{}/v1/messages", server.url()),
            false,
        );
        let err = Pipeline::with_wiki(config, MemoryWiki)
            .unwrap()
            .run()
            .unwrap_err();

        assert!(err.is_upstream());
    }

    #[test]
    fn test_pipeline_no_sources() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("README.md").write_str("# nothing").unwrap();

        let config = create_test_config(temp.path(), "http://127.0.0.1:9/v1/messages", false);
        let err = Pipeline::with_wiki(config, MemoryWiki)
            .unwrap()
            .run()
            .unwrap_err();

        assert!(matches!(err, crate::Error::NoFiles { .. }));
    }
}
