//! Prompt assembly: repository context followed by the documentation instructions.

use crate::{
    artifact::ArtifactKind,
    error::{Error, Result},
    file::DiscoveredFile,
    snapshot::{ArtifactFiles, RepositorySnapshot},
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera, Value};

const CONTEXT_TEMPLATE: &str = "context";
const INSTRUCTIONS_TEMPLATE: &str = "instructions";
const CHARS_PER_TOKEN: usize = 4;

#[derive(Serialize)]
struct PromptContext<'a> {
    date: String,
    version_label: &'a str,
    canonical_title: &'a str,
    components: String,
    sections: Vec<SectionView<'a>>,
    summary: SummaryView,
}

#[derive(Serialize)]
struct SectionView<'a> {
    title: &'static str,
    file_count: usize,
    grouped: bool,
    files: Vec<FileView<'a>>,
    components: Vec<ComponentView<'a>>,
}

#[derive(Serialize)]
struct ComponentView<'a> {
    name: &'a str,
    files: Vec<FileView<'a>>,
}

#[derive(Serialize)]
struct FileView<'a> {
    path: &'a str,
    subtype: &'static str,
    content: &'a str,
    size_bytes: u64,
    line_count: usize,
}

impl<'a> FileView<'a> {
    fn new(file: &'a DiscoveredFile, subtype: &'static str) -> Self {
        Self {
            path: &file.path,
            subtype,
            content: &file.content,
            size_bytes: file.size_bytes,
            line_count: file.line_count,
        }
    }
}

#[derive(Serialize)]
struct SummaryView {
    rows: Vec<SummaryRow>,
    total_files: usize,
    total_bytes: u64,
}

#[derive(Serialize)]
struct SummaryRow {
    title: &'static str,
    file_count: usize,
}

/// An assembled prompt ready to be sent to the generation API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Full prompt text
    pub text: String,

    /// Rough token estimate, for logging only
    pub approx_tokens: usize,
}

/// Renders a [`RepositorySnapshot`] into a single prompt.
pub struct PromptAssembler {
    tera: Tera,
    version_label: String,
}

impl PromptAssembler {
    /// Creates an assembler with the built-in instruction template.
    ///
    /// # Errors
    ///
    /// Returns an error if template registration fails.
    pub fn new(version_label: impl Into<String>) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(CONTEXT_TEMPLATE, include_str!("../templates/context.tera"))
            .map_err(|e| Error::template(CONTEXT_TEMPLATE, e))?;
        tera.add_raw_template(
            INSTRUCTIONS_TEMPLATE,
            include_str!("../templates/instructions.tera"),
        )
        .map_err(|e| Error::template(INSTRUCTIONS_TEMPLATE, e))?;

        tera.register_filter("detect_language", detect_language_filter);

        Ok(Self {
            tera,
            version_label: version_label.into(),
        })
    }

    /// Replaces the built-in instruction template with a user file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not compile.
    pub fn with_instructions_file(mut self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.tera
            .add_raw_template(INSTRUCTIONS_TEMPLATE, &content)
            .map_err(|e| Error::template(path.to_string_lossy(), e))?;
        Ok(self)
    }

    /// Assembles the prompt for a snapshot.
    ///
    /// The prompt is never truncated; oversized prompts are left for the
    /// generation API to reject.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn assemble(&self, snapshot: &RepositorySnapshot, canonical_title: &str) -> Result<Prompt> {
        let context = PromptContext {
            date: chrono::Local::now().format("%d/%m/%Y").to_string(),
            version_label: &self.version_label,
            canonical_title,
            components: render_component_list(snapshot),
            sections: snapshot.iter().map(|(kind, files)| section_view(kind, files)).collect(),
            summary: SummaryView {
                rows: snapshot
                    .iter()
                    .map(|(kind, files)| SummaryRow {
                        title: kind.display_name(),
                        file_count: files.file_count(),
                    })
                    .collect(),
                total_files: snapshot.file_count(),
                total_bytes: snapshot.total_bytes(),
            },
        };

        let tera_context = Context::from_serialize(&context)
            .map_err(|e| Error::template(CONTEXT_TEMPLATE, e))?;

        let preamble = self
            .tera
            .render(CONTEXT_TEMPLATE, &tera_context)
            .map_err(|e| Error::template(CONTEXT_TEMPLATE, e))?;
        let instructions = self
            .tera
            .render(INSTRUCTIONS_TEMPLATE, &tera_context)
            .map_err(|e| Error::template(INSTRUCTIONS_TEMPLATE, e))?;

        let text = format!("{}\n\n{}", preamble.trim_end(), instructions.trim());
        let approx_tokens = text.chars().count().div_ceil(CHARS_PER_TOKEN);

        Ok(Prompt {
            text,
            approx_tokens,
        })
    }
}

fn section_view(kind: ArtifactKind, files: &ArtifactFiles) -> SectionView<'_> {
    match files {
        ArtifactFiles::Flat(list) => SectionView {
            title: kind.display_name(),
            file_count: list.len(),
            grouped: false,
            files: list.iter().map(|f| FileView::new(f, "")).collect(),
            components: Vec::new(),
        },
        ArtifactFiles::Grouped(group) => SectionView {
            title: kind.display_name(),
            file_count: files.file_count(),
            grouped: true,
            files: Vec::new(),
            components: group
                .iter()
                .map(|(name, bundle)| ComponentView {
                    name,
                    files: bundle
                        .files
                        .iter()
                        .map(|(subtype, f)| FileView::new(f, subtype.id()))
                        .chain(bundle.extras.iter().map(|f| FileView::new(f, "additional")))
                        .collect(),
                })
                .collect(),
        },
    }
}

/// Renders one line per kind: `- <Label>: name, name`.
#[must_use]
pub fn render_component_list(snapshot: &RepositorySnapshot) -> String {
    snapshot
        .iter()
        .map(|(kind, files)| {
            format!(
                "- {} ({}): {}",
                kind.display_name(),
                kind.label(),
                files.component_names(kind).join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Maps a Salesforce source path to a fence language.
fn detect_language_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let language = value.as_str().map_or("", |path| {
        if path.ends_with("-meta.xml") {
            return "xml";
        }
        match path.rsplit('.').next() {
            Some("cls" | "trigger") => "apex",
            Some("js") => "javascript",
            Some("html" | "page") => "html",
            Some("css") => "css",
            Some("cmp" | "xml") => "xml",
            _ => "",
        }
    });
    Ok(Value::String(language.to_string()))
}
