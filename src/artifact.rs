//! Salesforce artifact kinds and the glob table that recognizes them.
//!
//! Every kind is either *flat* (each matching file is its own component, e.g.
//! an Apex class) or *grouped* (several files in one bundle directory make up
//! a single component, e.g. the markup, logic, style and config files of a
//! Lightning Web Component).

use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Category of Salesforce source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ArtifactKind {
    /// Lightning Web Component bundle
    LightningComponent,
    /// Aura component bundle
    AuraComponent,
    /// Apex class
    ApexClass,
    /// Apex trigger
    ApexTrigger,
    /// Flow definition
    Flow,
    /// Custom object definition
    CustomObject,
    /// Custom field definition
    CustomField,
    /// Page layout
    PageLayout,
    /// Permission set
    PermissionSet,
    /// Custom metadata record
    CustomMetadata,
    /// Visualforce page
    VisualforcePage,
}

/// Role of a file inside a grouped component bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Subtype {
    /// Template markup (`.html`, `.cmp`)
    Markup,
    /// Component JavaScript
    Logic,
    /// Aura client-side controller
    Controller,
    /// Aura helper
    Helper,
    /// Stylesheet
    Style,
    /// Bundle metadata (`.js-meta.xml`)
    Config,
}

impl Subtype {
    /// Returns the lowercase identifier used in prompts.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Logic => "logic",
            Self::Controller => "controller",
            Self::Helper => "helper",
            Self::Style => "style",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// How the files of a kind are recognized and organized.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// One glob; every match is a standalone component.
    Flat {
        /// Glob matched against the path relative to the scan root
        pattern: &'static str,
        /// File name suffix stripped to obtain the component name
        suffix: &'static str,
    },
    /// One glob per subtype; files are grouped by their bundle directory.
    Grouped(&'static [(Subtype, &'static str)]),
}

// Config precedes Logic so that `*.js-meta.xml` is never read as JavaScript.
const LWC_PATTERNS: &[(Subtype, &str)] = &[
    (Subtype::Config, "**/lwc/*/*.js-meta.xml"),
    (Subtype::Markup, "**/lwc/*/*.html"),
    (Subtype::Logic, "**/lwc/*/*.js"),
    (Subtype::Style, "**/lwc/*/*.css"),
];

const AURA_PATTERNS: &[(Subtype, &str)] = &[
    (Subtype::Markup, "**/aura/*/*.cmp"),
    (Subtype::Controller, "**/aura/*/*Controller.js"),
    (Subtype::Helper, "**/aura/*/*Helper.js"),
    (Subtype::Style, "**/aura/*/*.css"),
];

/// Kinds consulted, in order, when deriving a canonical document title.
pub const TITLE_PRIORITY: &[ArtifactKind] = &[
    ArtifactKind::LightningComponent,
    ArtifactKind::AuraComponent,
    ArtifactKind::ApexClass,
    ArtifactKind::ApexTrigger,
    ArtifactKind::Flow,
    ArtifactKind::CustomObject,
];

impl ArtifactKind {
    /// Returns all kinds in table order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::LightningComponent,
            Self::AuraComponent,
            Self::ApexClass,
            Self::ApexTrigger,
            Self::Flow,
            Self::CustomObject,
            Self::CustomField,
            Self::PageLayout,
            Self::PermissionSet,
            Self::CustomMetadata,
            Self::VisualforcePage,
        ]
    }

    /// Returns the stable identifier of this kind.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::LightningComponent => "lwc",
            Self::AuraComponent => "aura",
            Self::ApexClass => "apex_classes",
            Self::ApexTrigger => "apex_triggers",
            Self::Flow => "flows",
            Self::CustomObject => "objects",
            Self::CustomField => "fields",
            Self::PageLayout => "layouts",
            Self::PermissionSet => "permission_sets",
            Self::CustomMetadata => "custom_metadata",
            Self::VisualforcePage => "visualforce_pages",
        }
    }

    /// Returns the short label used as the leading token of document titles.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LightningComponent => "LWC",
            Self::AuraComponent => "Aura",
            Self::ApexClass => "Apex",
            Self::ApexTrigger => "Trigger",
            Self::Flow => "Flow",
            Self::CustomObject => "Object",
            Self::CustomField => "Field",
            Self::PageLayout => "Layout",
            Self::PermissionSet => "PermissionSet",
            Self::CustomMetadata => "CustomMetadata",
            Self::VisualforcePage => "Visualforce",
        }
    }

    /// Returns the human-readable section heading used in prompts.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::LightningComponent => "Lightning Web Components",
            Self::AuraComponent => "Aura Components",
            Self::ApexClass => "Apex Classes",
            Self::ApexTrigger => "Apex Triggers",
            Self::Flow => "Flows",
            Self::CustomObject => "Custom Objects",
            Self::CustomField => "Custom Fields",
            Self::PageLayout => "Page Layouts",
            Self::PermissionSet => "Permission Sets",
            Self::CustomMetadata => "Custom Metadata",
            Self::VisualforcePage => "Visualforce Pages",
        }
    }

    /// Returns how files of this kind are matched and organized.
    #[must_use]
    pub const fn shape(self) -> Shape {
        match self {
            Self::LightningComponent => Shape::Grouped(LWC_PATTERNS),
            Self::AuraComponent => Shape::Grouped(AURA_PATTERNS),
            Self::ApexClass => Shape::Flat {
                pattern: "**/*.cls",
                suffix: ".cls",
            },
            Self::ApexTrigger => Shape::Flat {
                pattern: "**/*.trigger",
                suffix: ".trigger",
            },
            Self::Flow => Shape::Flat {
                pattern: "**/*.flow-meta.xml",
                suffix: ".flow-meta.xml",
            },
            Self::CustomObject => Shape::Flat {
                pattern: "**/*.object-meta.xml",
                suffix: ".object-meta.xml",
            },
            Self::CustomField => Shape::Flat {
                pattern: "**/*.field-meta.xml",
                suffix: ".field-meta.xml",
            },
            Self::PageLayout => Shape::Flat {
                pattern: "**/*.layout-meta.xml",
                suffix: ".layout-meta.xml",
            },
            Self::PermissionSet => Shape::Flat {
                pattern: "**/*.permissionset-meta.xml",
                suffix: ".permissionset-meta.xml",
            },
            Self::CustomMetadata => Shape::Flat {
                pattern: "**/*.md-meta.xml",
                suffix: ".md-meta.xml",
            },
            Self::VisualforcePage => Shape::Flat {
                pattern: "**/*.page",
                suffix: ".page",
            },
        }
    }

    /// Returns true if files of this kind are grouped into bundles.
    #[must_use]
    pub const fn is_grouped(self) -> bool {
        matches!(self.shape(), Shape::Grouped(_))
    }

    /// Derives the logical component name for a matched path.
    ///
    /// Grouped kinds are named after their bundle directory; flat kinds after
    /// the file name with the kind's suffix removed.
    #[must_use]
    pub fn component_name(self, path: &Path) -> String {
        match self.shape() {
            Shape::Grouped(_) => path
                .parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Shape::Flat { suffix, .. } => {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                file_name
                    .strip_suffix(suffix)
                    .map_or_else(|| file_name.clone(), str::to_string)
            }
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Compiled form of the artifact table.
#[derive(Debug, Clone)]
pub struct ArtifactMatcher {
    set: GlobSet,
    slots: Vec<(ArtifactKind, Option<Subtype>)>,
}

impl ArtifactMatcher {
    /// Compiles the patterns of every kind in [`ArtifactKind::all`].
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        Self::for_kinds(ArtifactKind::all())
    }

    /// Compiles the patterns of the given kinds only.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn for_kinds(kinds: &[ArtifactKind]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut slots = Vec::new();

        for &kind in kinds {
            match kind.shape() {
                Shape::Flat { pattern, .. } => {
                    builder.add(Self::compile(pattern)?);
                    slots.push((kind, None));
                }
                Shape::Grouped(patterns) => {
                    for &(subtype, pattern) in patterns {
                        builder.add(Self::compile(pattern)?);
                        slots.push((kind, Some(subtype)));
                    }
                }
            }
        }

        let set = builder
            .build()
            .map_err(|e| Error::invalid_pattern("<artifact table>", e.to_string()))?;

        Ok(Self { set, slots })
    }

    fn compile(pattern: &str) -> Result<globset::Glob> {
        GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::invalid_pattern(pattern, e.to_string()))
    }

    /// Classifies a path relative to the scan root.
    ///
    /// When several patterns match, the one listed first in the table wins.
    #[must_use]
    pub fn classify(&self, relative_path: &Path) -> Option<(ArtifactKind, Option<Subtype>)> {
        self.set
            .matches(relative_path)
            .into_iter()
            .min()
            .map(|index| self.slots[index])
    }
}
