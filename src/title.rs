//! Document title resolution.
//!
//! The wiki's title search is fuzzy and pages may have been created under
//! several naming conventions, so a title is matched through a set of
//! spelling variants and a normalized comparison form.

use crate::artifact::TITLE_PRIORITY;
use crate::snapshot::RepositorySnapshot;
use once_cell::sync::Lazy;
use regex::Regex;

/// Title used when the snapshot offers nothing to name the document after.
pub const FALLBACK_TITLE: &str = "Salesforce Documentation";

static H1: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").expect("valid regex"));

/// Derives the canonical title from the highest-priority kind present.
///
/// The result is `"<Label> <ComponentName>"`, e.g. `"LWC orderSummary"`.
#[must_use]
pub fn canonical_title(snapshot: &RepositorySnapshot) -> String {
    TITLE_PRIORITY
        .iter()
        .find_map(|&kind| {
            snapshot
                .get(kind)
                .and_then(|files| files.primary_name(kind))
                .filter(|name| !name.is_empty())
                .map(|name| format!("{} {}", kind.label(), name))
        })
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

/// Normalizes a title for comparison.
///
/// Lowercases, drops everything but alphanumerics and whitespace, collapses
/// whitespace runs to single spaces and trims.
#[must_use]
pub fn normalize(title: &str) -> String {
    let kept: String = title
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Generates the spelling variants of a title, in matching order.
///
/// For `"LWC Foo"` these are `"LWC Foo"`, `"Foo"`, `"Foo (LWC)"`,
/// `"LWC - Foo"`, `"LWC_Foo"` and `"Foo_LWC"`. A single-token title only
/// yields itself.
#[must_use]
pub fn generate_variants(title: &str) -> Vec<String> {
    let title = title.trim();
    let mut variants = vec![title.to_string()];

    if let Some((label, rest)) = title.split_once(char::is_whitespace) {
        let rest = rest.trim();
        if !rest.is_empty() {
            for candidate in [
                rest.to_string(),
                format!("{rest} ({label})"),
                format!("{label} - {rest}"),
                format!("{label}_{rest}"),
                format!("{rest}_{label}"),
            ] {
                if !variants.contains(&candidate) {
                    variants.push(candidate);
                }
            }
        }
    }

    variants
}

/// Extracts the first level-1 heading of a Markdown document.
#[must_use]
pub fn extract_h1(markdown: &str) -> Option<String> {
    let mut in_fence = false;
    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = H1.captures(line) {
            let heading = caps[1].trim().replace("**", "");
            if !heading.is_empty() {
                return Some(heading);
            }
        }
    }
    None
}

/// Picks the title to publish under.
///
/// The generated document's H1 wins; otherwise the canonical title is kept so
/// unrelated runs do not collide on a shared literal.
#[must_use]
pub fn resolve_final_title(generated: &str, canonical: &str) -> String {
    extract_h1(generated).unwrap_or_else(|| canonical.to_string())
}
