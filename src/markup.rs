//! Markdown to Confluence storage format conversion.
//!
//! The converter is a staged pipeline:
//!
//! 1. Fenced code and diagram blocks, then inline code spans, are moved into
//!    a side table and replaced by placeholder tokens.
//! 2. The remaining text is XML-escaped.
//! 3. Line-oriented blocks (headings, tables, lists) are rewritten; adjacent
//!    list items are merged into one container here, while newlines still
//!    mark line boundaries.
//! 4. Inline rewrites run: bold, then italic, then links.
//! 5. Every remaining newline becomes `<br/>`.
//! 6. Placeholders are replaced by the side-table contents, untouched by
//!    steps 2 to 5.
//!
//! Only a constrained Markdown subset is supported: `#`..`####` headings,
//! `**bold**`, `*italic*`, fenced blocks (`mermaid` ones become diagram
//! macros), inline code, pipe tables, `- ` and `1. ` lists and links.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const MARK: char = '\u{0}';
const DIAGRAM_LANGUAGE: &str = "mermaid";

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,4})[ \t]+(.+?)[ \t]*$").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+?)\*").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t]*- (.+)$").unwrap());
static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t]*\d+\. (.+)$").unwrap());
static TABLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*\|?[ \t]*:?-+:?[ \t]*(\|[ \t]*:?-+:?[ \t]*)*\|?[ \t]*$").unwrap());
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x00(\d+)\x00").unwrap());

/// Converts Markdown into Confluence storage markup.
///
/// # Examples
///
/// ```
/// use sfdoc::markup::to_storage_markup;
///
/// assert_eq!(to_storage_markup("# Title"), "<h1>Title</h1>");
/// assert_eq!(
///     to_storage_markup("**a** and *b*"),
///     "<strong>a</strong> and <em>b</em>"
/// );
/// ```
#[must_use]
pub fn to_storage_markup(markdown: &str) -> String {
    let source = markdown.replace("\r\n", "\n").replace(MARK, "");

    let mut literals = Literals::default();
    let text = extract_fenced_blocks(&source, &mut literals);
    let text = extract_inline_code(&text, &mut literals);
    let text = escape_xml(&text);
    let text = convert_blocks(&text);
    let text = convert_inline(&text);
    let text = text.replace('\n', "<br/>");

    literals.splice(&text)
}

/// Side table of already-rendered fragments that later passes must not touch.
#[derive(Debug, Default)]
struct Literals {
    fragments: Vec<String>,
}

impl Literals {
    fn stash(&mut self, rendered: String) -> String {
        let token = format!("{MARK}{}{MARK}", self.fragments.len());
        self.fragments.push(rendered);
        token
    }

    fn splice(&self, text: &str) -> String {
        PLACEHOLDER
            .replace_all(text, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.fragments.get(index))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

fn extract_fenced_blocks(text: &str, literals: &mut Literals) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut lines = text.split('\n');

    while let Some(line) = lines.next() {
        let Some(info) = line.trim_start().strip_prefix("```") else {
            out.push(line.to_string());
            continue;
        };

        let language = info.split_whitespace().next().unwrap_or("");
        let mut body = Vec::new();
        for inner in lines.by_ref() {
            if inner.trim() == "```" {
                break;
            }
            body.push(inner);
        }
        let body = body.join("\n");

        let rendered = if language.eq_ignore_ascii_case(DIAGRAM_LANGUAGE) {
            diagram_macro(&body)
        } else {
            code_macro(language, &body)
        };
        out.push(literals.stash(rendered));
    }

    out.join("\n")
}

fn extract_inline_code(text: &str, literals: &mut Literals) -> String {
    INLINE_CODE
        .replace_all(text, |caps: &Captures<'_>| {
            literals.stash(format!("<code>{}</code>", escape_xml(&caps[1])))
        })
        .into_owned()
}

fn diagram_macro(body: &str) -> String {
    format!(
        "<ac:structured-macro ac:name=\"{DIAGRAM_LANGUAGE}\"><ac:plain-text-body>{}</ac:plain-text-body></ac:structured-macro>",
        cdata(body)
    )
}

fn code_macro(language: &str, body: &str) -> String {
    let language: String = language
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '#' | '-' | '_' | '.'))
        .collect();

    let parameter = if language.is_empty() {
        String::new()
    } else {
        format!("<ac:parameter ac:name=\"language\">{language}</ac:parameter>")
    };

    format!(
        "<ac:structured-macro ac:name=\"code\">{parameter}<ac:plain-text-body>{}</ac:plain-text-body></ac:structured-macro>",
        cdata(body)
    )
}

/// Wraps text in a CDATA section, splitting any embedded terminator.
fn cdata(body: &str) -> String {
    format!("<![CDATA[{}]]>", body.replace("]]>", "]]]]><![CDATA[>"))
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Numbered,
}

impl ListKind {
    const fn tag(self) -> &'static str {
        match self {
            Self::Bullet => "ul",
            Self::Numbered => "ol",
        }
    }
}

fn list_item(line: &str) -> Option<(ListKind, &str)> {
    if let Some(caps) = BULLET.captures(line) {
        return caps.get(1).map(|m| (ListKind::Bullet, m.as_str()));
    }
    NUMBERED
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| (ListKind::Numbered, m.as_str()))
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

/// Rewrites headings, tables and lists. Each block is emitted on one line.
fn convert_blocks(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(caps) = HEADING.captures(line) {
            let level = caps[1].len();
            out.push(format!("<h{level}>{}</h{level}>", &caps[2]));
            i += 1;
            continue;
        }

        if let Some(consumed) = table_extent(&lines[i..]) {
            out.push(render_table(&lines[i..i + consumed]));
            i += consumed;
            continue;
        }

        if let Some((kind, _)) = list_item(line) {
            let mut items = Vec::new();
            while let Some((next_kind, content)) = lines.get(i).and_then(|l| list_item(l)) {
                if next_kind != kind {
                    break;
                }
                items.push(format!("<li>{content}</li>"));
                i += 1;
            }
            out.push(format!("<{tag}>{}</{tag}>", items.concat(), tag = kind.tag()));
            continue;
        }

        out.push(line.to_string());
        i += 1;
    }

    out.join("\n")
}

/// Returns the number of lines forming a table at the start of `lines`.
///
/// A table needs a header row, a separator row and at least one data row.
fn table_extent(lines: &[&str]) -> Option<usize> {
    let header = lines.first()?;
    let separator = lines.get(1)?;
    if !is_table_row(header) || !TABLE_SEPARATOR.is_match(separator) || !separator.contains('-') {
        return None;
    }

    let data_rows = lines[2..].iter().take_while(|l| is_table_row(l)).count();
    (data_rows > 0).then_some(2 + data_rows)
}

fn split_cells(row: &str) -> Vec<&str> {
    let mut cells: Vec<&str> = row.trim().split('|').map(str::trim).collect();
    if cells.first() == Some(&"") {
        cells.remove(0);
    }
    if cells.last() == Some(&"") {
        cells.pop();
    }
    cells
}

fn render_table(lines: &[&str]) -> String {
    let row = |cells: Vec<&str>, tag: &str| {
        let cells: String = cells
            .into_iter()
            .map(|cell| format!("<{tag}>{cell}</{tag}>"))
            .collect();
        format!("<tr>{cells}</tr>")
    };

    let header = row(split_cells(lines[0]), "th");
    let body: String = lines[2..]
        .iter()
        .map(|line| row(split_cells(line), "td"))
        .collect();

    format!("<table><tbody>{header}{body}</tbody></table>")
}

fn convert_inline(text: &str) -> String {
    let text = BOLD.replace_all(text, "<strong>$1</strong>");
    let text = ITALIC.replace_all(&text, "<em>$1</em>");
    LINK.replace_all(&text, "<a href=\"$2\">$1</a>").into_owned()
}
