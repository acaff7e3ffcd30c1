//! Audit-trail synthesis.
//!
//! A new target item starts at revision 1, so the source's revision history
//! is flattened into one HTML document and stored as the first change
//! comment. Revisions are rendered newest first; each block lists the author,
//! the timestamp, the revision's own comment, and every field whose value
//! changed in that revision.

use crate::model::{Revision, WorkItem, display_value, fields};
use chrono::DateTime;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Largest history document the target accepts, in characters.
pub const MAX_HISTORY_LEN: usize = 1_048_575;

/// Fields that change on every revision and carry no information.
pub const EXCLUDED_FIELDS: [&str; 7] = [
    fields::HISTORY,
    fields::CHANGED_BY,
    fields::CHANGED_DATE,
    "System.Watermark",
    "System.AuthorizedDate",
    "System.AuthorizedAs",
    "System.RevisedDate",
];

const TIMESTAMP_FORMAT: &str = "%A, %B %-d, %Y %-I:%M:%S %p";

const FOOTER: &str = "<p>Migrated by wit-migrate.</p>";

/// Render the full history of `item`. Empty when it has no revisions.
#[must_use]
pub fn synthesize_history(item: &WorkItem) -> String {
    if item.revisions.is_empty() {
        return String::new();
    }

    let mut doc = String::new();
    doc.push_str("<p>History from previous work item:</p>");
    doc.push_str("<table border='1' style='width:100%;border-color:#C0C0C0;'>");

    for (index, revision) in item.revisions.iter().enumerate().rev() {
        let previous = index.checked_sub(1).map(|i| &item.revisions[i]);
        render_revision(&mut doc, revision, previous);
    }

    doc.push_str("</table>");
    doc.push_str(FOOTER);
    truncate_history(doc)
}

/// Hard cut at [`MAX_HISTORY_LEN`] characters.
#[must_use]
pub fn truncate_history(doc: String) -> String {
    match doc.char_indices().nth(MAX_HISTORY_LEN) {
        Some((byte_index, _)) => doc[..byte_index].to_string(),
        None => doc,
    }
}

fn render_revision(doc: &mut String, revision: &Revision, previous: Option<&Revision>) {
    doc.push_str("<tr><td style='align:right;width:100%'>");

    let author = revision
        .field(fields::CHANGED_BY)
        .map(display_value)
        .unwrap_or_default();
    let when = revision
        .field(fields::CHANGED_DATE)
        .map(format_timestamp)
        .unwrap_or_default();
    let _ = write!(doc, "<p><b>{author} on {when}</b></p>");

    if let Some(comment) = revision
        .field(fields::HISTORY)
        .and_then(Value::as_str)
        .filter(|comment| !comment.is_empty())
    {
        let _ = write!(doc, "<p>{comment}</p>");
    }

    doc.push_str("<table border='1' style='border-color:#C0C0C0;'>");
    doc.push_str("<tr><th>Field</th><th>Old Value</th><th>New Value</th></tr>");

    let mut external_links_changed = false;
    for (name, old, new) in changed_fields(revision, previous) {
        if name == fields::EXTERNAL_LINK_COUNT {
            external_links_changed = true;
        }
        let _ = write!(doc, "<tr><td>{name}</td><td>{old}</td><td>{new}</td></tr>");
    }
    doc.push_str("</table>");

    if external_links_changed && !revision.links.is_empty() {
        doc.push_str("<table border='1' style='border-color:#C0C0C0;'>");
        doc.push_str("<tr><th>Link Type</th><th>Description</th></tr>");
        for link in &revision.links {
            let _ = write!(
                doc,
                "<tr><td>{}</td><td>{}</td></tr>",
                link.kind.as_str(),
                link.description()
            );
        }
        doc.push_str("</table>");
    }

    doc.push_str("</td></tr>");
}

/// `(field, old, new)` for every non-excluded field that differs from the
/// previous revision.
fn changed_fields<'a>(
    revision: &'a Revision,
    previous: Option<&'a Revision>,
) -> Vec<(&'a str, String, String)> {
    let names: BTreeSet<&str> = revision
        .fields
        .keys()
        .chain(previous.into_iter().flat_map(|p| p.fields.keys()))
        .map(String::as_str)
        .filter(|name| !EXCLUDED_FIELDS.contains(name))
        .collect();

    names
        .into_iter()
        .filter_map(|name| {
            let old = previous
                .and_then(|p| p.field(name))
                .map(display_value)
                .unwrap_or_default();
            let new = revision.field(name).map(display_value).unwrap_or_default();
            (old != new).then_some((name, old, new))
        })
        .collect()
}

fn format_timestamp(value: &Value) -> String {
    let raw = display_value(value);
    DateTime::parse_from_rfc3339(&raw)
        .map_or(raw, |dt| dt.format(TIMESTAMP_FORMAT).to_string())
}
