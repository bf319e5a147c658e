//! Commit message and revision metadata formatting.

use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;

use crate::model::ChangesetId;

/// How commit messages are encoded before they reach the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum MessageEncoding {
    /// Pass text through unchanged.
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// Replace every non-ASCII character with `?`.
    #[serde(rename = "ascii")]
    Ascii,
}

/// Normalise line endings and apply `encoding` to a source comment.
#[must_use]
pub fn sanitize_comment(comment: &str, encoding: MessageEncoding) -> String {
    let normalised = comment.replace("\r\n", "\n");
    match encoding {
        MessageEncoding::Utf8 => normalised,
        MessageEncoding::Ascii => normalised
            .chars()
            .map(|c| if c.is_ascii() { c } else { '?' })
            .collect(),
    }
}

/// `[Source Changeset #<id>]\n<comment>`.
#[must_use]
pub fn commit_message(changeset: ChangesetId, comment: &str, encoding: MessageEncoding) -> String {
    format!(
        "[Source Changeset #{changeset}]\n{}",
        sanitize_comment(comment, encoding)
    )
}

/// Message for the immediate commit a server-side rename produces.
#[must_use]
pub fn server_side_move_message(changeset: ChangesetId) -> String {
    format!("[Source Changeset #{changeset}]\nserver-side rename")
}

/// `yyyy-MM-ddTHH:mm:ss.fffffffZ`, the form `svn:date` is stored in.
#[must_use]
pub fn format_revision_date(at: DateTime<Utc>) -> String {
    // A leap second is written as the last instant of second 59.
    let at = at
        .with_nanosecond(at.nanosecond().min(999_999_999))
        .unwrap_or(at);
    format!(
        "{}.{:07}Z",
        at.format("%Y-%m-%dT%H:%M:%S"),
        at.timestamp_subsec_nanos() / 100
    )
}
