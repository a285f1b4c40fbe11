// Per-file history parsed from `git log --pretty=format:...`.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// `%H %an %aI %s`, unit-separated, record-separated.
pub const LOG_FORMAT: &str = "--pretty=format:%H%x1f%an%x1f%aI%x1f%s%x1e";

const FIELD_SEPARATOR: char = '\u{1f}';
const RECORD_SEPARATOR: char = '\u{1e}';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub short_hash: String,
    pub author: String,
    pub date: DateTime<FixedOffset>,
    pub message: String,
}

/// First eight characters of a commit hash.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

/// Parse log output; `Err` carries the offending record.
pub fn parse_log(output: &str) -> Result<Vec<CommitInfo>, String> {
    output
        .split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .map(|record| {
            let fields: Vec<&str> = record.splitn(4, FIELD_SEPARATOR).collect();
            let [hash, author, date, message] = fields.as_slice() else {
                return Err(record.to_string());
            };
            let date = DateTime::parse_from_rfc3339(date).map_err(|_| record.to_string())?;
            Ok(CommitInfo {
                hash: hash.to_string(),
                short_hash: short_hash(hash).to_string(),
                author: author.to_string(),
                date,
                message: message.to_string(),
            })
        })
        .collect()
}
