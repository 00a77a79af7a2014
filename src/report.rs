// Control Center session report.
//
// Extracts the known field paths from decoded cache blobs: the user list is
// the first top-level value's block data, and each user's session blob holds
// a collection of session objects whose own block data maps attribute names
// to values.

use std::fmt::Write as _;

use thiserror::Error;

use crate::stream::{BlockData, Stream, Value};

/// Cache key of the logged-in user collection.
pub const DEFAULT_USERS_KEY: &str = "http://cisco.com/controlCenterUsers:Users";

/// Prefix of per-user session keys; the user name is appended.
pub const DEFAULT_SESSION_PREFIX: &str = "http://cisco.com/controlCenterSessions:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("malformed payload: {0}")]
    Malformed(String),
}

fn malformed(msg: impl Into<String>) -> ReportError {
    ReportError::Malformed(msg.into())
}

/// One row of the session table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub user: String,
    pub remote_ip: String,
    pub session_id: String,
    /// Session start, milliseconds since the Unix epoch.
    pub start_time_ms: u64,
}

/// Block data of the stream's first top-level value.
fn first_block(stream: &Stream) -> Result<&BlockData, ReportError> {
    let first = stream
        .first()
        .ok_or_else(|| malformed("stream holds no values"))?;
    stream
        .data(first)
        .ok_or_else(|| malformed(format!("first value ({}) has no data", first.kind_name())))
}

/// Names of the logged-in users.
pub fn logged_in_users(stream: &Stream) -> Result<Vec<String>, ReportError> {
    match first_block(stream)? {
        BlockData::Seq(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| malformed(format!("user entry is {}", v.kind_name())))
            })
            .collect(),
        // tolerated: a map keyed by user name
        BlockData::Map(entries) => entries
            .iter()
            .map(|(k, _)| {
                k.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| malformed("user key is not a string"))
            })
            .collect(),
        BlockData::Pairs(_) => Err(malformed("user collection has non-string keys")),
    }
}

/// Session rows of `user` from that user's session blob.
pub fn session_rows(user: &str, stream: &Stream) -> Result<Vec<SessionRow>, ReportError> {
    let sessions = first_block(stream)?
        .as_seq()
        .ok_or_else(|| malformed("session collection is not a sequence"))?;

    sessions
        .iter()
        .map(|session| {
            let field = |path: &[&str]| {
                stream
                    .path(session, path)
                    .ok_or_else(|| malformed(format!("session has no {}", path.join("."))))
            };
            Ok(SessionRow {
                user: user.to_string(),
                remote_ip: scalar_text(field(&["data", "RemoteIpAddress"])?)?,
                session_id: scalar_text(field(&["data", "SessionId"])?)?,
                start_time_ms: field(&["data", "StartTime", "value"])?
                    .as_int()
                    .ok_or_else(|| malformed("StartTime.value is not an integer"))?,
            })
        })
        .collect()
}

fn scalar_text(value: &Value) -> Result<String, ReportError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Int(n) => Ok(n.to_string()),
        other => Err(malformed(format!("expected text, found {}", other.kind_name()))),
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Format epoch milliseconds as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_timestamp(ms: u64) -> String {
    let secs = ms / 1000;
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02} UTC",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Proleptic Gregorian date of a day count since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Render the aligned session table.
pub fn render_table(rows: &[SessionRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:12}   {:16}  {:30} {}",
        "User", "Remote IP", "Session ID", "Session Start Time"
    );
    let _ = writeln!(
        out,
        "{:12}   {:16}  {:30} {}",
        "----", "------ --", "------- --", "------- ----- ----"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:12}   {:16}  {:30} {}",
            row.user,
            row.remote_ip,
            row.session_id,
            format_timestamp(row.start_time_ms)
        );
    }
    out
}
