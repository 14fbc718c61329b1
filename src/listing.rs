//! `getdirfilelist.cgi` response parser.
//!
//! Firmware versions answer the listing call in one of two plain-text
//! dialects:
//!
//! ```text
//! sd//norm/2026_01_24_115023_00.TS;sd//norm/2026_01_24_114922_01.TS;
//! ```
//!
//! ```text
//! count=2
//! filename=2026_01_24_115023_00.TS&size=104857600
//! filename=2026_01_24_114922_01.TS&size=104857600
//! ```
//!
//! The dialect is sniffed per response.  Entries that cannot be understood are
//! skipped; parsing never fails as a whole.

use log::debug;

use crate::media::{is_media_file, Directory, FileRecord};
use crate::timestamp::parse_datetime;
use crate::urls;

const FILENAME_KEY: &str = "filename=";
const COUNT_KEY:    &str = "count=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `;`-separated device paths.
    DelimitedPath,
    /// One `filename=<name>` token per line.
    KeyValue,
}

impl Dialect {
    /// Delimited paths unless the body carries `filename=` tokens.
    pub fn sniff(body: &str) -> Self {
        if body.contains(FILENAME_KEY) {
            Dialect::KeyValue
        } else {
            Dialect::DelimitedPath
        }
    }
}

/// A listing entry before URLs are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    filename: String,
    path:     String,
}

/// Parse a listing `body` returned for `dir`, preserving response order.
pub fn parse_file_list(body: &str, dir: Directory, base_url: &str) -> Vec<FileRecord> {
    if body.trim().is_empty() {
        debug!("empty listing for {dir}");
        return Vec::new();
    }

    let dialect = Dialect::sniff(body);
    let entries = match dialect {
        Dialect::DelimitedPath => delimited_entries(body),
        Dialect::KeyValue      => key_value_entries(body, dir),
    };
    debug!("{dir}: {dialect:?} listing, {} entries", entries.len());

    entries
        .into_iter()
        .map(|e| build_record(e, dir, base_url))
        .collect()
}

fn build_record(entry: Entry, directory: Directory, base_url: &str) -> FileRecord {
    FileRecord {
        media_url:     urls::media_url(base_url, &entry.path),
        thumbnail_url: urls::thumbnail_url(base_url, &entry.path, &entry.filename),
        captured_at:   parse_datetime(&entry.filename),
        filename:      entry.filename,
        directory,
        path:          entry.path,
    }
}

fn delimited_entries(body: &str) -> Vec<Entry> {
    body.split(';')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .filter_map(|path| {
            let filename = path.rsplit('/').next()?;
            if filename.is_empty() || !is_media_file(filename) {
                debug!("skipping listing entry {path:?}");
                return None;
            }
            Some(Entry {
                filename: filename.to_string(),
                path:     path.to_string(),
            })
        })
        .collect()
}

fn key_value_entries(body: &str, dir: Directory) -> Vec<Entry> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains(COUNT_KEY))
        .filter_map(filename_token)
        .map(|filename| Entry {
            path: urls::reconstructed_path(dir, &filename),
            filename,
        })
        .collect()
}

/// Value of the `filename=` token, terminated by whitespace or `&`.
fn filename_token(line: &str) -> Option<String> {
    let start = line.find(FILENAME_KEY)? + FILENAME_KEY.len();
    let value: String = line[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '&')
        .collect();
    if value.is_empty() { None } else { Some(value) }
}

/// Extract `N` from `count="N"` / `count=N`.  Absent or malformed ⇒ 0.
pub fn parse_count(body: &str) -> u32 {
    let mut rest = body;
    while let Some(idx) = rest.find(COUNT_KEY) {
        rest = &rest[idx + COUNT_KEY.len()..];
        let digits: String = rest
            .trim_start_matches('"')
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(n) = digits.parse() {
            return n;
        }
    }
    0
}
