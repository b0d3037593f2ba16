//! Session keys and the raw-data directory convention
//!
//! Raw data are organized as:
//!
//! ```text
//! <data_root>/<subject>/2P/<date>/<site>/<grab>/video/
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Session key validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionKeyError {
    #[error("Invalid subject '{0}': must be non-empty and must not contain path separators")]
    InvalidSubject(String),

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid site '{0}': expected site<N>")]
    InvalidSite(String),

    #[error("Invalid grab '{0}': expected grab<NN> with a 2-digit number")]
    InvalidGrab(String),
}

/// Identifies one recording: (subject, date, site, grab)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey {
    subject: String,
    date: String,
    site: String,
    grab: String,
}

impl SessionKey {
    /// Parse and validate the four session identifiers
    pub fn parse(subject: &str, date: &str, site: &str, grab: &str) -> Result<Self, SessionKeyError> {
        if subject.is_empty()
            || subject == "."
            || subject == ".."
            || subject.contains('/')
            || subject.contains('\\')
        {
            return Err(SessionKeyError::InvalidSubject(subject.to_string()));
        }

        // NaiveDate accepts unpadded fields, so the shape is checked as well
        let date_shape_ok = date.len() == 10
            && date
                .char_indices()
                .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
        if !date_shape_ok || NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(SessionKeyError::InvalidDate(date.to_string()));
        }

        match site.strip_prefix("site") {
            Some(n) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => {}
            _ => return Err(SessionKeyError::InvalidSite(site.to_string())),
        }

        match grab.strip_prefix("grab") {
            Some(n) if n.len() == 2 && n.chars().all(|c| c.is_ascii_digit()) => {}
            _ => return Err(SessionKeyError::InvalidGrab(grab.to_string())),
        }

        Ok(Self {
            subject: subject.to_string(),
            date: date.to_string(),
            site: site.to_string(),
            grab: grab.to_string(),
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn grab(&self) -> &str {
        &self.grab
    }

    /// Grab directory: `<data_root>/<subject>/2P/<date>/<site>/<grab>`
    pub fn grab_directory(&self, data_root: &Path) -> PathBuf {
        data_root
            .join(&self.subject)
            .join("2P")
            .join(&self.date)
            .join(&self.site)
            .join(&self.grab)
    }

    /// Video directory: `<grab directory>/video`
    pub fn video_directory(&self, data_root: &Path) -> PathBuf {
        self.grab_directory(data_root).join("video")
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.subject, self.date, self.site, self.grab)
    }
}
