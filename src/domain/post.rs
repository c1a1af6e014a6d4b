use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

pub type PostId = i64;

/// A stored post, one row of the timeline table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub created: i64, // epoch seconds
    pub handle: String,
    pub body: String,
}

impl Post {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }
}

/// Which side of the stored id range a page is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Backfill: ids below the stored minimum.
    Older,
    /// Refill: ids above the stored maximum.
    Newer,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Older => "oldest",
            Direction::Newer => "newest",
        }
    }
}

/// Smallest and largest stored id for a handle; both `None` when nothing is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdRange {
    pub min_id: Option<PostId>,
    pub max_id: Option<PostId>,
}

/// `created_at` as sent by the source: a formatted date or epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(i64),
    Formatted(String),
}

impl RawTimestamp {
    /// Legacy timelines send `Wed Oct 10 20:19:24 +0000 2018`, newer ones RFC 3339.
    pub fn to_epoch(&self) -> Result<i64> {
        match self {
            RawTimestamp::Epoch(secs) => Ok(*secs),
            RawTimestamp::Formatted(s) => {
                let s = s.trim();
                if let Ok(secs) = s.parse::<i64>() {
                    return Ok(secs);
                }
                DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y")
                    .or_else(|_| DateTime::parse_from_rfc3339(s))
                    .map(|dt| dt.timestamp())
                    .map_err(|e| Error::unavailable(format!("unparseable created_at '{s}': {e}")))
            }
        }
    }
}

/// A post record as returned by the timeline endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub id: PostId,
    pub created_at: RawTimestamp,
    #[serde(alias = "full_text")]
    pub text: String,
}

impl RawPost {
    pub fn into_post(self, handle: &str) -> Result<Post> {
        Ok(Post {
            id: self.id,
            created: self.created_at.to_epoch()?,
            handle: handle.to_string(),
            body: self.text,
        })
    }
}
