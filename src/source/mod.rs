pub mod twitter;

use crate::domain::post::{PostId, RawPost};
use crate::error::Result;

/// Parameters for one page of a user timeline.
///
/// `max_id` is inclusive and `since_id` exclusive, matching the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineQuery {
    pub handle: String,
    pub count: u32,
    pub since_id: Option<PostId>,
    pub max_id: Option<PostId>,
    pub exclude_replies: bool,
    pub include_retweets: bool,
    pub trim_user: bool,
}

/// A paginated-by-id timeline. Pages come back newest first; an empty page
/// means nothing more is available on that side.
pub trait TimelineSource {
    fn fetch_timeline(&self, query: &TimelineQuery) -> Result<Vec<RawPost>>;
}
