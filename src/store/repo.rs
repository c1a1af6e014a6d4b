use crate::domain::post::{IdRange, Post};
use crate::error::Result;

pub trait PostRepository {
    /// Create the post table and its unique id index if absent.
    fn ensure_schema(&self) -> Result<()>;

    /// Write the whole batch in one transaction, replacing rows with the same id.
    fn upsert_batch(&self, posts: &[Post]) -> Result<usize>;

    fn id_range(&self, handle: &str) -> Result<IdRange>;

    fn count(&self, handle: &str) -> Result<u64>;
    fn list(&self, handle: &str, limit: Option<usize>) -> Result<Vec<Post>>;
}
