use std::io::Write;

use chrono::SecondsFormat;

use crate::error::Result;
use crate::view::PostView;

/// Write stored posts as CSV with columns `id,handle,time,text`, ordered by id.
/// `time` is RFC 3339 in UTC; rows with an out-of-range timestamp keep the raw
/// epoch seconds.
pub fn export_csv<W: Write>(view: &PostView, handle: Option<&str>, out: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["id", "handle", "time", "text"])?;

    let mut rows = 0;
    view.fetch(handle, None, |post| {
        let time = post
            .created_at()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| post.created.to_string());
        wtr.write_record([post.id.to_string(), post.handle, time, post.body])?;
        rows += 1;
        Ok(())
    })?;
    wtr.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::Post;
    use crate::store::repo::PostRepository;
    use crate::store::sqlite::SqliteRepo;

    #[test]
    fn writes_header_and_quoted_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("timeline.db");
        let repo = SqliteRepo::open(&path, "tweet").unwrap();
        repo.upsert_batch(&[
            Post {
                id: 2,
                created: 1_539_202_764,
                handle: "alice".into(),
                body: "hello, \"world\"".into(),
            },
            Post {
                id: 1,
                created: 0,
                handle: "alice".into(),
                body: "first".into(),
            },
        ])
        .unwrap();
        repo.close().unwrap();

        let view = PostView::open(&path, "tweet").unwrap();
        let mut buf = Vec::new();
        assert_eq!(export_csv(&view, Some("alice"), &mut buf).unwrap(), 2);

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "id,handle,time,text\n\
             1,alice,1970-01-01T00:00:00Z,first\n\
             2,alice,2018-10-10T20:19:24Z,\"hello, \"\"world\"\"\"\n"
        );
    }
}
