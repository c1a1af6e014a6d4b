use std::path::Path;

use log::debug;
use rusqlite::{Connection, OptionalExtension, params};

use crate::domain::post::{IdRange, Post};
use crate::error::{Error, Result};
use crate::store::repo::PostRepository;
use crate::store::validate_table_name;

/// Post table in a SQLite file. The connection is owned for the repo's
/// lifetime and released on drop or through [`SqliteRepo::close`].
pub struct SqliteRepo {
    conn: Connection,
    table: String,
}

impl SqliteRepo {
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::config(format!("invalid database path {}: {e}", path.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let repo = Self {
            conn,
            table: table.to_string(),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    pub fn open_in_memory(table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let repo = Self {
            conn: Connection::open_in_memory()?,
            table: table.to_string(),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    pub fn get(&self, id: i64) -> Result<Option<Post>> {
        let post = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, created, handle, body FROM {} WHERE id=?1",
                    self.table
                ),
                params![id],
                |r| {
                    Ok(Post {
                        id: r.get(0)?,
                        created: r.get(1)?,
                        handle: r.get(2)?,
                        body: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(post)
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Storage(e))
    }
}

impl PostRepository for SqliteRepo {
    fn ensure_schema(&self) -> Result<()> {
        let t = &self.table;
        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {t} (
                id      INTEGER,
                created INTEGER,
                handle  TEXT,
                body    TEXT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS {t}_id_unique ON {t} (id);
            "#
        ))?;
        Ok(())
    }

    fn upsert_batch(&self, posts: &[Post]) -> Result<usize> {
        if posts.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                r#"
                INSERT INTO {} (id, created, handle, body)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                  created=excluded.created,
                  handle=excluded.handle,
                  body=excluded.body
                "#,
                self.table
            ))?;

            for p in posts {
                stmt.execute(params![p.id, p.created, p.handle, p.body])?;
            }
        }
        tx.commit()?;
        debug!("upserted {} rows into {}", posts.len(), self.table);
        Ok(posts.len())
    }

    fn id_range(&self, handle: &str) -> Result<IdRange> {
        let (min_id, max_id) = self.conn.query_row(
            &format!("SELECT MIN(id), MAX(id) FROM {} WHERE handle=?1", self.table),
            params![handle],
            |r| Ok((r.get::<_, Option<i64>>(0)?, r.get::<_, Option<i64>>(1)?)),
        )?;
        Ok(IdRange { min_id, max_id })
    }

    fn count(&self, handle: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE handle=?1", self.table),
            params![handle],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    fn list(&self, handle: &str, limit: Option<usize>) -> Result<Vec<Post>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT id, created, handle, body
            FROM {}
            WHERE handle=?1
            ORDER BY id
            LIMIT ?2
            "#,
            self.table
        ))?;

        let mut rows = stmt.query(params![handle, limit])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            out.push(Post {
                id: r.get(0)?,
                created: r.get(1)?,
                handle: r.get(2)?,
                body: r.get(3)?,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64, body: &str) -> Post {
        Post {
            id,
            created: 1_700_000_000 + id,
            handle: "alice".into(),
            body: body.into(),
        }
    }

    #[test]
    fn empty_table_has_no_range() {
        let repo = SqliteRepo::open_in_memory("tweet").unwrap();
        assert_eq!(repo.id_range("alice").unwrap(), IdRange::default());
        assert_eq!(repo.count("alice").unwrap(), 0);
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let repo = SqliteRepo::open_in_memory("tweet").unwrap();
        repo.upsert_batch(&[post(1, "a")]).unwrap();
        repo.ensure_schema().unwrap();
        repo.ensure_schema().unwrap();
        assert_eq!(repo.count("alice").unwrap(), 1);
    }

    #[test]
    fn upsert_overwrites_same_id() {
        let repo = SqliteRepo::open_in_memory("tweet").unwrap();
        repo.upsert_batch(&[post(7, "first")]).unwrap();

        let mut edited = post(7, "edited");
        edited.created = 42;
        repo.upsert_batch(&[edited.clone()]).unwrap();

        assert_eq!(repo.count("alice").unwrap(), 1);
        assert_eq!(repo.get(7).unwrap(), Some(edited));
    }

    #[test]
    fn id_range_tracks_min_and_max() {
        let repo = SqliteRepo::open_in_memory("tweet").unwrap();
        let batch: Vec<_> = (100..=105).map(|id| post(id, "x")).collect();
        assert_eq!(repo.upsert_batch(&batch).unwrap(), 6);
        assert_eq!(
            repo.id_range("alice").unwrap(),
            IdRange {
                min_id: Some(100),
                max_id: Some(105)
            }
        );
        assert_eq!(repo.id_range("bob").unwrap(), IdRange::default());
    }

    #[test]
    fn empty_batch_writes_nothing() {
        let repo = SqliteRepo::open_in_memory("tweet").unwrap();
        assert_eq!(repo.upsert_batch(&[]).unwrap(), 0);
        assert_eq!(repo.count("alice").unwrap(), 0);
    }

    #[test]
    fn list_is_ordered_and_limited() {
        let repo = SqliteRepo::open_in_memory("tweet").unwrap();
        repo.upsert_batch(&[post(3, "c"), post(1, "a"), post(2, "b")])
            .unwrap();
        let ids: Vec<_> = repo
            .list("alice", Some(2))
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(repo.list("alice", None).unwrap().len(), 3);
    }

    #[test]
    fn rejects_unsafe_table_name() {
        assert!(matches!(
            SqliteRepo::open_in_memory("t; drop"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn reopens_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("timeline.db");

        let repo = SqliteRepo::open(&path, "tweet").unwrap();
        repo.upsert_batch(&[post(1, "a")]).unwrap();
        repo.close().unwrap();

        let repo = SqliteRepo::open(&path, "tweet").unwrap();
        assert_eq!(repo.count("alice").unwrap(), 1);
    }
}
