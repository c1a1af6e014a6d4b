pub mod export;

use rusqlite::{Connection, OpenFlags, params};
use std::path::Path;

use crate::domain::post::{IdRange, Post};
use crate::error::{Error, Result};
use crate::store::validate_table_name;

/// Reader over a synced table. Never creates the database and never writes.
pub struct PostView {
    conn: Connection,
    table: String,
}

impl PostView {
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        if !path.exists() {
            return Err(Error::config(format!(
                "database does not exist: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    /// Stream rows in id order, optionally restricted to one handle.
    pub fn fetch<F>(&self, handle: Option<&str>, limit: Option<usize>, mut f: F) -> Result<()>
    where
        F: FnMut(Post) -> Result<()>,
    {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT id, created, handle, body
            FROM {}
            WHERE ?1 IS NULL OR handle=?1
            ORDER BY id
            LIMIT ?2
            "#,
            self.table
        ))?;
        let mut rows = stmt.query(params![handle, limit])?;
        while let Some(r) = rows.next()? {
            f(Post {
                id: r.get(0)?,
                created: r.get(1)?,
                handle: r.get(2)?,
                body: r.get(3)?,
            })?;
        }
        Ok(())
    }

    /// Smallest and largest stored id, optionally for one handle.
    pub fn id_range(&self, handle: Option<&str>) -> Result<IdRange> {
        let (min_id, max_id) = self.conn.query_row(
            &format!(
                "SELECT MIN(id), MAX(id) FROM {} WHERE ?1 IS NULL OR handle=?1",
                self.table
            ),
            params![handle],
            |r| Ok((r.get::<_, Option<i64>>(0)?, r.get::<_, Option<i64>>(1)?)),
        )?;
        Ok(IdRange { min_id, max_id })
    }

    pub fn count(&self, handle: Option<&str>) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE ?1 IS NULL OR handle=?1",
                self.table
            ),
            params![handle],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn fetch_many(&self, limit: usize) -> Result<Vec<Post>> {
        let mut out = Vec::with_capacity(limit.min(1024));
        self.fetch(None, Some(limit), |p| {
            out.push(p);
            Ok(())
        })?;
        Ok(out)
    }

    pub fn fetch_all(&self) -> Result<Vec<Post>> {
        let mut out = Vec::new();
        self.fetch(None, None, |p| {
            out.push(p);
            Ok(())
        })?;
        Ok(out)
    }
}
