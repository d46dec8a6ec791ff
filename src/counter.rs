use crate::error::Result;
use rusqlite::Connection;

/// Atomically bump the counter for `key` and return the new value.
/// A missing key is created at 1. Runs as a single upsert statement so
/// concurrent writers never observe the same value.
pub fn increment(conn: &Connection, key: &str) -> Result<i64> {
    let count = conn.query_row(
        "INSERT INTO student_counters(counter_key, count) VALUES(?, 1)
         ON CONFLICT(counter_key) DO UPDATE SET count = student_counters.count + 1
         RETURNING count",
        [key],
        |r| r.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
pub fn current(conn: &Connection, key: &str) -> Result<Option<i64>> {
    use rusqlite::OptionalExtension;

    let count = conn
        .query_row(
            "SELECT count FROM student_counters WHERE counter_key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(count)
}
