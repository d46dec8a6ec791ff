//! Human-readable student identifiers: `{DEPT}{STREAM}{NNN}`.

use crate::counter;
use crate::error::Result;
use crate::registry;
use rusqlite::Connection;

/// Strip all whitespace and uppercase. The only place department and stream
/// names become identifier codes.
pub fn normalize_code(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn counter_key(dept_code: &str, stream_code: &str) -> String {
    format!("{dept_code}-{stream_code}")
}

/// Zero-pads to three digits; larger counts print in full.
pub fn format_student_id(dept_code: &str, stream_code: &str, count: i64) -> String {
    format!("{dept_code}{stream_code}{count:03}")
}

/// Resolve both references, bump the department/stream counter and build
/// the identifier. Call once per student, inside the transaction that
/// inserts it, so a failed insert also discards the increment.
pub fn assign_student_id(conn: &Connection, department_id: &str, stream_id: &str) -> Result<String> {
    let department = registry::department(conn, department_id)?;
    let stream = registry::stream(conn, stream_id)?;

    let dept_code = normalize_code(&department.name);
    let stream_code = normalize_code(&stream.name);
    let key = counter_key(&dept_code, &stream_code);
    let count = counter::increment(conn, &key)?;

    let student_id = format_student_id(&dept_code, &stream_code, count);
    tracing::debug!(%key, count, %student_id, "assigned student id");
    Ok(student_id)
}
