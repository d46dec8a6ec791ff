//! Catalog maintenance: streams, departments, subjects and semesters.
//! Reads go through `registry`; this module owns the writes.

use crate::error::{RecordsError, Result};
use crate::ledger::FINAL_SEMESTER;
use crate::model::{Department, Semester, Stream, Subject};
use crate::registry;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use uuid::Uuid;

fn required_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RecordsError::validation("name must not be empty"));
    }
    Ok(name.to_string())
}

fn in_use(conn: &Connection, sql: &str, id: &str, what: &str) -> Result<()> {
    let used: Option<i64> = conn.query_row(sql, [id], |r| r.get(0)).optional()?;
    if used.is_some() {
        return Err(RecordsError::validation(format!(
            "cannot delete: still referenced by {what}"
        )));
    }
    Ok(())
}

fn deleted_or_not_found(n: usize, what: &str) -> Result<()> {
    if n == 0 {
        return Err(RecordsError::NotFound(format!("{what} not found")));
    }
    Ok(())
}

// --- streams ---------------------------------------------------------------

pub fn list_streams(conn: &Connection) -> Result<Vec<Stream>> {
    let mut stmt = conn.prepare("SELECT id, name FROM streams ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Stream {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_stream(conn: &Connection, name: &str) -> Result<Stream> {
    let stream = Stream {
        id: Uuid::new_v4().to_string(),
        name: required_name(name)?,
    };
    conn.execute(
        "INSERT INTO streams(id, name) VALUES(?, ?)",
        (&stream.id, &stream.name),
    )?;
    Ok(stream)
}

pub fn rename_stream(conn: &Connection, id: &str, name: &str) -> Result<Stream> {
    let name = required_name(name)?;
    let n = conn.execute("UPDATE streams SET name = ? WHERE id = ?", (&name, id))?;
    deleted_or_not_found(n, "stream")?;
    registry::stream(conn, id)
}

pub fn delete_stream(conn: &Connection, id: &str) -> Result<()> {
    in_use(
        conn,
        "SELECT 1 FROM departments WHERE stream_id = ? LIMIT 1",
        id,
        "a department",
    )?;
    let n = conn.execute("DELETE FROM streams WHERE id = ?", [id])?;
    deleted_or_not_found(n, "stream")
}

// --- departments -------------------------------------------------------------

pub fn list_departments(conn: &Connection, stream_id: Option<&str>) -> Result<Vec<Department>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, stream_id FROM departments
         WHERE (?1 IS NULL OR stream_id = ?1)
         ORDER BY name",
    )?;
    let rows = stmt
        .query_map([stream_id], |r| {
            Ok(Department {
                id: r.get(0)?,
                name: r.get(1)?,
                stream: r.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_department(conn: &Connection, name: &str, stream_id: &str) -> Result<Department> {
    let name = required_name(name)?;
    let stream = registry::stream(conn, stream_id)?;
    let department = Department {
        id: Uuid::new_v4().to_string(),
        name,
        stream: stream.id,
    };
    conn.execute(
        "INSERT INTO departments(id, name, stream_id) VALUES(?, ?, ?)",
        (&department.id, &department.name, &department.stream),
    )?;
    Ok(department)
}

pub fn update_department(
    conn: &Connection,
    id: &str,
    name: Option<&str>,
    stream_id: Option<&str>,
) -> Result<Department> {
    let mut department = registry::find_department(conn, id)?
        .ok_or_else(|| RecordsError::NotFound("department not found".to_string()))?;
    if let Some(name) = name {
        department.name = required_name(name)?;
    }
    if let Some(stream_id) = stream_id {
        department.stream = registry::stream(conn, stream_id)?.id;
    }
    conn.execute(
        "UPDATE departments SET name = ?, stream_id = ? WHERE id = ?",
        (&department.name, &department.stream, id),
    )?;
    Ok(department)
}

pub fn delete_department(conn: &Connection, id: &str) -> Result<()> {
    in_use(
        conn,
        "SELECT 1 FROM subjects WHERE department_id = ? LIMIT 1",
        id,
        "a subject",
    )?;
    let n = conn.execute("DELETE FROM departments WHERE id = ?", [id])?;
    deleted_or_not_found(n, "department")
}

// --- subjects ----------------------------------------------------------------

pub fn list_subjects(conn: &Connection, department_id: Option<&str>) -> Result<Vec<Subject>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, department_id FROM subjects
         WHERE (?1 IS NULL OR department_id = ?1)
         ORDER BY name",
    )?;
    let rows = stmt
        .query_map([department_id], |r| {
            Ok(Subject {
                id: r.get(0)?,
                name: r.get(1)?,
                department: r.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_subject(conn: &Connection, name: &str, department_id: &str) -> Result<Subject> {
    let name = required_name(name)?;
    let department = registry::department(conn, department_id)?;
    let subject = Subject {
        id: Uuid::new_v4().to_string(),
        name,
        department: department.id,
    };
    conn.execute(
        "INSERT INTO subjects(id, name, department_id) VALUES(?, ?, ?)",
        (&subject.id, &subject.name, &subject.department),
    )?;
    Ok(subject)
}

pub fn update_subject(
    conn: &Connection,
    id: &str,
    name: Option<&str>,
    department_id: Option<&str>,
) -> Result<Subject> {
    let mut subject = registry::find_subject(conn, id)?
        .ok_or_else(|| RecordsError::NotFound("subject not found".to_string()))?;
    if let Some(name) = name {
        subject.name = required_name(name)?;
    }
    if let Some(department_id) = department_id {
        subject.department = registry::department(conn, department_id)?.id;
    }
    conn.execute(
        "UPDATE subjects SET name = ?, department_id = ? WHERE id = ?",
        (&subject.name, &subject.department, id),
    )?;
    Ok(subject)
}

pub fn delete_subject(conn: &Connection, id: &str) -> Result<()> {
    in_use(
        conn,
        "SELECT 1 FROM semester_subjects WHERE subject_id = ? LIMIT 1",
        id,
        "a semester",
    )?;
    let n = conn.execute("DELETE FROM subjects WHERE id = ?", [id])?;
    deleted_or_not_found(n, "subject")
}

// --- semesters ---------------------------------------------------------------

pub fn list_semesters(conn: &Connection) -> Result<Vec<Semester>> {
    let mut stmt = conn.prepare("SELECT id FROM semesters ORDER BY number")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    ids.iter()
        .map(|id| registry::semester(conn, id))
        .collect()
}

fn check_number(conn: &Connection, number: i64, except_id: Option<&str>) -> Result<()> {
    if !(1..=FINAL_SEMESTER).contains(&number) {
        return Err(RecordsError::validation(format!(
            "semester number must be between 1 and {FINAL_SEMESTER}"
        )));
    }
    let taken: Option<String> = conn
        .query_row("SELECT id FROM semesters WHERE number = ?", [number], |r| {
            r.get(0)
        })
        .optional()?;
    match taken {
        Some(id) if Some(id.as_str()) != except_id => Err(RecordsError::validation(format!(
            "semester {number} already exists"
        ))),
        _ => Ok(()),
    }
}

fn check_subjects(conn: &Connection, subject_ids: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for id in subject_ids {
        if !seen.insert(id.as_str()) {
            return Err(RecordsError::validation(format!(
                "subject {id} listed twice"
            )));
        }
        registry::subject(conn, id)?;
    }
    Ok(())
}

fn link_subjects(conn: &Connection, semester_id: &str, subject_ids: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM semester_subjects WHERE semester_id = ?",
        [semester_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO semester_subjects(semester_id, subject_id, sort_order) VALUES(?, ?, ?)",
    )?;
    for (i, subject_id) in subject_ids.iter().enumerate() {
        stmt.execute((semester_id, subject_id, i as i64))?;
    }
    Ok(())
}

pub fn create_semester(conn: &Connection, number: i64, subject_ids: &[String]) -> Result<Semester> {
    check_number(conn, number, None)?;
    check_subjects(conn, subject_ids)?;

    let id = Uuid::new_v4().to_string();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO semesters(id, number) VALUES(?, ?)",
        (&id, number),
    )?;
    link_subjects(&tx, &id, subject_ids)?;
    tx.commit()?;
    registry::semester(conn, &id)
}

pub fn update_semester(
    conn: &Connection,
    id: &str,
    number: Option<i64>,
    subject_ids: Option<&[String]>,
) -> Result<Semester> {
    if registry::find_semester(conn, id)?.is_none() {
        return Err(RecordsError::NotFound("semester not found".to_string()));
    }
    if let Some(number) = number {
        check_number(conn, number, Some(id))?;
    }
    if let Some(subject_ids) = subject_ids {
        check_subjects(conn, subject_ids)?;
    }

    let tx = conn.unchecked_transaction()?;
    if let Some(number) = number {
        tx.execute("UPDATE semesters SET number = ? WHERE id = ?", (number, id))?;
    }
    if let Some(subject_ids) = subject_ids {
        link_subjects(&tx, id, subject_ids)?;
    }
    tx.commit()?;
    registry::semester(conn, id)
}

pub fn delete_semester(conn: &Connection, id: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM semester_subjects WHERE semester_id = ?", [id])?;
    let n = tx.execute("DELETE FROM semesters WHERE id = ?", [id])?;
    deleted_or_not_found(n, "semester")?;
    tx.commit()?;
    Ok(())
}

/// Subjects a student of `department_id` takes in `semester_id`.
pub fn subjects_for(conn: &Connection, semester_id: &str, department_id: &str) -> Result<Vec<Subject>> {
    let semester = registry::semester(conn, semester_id)?;
    registry::department_subjects(conn, &semester.id, department_id)
}
