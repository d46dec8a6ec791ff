//! Read-only lookups of catalog entities. Every mutation in the student
//! workflows resolves its foreign keys through here first.

use crate::error::{RecordsError, Result};
use crate::model::{Department, Semester, Stream, Subject};
use rusqlite::{Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};

pub fn find_stream(conn: &Connection, id: &str) -> Result<Option<Stream>> {
    let stream = conn
        .query_row("SELECT id, name FROM streams WHERE id = ?", [id], |r| {
            Ok(Stream {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })
        .optional()?;
    Ok(stream)
}

pub fn stream(conn: &Connection, id: &str) -> Result<Stream> {
    find_stream(conn, id)?.ok_or_else(|| RecordsError::reference("stream", id))
}

pub fn find_department(conn: &Connection, id: &str) -> Result<Option<Department>> {
    let department = conn
        .query_row(
            "SELECT id, name, stream_id FROM departments WHERE id = ?",
            [id],
            |r| {
                Ok(Department {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    stream: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(department)
}

pub fn department(conn: &Connection, id: &str) -> Result<Department> {
    find_department(conn, id)?.ok_or_else(|| RecordsError::reference("department", id))
}

pub fn find_subject(conn: &Connection, id: &str) -> Result<Option<Subject>> {
    let subject = conn
        .query_row(
            "SELECT id, name, department_id FROM subjects WHERE id = ?",
            [id],
            |r| {
                Ok(Subject {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    department: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(subject)
}

pub fn subject(conn: &Connection, id: &str) -> Result<Subject> {
    find_subject(conn, id)?.ok_or_else(|| RecordsError::reference("subject", id))
}

fn semester_subject_ids(conn: &Connection, semester_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT subject_id FROM semester_subjects
         WHERE semester_id = ?
         ORDER BY sort_order",
    )?;
    let ids = stmt
        .query_map([semester_id], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn find_semester(conn: &Connection, id: &str) -> Result<Option<Semester>> {
    let row: Option<(String, i64)> = conn
        .query_row("SELECT id, number FROM semesters WHERE id = ?", [id], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .optional()?;
    let Some((id, number)) = row else {
        return Ok(None);
    };
    let subjects = semester_subject_ids(conn, &id)?;
    Ok(Some(Semester {
        id,
        number,
        subjects,
    }))
}

pub fn semester(conn: &Connection, id: &str) -> Result<Semester> {
    find_semester(conn, id)?.ok_or_else(|| RecordsError::reference("semester", id))
}

pub fn semester_by_number(conn: &Connection, number: i64) -> Result<Option<Semester>> {
    let id: Option<String> = conn
        .query_row("SELECT id FROM semesters WHERE number = ?", [number], |r| {
            r.get(0)
        })
        .optional()?;
    match id {
        Some(id) => find_semester(conn, &id),
        None => Ok(None),
    }
}

/// Semester id -> sequence number for every semester in the catalog.
pub fn semester_numbers(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT id, number FROM semesters")?;
    let map = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(map)
}

pub fn subject_ids(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT id FROM subjects")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(ids)
}

/// Subjects of `semester_id` that belong to `department_id`, in
/// curriculum order. This is the legal subject set for an enrollment.
pub fn department_subjects(
    conn: &Connection,
    semester_id: &str,
    department_id: &str,
) -> Result<Vec<Subject>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.department_id
         FROM semester_subjects ss
         JOIN subjects s ON s.id = ss.subject_id
         WHERE ss.semester_id = ? AND s.department_id = ?
         ORDER BY ss.sort_order",
    )?;
    let subjects = stmt
        .query_map([semester_id, department_id], |r| {
            Ok(Subject {
                id: r.get(0)?,
                name: r.get(1)?,
                department: r.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(subjects)
}

pub fn department_subject_ids(
    conn: &Connection,
    semester_id: &str,
    department_id: &str,
) -> Result<Vec<String>> {
    Ok(department_subjects(conn, semester_id, department_id)?
        .into_iter()
        .map(|s| s.id)
        .collect())
}
