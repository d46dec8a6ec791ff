use crate::error::{RecordsError, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const ROLES: [&str; 9] = [
    "Teaching",
    "HOD",
    "Student Management",
    "Account Section Management",
    "Document Section Management",
    "Notification System Management",
    "Library Management",
    "Bus Management",
    "Hostel Management",
];

/// Roles excluded by the "Non-Teaching" filter.
const TEACHING_ROLES: [&str; 2] = ["Teaching", "HOD"];

pub const EMPLOYMENT_STATUSES: [&str; 2] = ["Probation Period", "Permanent Employee"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub id: String,
    pub name: String,
    pub role: String,
    pub employment_status: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFaculty {
    pub name: Option<String>,
    pub role: Option<String>,
    pub employment_status: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub department: Option<String>,
}

fn check_role(role: &str) -> Result<()> {
    if ROLES.contains(&role) {
        Ok(())
    } else {
        Err(RecordsError::validation(format!("invalid role {role:?}")))
    }
}

fn check_status(status: &str) -> Result<()> {
    if EMPLOYMENT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(RecordsError::validation(format!(
            "invalid employmentStatus {status:?}; use Probation Period or Permanent Employee"
        )))
    }
}

fn required(v: Option<String>, field: &str) -> Result<String> {
    v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RecordsError::validation(format!("missing {field}")))
}

/// Hex SHA-256 of `salt:password`.
pub fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn row_to_faculty(r: &rusqlite::Row<'_>) -> rusqlite::Result<Faculty> {
    Ok(Faculty {
        id: r.get(0)?,
        name: r.get(1)?,
        role: r.get(2)?,
        employment_status: r.get(3)?,
        username: r.get(4)?,
        department: r.get(5)?,
    })
}

pub fn create(conn: &Connection, input: NewFaculty) -> Result<Faculty> {
    let name = required(input.name, "name")?;
    let role = required(input.role, "role")?;
    let username = required(input.username, "username")?;
    let password = input
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| RecordsError::validation("missing password"))?;
    check_role(&role)?;
    let employment_status = input
        .employment_status
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| EMPLOYMENT_STATUSES[0].to_string());
    check_status(&employment_status)?;

    let taken: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM faculties WHERE username = ?",
            [&username],
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(RecordsError::validation(format!(
            "username {username} is already taken"
        )));
    }

    let faculty = Faculty {
        id: Uuid::new_v4().to_string(),
        name,
        role,
        employment_status,
        username,
        department: input
            .department
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };
    let salt = Uuid::new_v4().simple().to_string();
    conn.execute(
        "INSERT INTO faculties(id, name, role, employment_status, username, password_salt, password_hash, department)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &faculty.id,
            &faculty.name,
            &faculty.role,
            &faculty.employment_status,
            &faculty.username,
            &salt,
            password_digest(&salt, &password),
            &faculty.department,
        ),
    )?;
    tracing::info!(username = %faculty.username, role = %faculty.role, "faculty created");
    Ok(faculty)
}

/// `None` or "All" lists everyone; "Non-Teaching" lists every role other
/// than Teaching and HOD; anything else must name a role exactly.
pub fn list(conn: &Connection, role: Option<&str>) -> Result<Vec<Faculty>> {
    let role = role.map(str::trim).filter(|r| !r.is_empty() && *r != "All");
    if let Some(r) = role {
        if r != "Non-Teaching" {
            check_role(r)?;
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, role, employment_status, username, department
         FROM faculties
         ORDER BY name, username",
    )?;
    let all = stmt
        .query_map([], row_to_faculty)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(all
        .into_iter()
        .filter(|f| match role {
            None => true,
            Some("Non-Teaching") => !TEACHING_ROLES.contains(&f.role.as_str()),
            Some(r) => f.role == r,
        })
        .collect())
}

pub fn update_status(conn: &Connection, id: &str, status: &str) -> Result<Faculty> {
    check_status(status)?;
    let n = conn.execute(
        "UPDATE faculties SET employment_status = ? WHERE id = ?",
        (status, id),
    )?;
    if n == 0 {
        return Err(RecordsError::NotFound("Faculty not found".to_string()));
    }
    let faculty = conn.query_row(
        "SELECT id, name, role, employment_status, username, department FROM faculties WHERE id = ?",
        [id],
        row_to_faculty,
    )?;
    Ok(faculty)
}

pub fn delete(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM faculties WHERE id = ?", [id])?;
    if n == 0 {
        return Err(RecordsError::NotFound("Faculty not found".to_string()));
    }
    Ok(())
}
