//! Student documents: creation, lookup, listing, partial update, deletion.
//! Lifecycle operations go through [`with_student`], which loads a document,
//! hands it to a ledger function and writes it back in one transaction.

use crate::error::{RecordsError, Result};
use crate::identity;
use crate::ledger::{self, SemesterRecordInput};
use crate::model::{AdmissionType, Gender, SemesterRecord, Student, StudentProfile};
use crate::registry;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use uuid::Uuid;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"))
}

fn mobile_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{10}$").expect("mobile pattern"))
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Trimmed, with empty strings treated as absent.
fn clean(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_email(raw: &str) -> Result<String> {
    let email = raw.trim();
    if !email_re().is_match(email) {
        return Err(RecordsError::validation(format!(
            "{email} is not a valid email!"
        )));
    }
    Ok(email.to_string())
}

fn parse_mobile(raw: &str) -> Result<String> {
    let mobile = raw.trim();
    if !mobile_re().is_match(mobile) {
        return Err(RecordsError::validation(format!(
            "{mobile} is not a valid 10-digit mobile number!"
        )));
    }
    Ok(mobile.to_string())
}

fn parse_gender(raw: &str) -> Result<Gender> {
    Gender::parse(raw.trim()).ok_or_else(|| {
        RecordsError::validation("Invalid gender. Must be Male, Female, or Transgender")
    })
}

pub fn parse_admission_type(raw: &str) -> Result<AdmissionType> {
    AdmissionType::parse(raw.trim()).ok_or_else(|| {
        RecordsError::validation(
            "Invalid admissionType. Must be Regular, Direct Second Year, or Lateral Entry",
        )
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub father_name: Option<String>,
    pub unicode_father_name: Option<String>,
    pub mother_name: Option<String>,
    pub unicode_mother_name: Option<String>,
    pub unicode_name: Option<String>,
    pub enrollment_number: Option<String>,
    pub gender: Option<String>,
    pub mobile_number: Option<String>,
    pub caste_category: Option<String>,
    pub sub_caste: Option<String>,
    pub email: Option<String>,
    pub section: Option<String>,
    pub admission_type: Option<String>,
    pub admission_through: Option<String>,
    pub remark: Option<String>,
    pub stream: Option<String>,
    pub department: Option<String>,
    pub semester: Option<String>,
    pub subjects: Option<Vec<String>>,
}

/// Scalar profile fields plus the optional full-ledger replacement.
/// Reference fields are accepted only so that attempts to change them can
/// be rejected explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub father_name: Option<String>,
    pub unicode_father_name: Option<String>,
    pub mother_name: Option<String>,
    pub unicode_mother_name: Option<String>,
    pub unicode_name: Option<String>,
    pub enrollment_number: Option<String>,
    pub gender: Option<String>,
    pub mobile_number: Option<String>,
    pub caste_category: Option<String>,
    pub sub_caste: Option<String>,
    pub email: Option<String>,
    pub section: Option<String>,
    pub admission_type: Option<String>,
    pub admission_through: Option<String>,
    pub remark: Option<String>,
    pub stream: Option<String>,
    pub department: Option<String>,
    pub student_id: Option<String>,
    pub semester: Option<String>,
    pub semester_records: Option<Vec<SemesterRecordInput>>,
}

struct Required {
    first_name: String,
    email: String,
    mobile_number: String,
    gender: String,
    stream: String,
    department: String,
    semester: String,
    admission_type: String,
    subjects: Vec<String>,
}

fn required_fields(input: &NewStudent) -> Result<Required> {
    let fields = (
        clean(input.first_name.clone()),
        clean(input.email.clone()),
        clean(input.mobile_number.clone()),
        clean(input.gender.clone()),
        clean(input.stream.clone()),
        clean(input.department.clone()),
        clean(input.semester.clone()),
        clean(input.admission_type.clone()),
        input.subjects.clone(),
    );
    let (
        Some(first_name),
        Some(email),
        Some(mobile_number),
        Some(gender),
        Some(stream),
        Some(department),
        Some(semester),
        Some(admission_type),
        Some(subjects),
    ) = fields
    else {
        return Err(RecordsError::validation("Missing required fields"));
    };
    if subjects.is_empty() {
        return Err(RecordsError::validation(
            "Subjects must be a non-empty array",
        ));
    }
    Ok(Required {
        first_name,
        email,
        mobile_number,
        gender,
        stream,
        department,
        semester,
        admission_type,
        subjects,
    })
}

/// Validate, assign the identifier and insert. The counter increment and
/// the insert share a transaction.
pub fn create(conn: &Connection, input: NewStudent) -> Result<Student> {
    let req = required_fields(&input)?;
    let admission_type = parse_admission_type(&req.admission_type)?;
    let gender = parse_gender(&req.gender)?;
    let email = parse_email(&req.email)?;
    let mobile_number = parse_mobile(&req.mobile_number)?;

    let semester = registry::semester(conn, &req.semester)?;
    registry::stream(conn, &req.stream)?;
    let department = registry::department(conn, &req.department)?;
    if department.stream != req.stream {
        return Err(RecordsError::validation(format!(
            "department {} does not belong to stream {}",
            req.department, req.stream
        )));
    }

    let legal: HashSet<String> =
        registry::department_subject_ids(conn, &semester.id, &req.department)?
            .into_iter()
            .collect();
    let invalid: Vec<String> = req
        .subjects
        .iter()
        .filter(|id| !legal.contains(id.as_str()))
        .cloned()
        .collect();
    if !invalid.is_empty() {
        return Err(RecordsError::InvalidSubjects(invalid));
    }

    let now = now_rfc3339();
    let profile = StudentProfile {
        first_name: req.first_name,
        middle_name: clean(input.middle_name),
        last_name: clean(input.last_name),
        father_name: clean(input.father_name),
        unicode_father_name: clean(input.unicode_father_name),
        mother_name: clean(input.mother_name),
        unicode_mother_name: clean(input.unicode_mother_name),
        unicode_name: clean(input.unicode_name),
        enrollment_number: clean(input.enrollment_number),
        gender,
        mobile_number,
        caste_category: clean(input.caste_category),
        sub_caste: clean(input.sub_caste),
        email,
        section: clean(input.section),
        admission_type,
        admission_through: clean(input.admission_through),
        remark: clean(input.remark),
    };

    let tx = conn.unchecked_transaction()?;
    let student_id = identity::assign_student_id(&tx, &req.department, &req.stream)?;
    let student = Student {
        id: Uuid::new_v4().to_string(),
        student_id,
        profile,
        stream: req.stream,
        department: req.department,
        semester: semester.id.clone(),
        semester_records: vec![SemesterRecord::enrollment(
            semester.id,
            req.subjects.iter().cloned(),
        )],
        backlogs: vec![],
        subjects: req.subjects,
        admission_date: now.clone(),
        created_at: now.clone(),
        updated_at: now,
    };
    let document = serde_json::to_string(&student)?;
    tx.execute(
        "INSERT INTO students(id, student_id, admission_type, document, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &student.id,
            &student.student_id,
            student.profile.admission_type.as_str(),
            &document,
            &student.created_at,
            &student.updated_at,
        ),
    )?;
    tx.commit()?;

    tracing::info!(
        id = %student.id,
        student_id = %student.student_id,
        "student created"
    );
    Ok(student)
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<Student>> {
    let document: Option<String> = conn
        .query_row("SELECT document FROM students WHERE id = ?", [id], |r| {
            r.get(0)
        })
        .optional()?;
    document
        .map(|d| serde_json::from_str(&d).map_err(RecordsError::from))
        .transpose()
}

pub fn load(conn: &Connection, id: &str) -> Result<Student> {
    find(conn, id)?.ok_or_else(|| RecordsError::NotFound("Student not found".to_string()))
}

fn save(conn: &Connection, student: &mut Student) -> Result<()> {
    student.updated_at = now_rfc3339();
    let document = serde_json::to_string(student)?;
    conn.execute(
        "UPDATE students SET admission_type = ?, document = ?, updated_at = ? WHERE id = ?",
        (
            student.profile.admission_type.as_str(),
            &document,
            &student.updated_at,
            &student.id,
        ),
    )?;
    Ok(())
}

/// Load student `id`, run `op` on it and persist the result. Nothing is
/// written when `op` fails.
pub fn with_student<T>(
    conn: &Connection,
    id: &str,
    op: impl FnOnce(&Connection, &mut Student) -> Result<T>,
) -> Result<(Student, T)> {
    let tx = conn.unchecked_transaction()?;
    let tx_conn: &Connection = &tx;
    let mut student = load(tx_conn, id)?;
    let out = op(tx_conn, &mut student)?;
    save(tx_conn, &mut student)?;
    tx.commit()?;
    Ok((student, out))
}

/// Read view: drops ledger records and backlogs that point at semesters or
/// subjects no longer in the catalog.
fn without_dangling(
    mut student: Student,
    semesters: &HashSet<String>,
    subjects: &HashSet<String>,
) -> Student {
    student.semester_records.retain(|r| {
        semesters.contains(&r.semester) && r.subjects.iter().all(|s| subjects.contains(&s.subject))
    });
    student
        .backlogs
        .retain(|b| semesters.contains(&b.semester) && subjects.contains(&b.subject));
    student
}

fn catalog_ids(conn: &Connection) -> Result<(HashSet<String>, HashSet<String>)> {
    let semesters = registry::semester_numbers(conn)?.into_keys().collect();
    let subjects = registry::subject_ids(conn)?;
    Ok((semesters, subjects))
}

/// Lookup by the human-readable identifier.
pub fn get_by_student_id(conn: &Connection, student_id: &str) -> Result<Student> {
    let document: Option<String> = conn
        .query_row(
            "SELECT document FROM students WHERE student_id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(document) = document else {
        return Err(RecordsError::NotFound("Student not found".to_string()));
    };
    let student: Student = serde_json::from_str(&document)?;
    let (semesters, subjects) = catalog_ids(conn)?;
    Ok(without_dangling(student, &semesters, &subjects))
}

pub fn list(conn: &Connection, admission_type: Option<&str>) -> Result<Vec<Student>> {
    let filter = admission_type
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_admission_type)
        .transpose()?;

    let mut stmt = conn.prepare(
        "SELECT document FROM students
         WHERE (?1 IS NULL OR admission_type = ?1)
         ORDER BY student_id",
    )?;
    let documents = stmt
        .query_map([filter.map(AdmissionType::as_str)], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let (semesters, subjects) = catalog_ids(conn)?;
    documents
        .iter()
        .map(|d| -> Result<Student> {
            let student: Student = serde_json::from_str(d)?;
            Ok(without_dangling(student, &semesters, &subjects))
        })
        .collect()
}

fn reject_change(field: &str, supplied: Option<&String>, current: &str) -> Result<()> {
    match supplied {
        Some(v) if v.trim() != current => Err(RecordsError::validation(format!(
            "{field} cannot be changed after admission"
        ))),
        _ => Ok(()),
    }
}

fn apply_optional(slot: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *slot = clean(Some(v));
    }
}

/// Patch scalar fields; `semesterRecords`, when present, replaces the
/// whole ledger.
pub fn update(conn: &Connection, id: &str, patch: StudentPatch) -> Result<Student> {
    let (student, ()) = with_student(conn, id, |conn, student| {
        reject_change("stream", patch.stream.as_ref(), &student.stream)?;
        reject_change("department", patch.department.as_ref(), &student.department)?;
        reject_change("studentId", patch.student_id.as_ref(), &student.student_id)?;
        if patch
            .semester
            .as_ref()
            .is_some_and(|s| s.trim() != student.semester)
        {
            return Err(RecordsError::validation(
                "use students.editSemester or students.promote to change the current semester",
            ));
        }

        let admission_type = patch
            .admission_type
            .as_deref()
            .map(parse_admission_type)
            .transpose()?;
        let gender = patch.gender.as_deref().map(parse_gender).transpose()?;
        let email = patch.email.as_deref().map(parse_email).transpose()?;
        let mobile_number = patch.mobile_number.as_deref().map(parse_mobile).transpose()?;
        let first_name = match patch.first_name {
            Some(v) => Some(
                clean(Some(v)).ok_or_else(|| RecordsError::validation("firstName must not be empty"))?,
            ),
            None => None,
        };

        // Ledger replacement validates against the catalog, so run it before
        // any profile field changes.
        if let Some(records) = patch.semester_records {
            ledger::replace_records(conn, student, records)?;
        }

        let profile = &mut student.profile;
        if let Some(v) = first_name {
            profile.first_name = v;
        }
        if let Some(v) = admission_type {
            profile.admission_type = v;
        }
        if let Some(v) = gender {
            profile.gender = v;
        }
        if let Some(v) = email {
            profile.email = v;
        }
        if let Some(v) = mobile_number {
            profile.mobile_number = v;
        }
        apply_optional(&mut profile.middle_name, patch.middle_name);
        apply_optional(&mut profile.last_name, patch.last_name);
        apply_optional(&mut profile.father_name, patch.father_name);
        apply_optional(&mut profile.unicode_father_name, patch.unicode_father_name);
        apply_optional(&mut profile.mother_name, patch.mother_name);
        apply_optional(&mut profile.unicode_mother_name, patch.unicode_mother_name);
        apply_optional(&mut profile.unicode_name, patch.unicode_name);
        apply_optional(&mut profile.enrollment_number, patch.enrollment_number);
        apply_optional(&mut profile.caste_category, patch.caste_category);
        apply_optional(&mut profile.sub_caste, patch.sub_caste);
        apply_optional(&mut profile.section, patch.section);
        apply_optional(&mut profile.admission_through, patch.admission_through);
        apply_optional(&mut profile.remark, patch.remark);
        Ok(())
    })?;
    tracing::info!(student_id = %student.student_id, "student updated");
    Ok(student)
}

pub fn delete(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM students WHERE id = ?", [id])?;
    if n == 0 {
        return Err(RecordsError::NotFound("Student not found".to_string()));
    }
    tracing::info!(%id, "student deleted");
    Ok(())
}
