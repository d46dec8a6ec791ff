//! Per-student semester history: promotion, semester edits, backlogs and
//! subject results. Every function validates fully before it touches the
//! student, so a returned error means the document is unchanged.

use crate::error::{RecordsError, Result};
use crate::model::{
    BacklogEntry, BacklogStatus, Semester, SemesterRecord, Student, SubjectRecord, SubjectStatus,
};
use crate::registry;
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

pub const FINAL_SEMESTER: i64 = 8;

/// A reference as clients send it back: either the bare id or the
/// populated entity object they received earlier.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RefInput {
    Id(String),
    Populated {
        #[serde(rename = "_id", alias = "id")]
        id: String,
    },
}

impl RefInput {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Populated { id } => id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecordInput {
    pub subject: RefInput,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub marks: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterRecordInput {
    pub semester: Option<RefInput>,
    #[serde(default)]
    pub subjects: Option<Vec<SubjectRecordInput>>,
    #[serde(default)]
    pub is_backlog: Option<bool>,
}

/// Zero marks count as unset, so a Passed subject resent with its enrollment
/// marks still gets the pass default.
fn resolve_marks(status: SubjectStatus, marks: Option<f64>) -> Result<f64> {
    match marks {
        None => Ok(status.default_marks()),
        Some(m) if m == 0.0 => Ok(status.default_marks()),
        Some(m) if m.is_finite() && m >= 0.0 => Ok(m),
        Some(m) => Err(RecordsError::validation(format!(
            "marks must be a non-negative number, got {m}"
        ))),
    }
}

/// Move the student to the semester numbered one past the current one and
/// open a fresh record holding that semester's department subjects.
pub fn promote(conn: &Connection, student: &mut Student) -> Result<Semester> {
    let current = registry::semester(conn, &student.semester)?;
    if current.number >= FINAL_SEMESTER {
        return Err(RecordsError::TerminalSemester(current.number));
    }

    let next_number = current.number + 1;
    let next = registry::semester_by_number(conn, next_number)?.ok_or_else(|| {
        RecordsError::NotFound(format!("semester {next_number} not found"))
    })?;
    let subjects = registry::department_subject_ids(conn, &next.id, &student.department)?;

    student
        .semester_records
        .push(SemesterRecord::enrollment(next.id.clone(), subjects));
    student.semester = next.id.clone();
    student.refresh_pending_subjects();

    tracing::info!(
        student_id = %student.student_id,
        from = current.number,
        to = next.number,
        "student promoted"
    );
    Ok(next)
}

/// Point the student at `target_id`, opening a record for it if needed,
/// then drop every record of a later semester. Works for both forward
/// jumps and demotions. Records are ordered by semester number.
pub fn edit_semester(conn: &Connection, student: &mut Student, target_id: &str) -> Result<Semester> {
    let target = registry::semester(conn, target_id)?;
    if student.semester == target.id {
        return Err(RecordsError::NoOp(
            "student is already in the selected semester".to_string(),
        ));
    }

    let numbers = registry::semester_numbers(conn)?;
    let has_record = student
        .semester_records
        .iter()
        .any(|r| r.semester == target.id);
    if !has_record {
        let subjects = registry::department_subject_ids(conn, &target.id, &student.department)?;
        student
            .semester_records
            .push(SemesterRecord::enrollment(target.id.clone(), subjects));
    }
    student.semester = target.id.clone();

    // Records whose semester has left the catalog cannot be ordered; they go too.
    student
        .semester_records
        .retain(|r| numbers.get(&r.semester).is_some_and(|n| *n <= target.number));
    student.refresh_pending_subjects();

    tracing::info!(
        student_id = %student.student_id,
        semester = target.number,
        records = student.semester_records.len(),
        "student semester edited"
    );
    Ok(target)
}

/// Record backlogs for `subject_ids` in `semester_id`. Pairs already on the
/// student are skipped. Returns how many entries were added.
pub fn add_backlog(
    conn: &Connection,
    student: &mut Student,
    semester_id: &str,
    subject_ids: &[String],
) -> Result<usize> {
    let semester = registry::semester(conn, semester_id)?;
    if subject_ids.is_empty() {
        return Err(RecordsError::validation(
            "subjectIds must be a non-empty array",
        ));
    }

    let legal: HashSet<&str> = semester.subjects.iter().map(String::as_str).collect();
    let invalid: Vec<String> = subject_ids
        .iter()
        .filter(|id| !legal.contains(id.as_str()))
        .cloned()
        .collect();
    if !invalid.is_empty() {
        return Err(RecordsError::InvalidSubjects(invalid));
    }

    let mut added = 0;
    for subject_id in subject_ids {
        let exists = student
            .backlogs
            .iter()
            .any(|b| &b.subject == subject_id && b.semester == semester.id);
        if exists {
            continue;
        }
        student.backlogs.push(BacklogEntry {
            id: Uuid::new_v4().to_string(),
            subject: subject_id.clone(),
            semester: semester.id.clone(),
            status: BacklogStatus::Pending,
        });
        added += 1;
    }

    tracing::info!(
        student_id = %student.student_id,
        semester = semester.number,
        added,
        "backlogs recorded"
    );
    Ok(added)
}

pub fn update_backlog_status(student: &mut Student, backlog_id: &str, status: &str) -> Result<()> {
    let status =
        BacklogStatus::parse(status).ok_or_else(|| RecordsError::InvalidStatus(status.to_string()))?;
    let entry = student
        .backlogs
        .iter_mut()
        .find(|b| b.id == backlog_id)
        .ok_or_else(|| RecordsError::NotFound("backlog not found".to_string()))?;
    entry.status = status;
    Ok(())
}

/// Grade one subject of one semester record in place.
pub fn record_result(
    student: &mut Student,
    semester_id: &str,
    subject_id: &str,
    status: &str,
    marks: Option<f64>,
) -> Result<()> {
    let status = SubjectStatus::parse(status).ok_or_else(|| {
        RecordsError::validation(format!(
            "invalid subject status {status:?}; use Pending, Failed or Passed"
        ))
    })?;
    let marks = resolve_marks(status, marks)?;

    let record = student
        .semester_records
        .iter_mut()
        .rev()
        .find(|r| r.semester == semester_id)
        .ok_or_else(|| RecordsError::NotFound("semester record not found".to_string()))?;
    let entry = record
        .subjects
        .iter_mut()
        .find(|s| s.subject == subject_id)
        .ok_or_else(|| RecordsError::NotFound("subject not in semester record".to_string()))?;

    if !entry.status.can_transition_to(status) {
        return Err(RecordsError::validation(format!(
            "cannot change subject status from {} to {}",
            entry.status.as_str(),
            status.as_str()
        )));
    }
    entry.status = status;
    entry.marks = marks;
    student.refresh_pending_subjects();
    Ok(())
}

/// Replace the whole ledger. Each record is checked against its semester's
/// department subjects and normalized (status defaults to Pending, marks to
/// the status default). Scored subjects already on the ledger may not be
/// reset to Pending.
pub fn replace_records(
    conn: &Connection,
    student: &mut Student,
    records: Vec<SemesterRecordInput>,
) -> Result<()> {
    if records.is_empty() {
        return Err(RecordsError::validation("semesterRecords must not be empty"));
    }

    let mut replaced = Vec::with_capacity(records.len());
    for record in records {
        let semester_id = record
            .semester
            .as_ref()
            .map(|r| r.id().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                RecordsError::validation("semester id is required in semesterRecords")
            })?;
        let semester = registry::semester(conn, &semester_id)?;
        let legal: HashSet<String> =
            registry::department_subject_ids(conn, &semester.id, &student.department)?
                .into_iter()
                .collect();

        let inputs = record.subjects.unwrap_or_default();
        let invalid: Vec<String> = inputs
            .iter()
            .map(|s| s.subject.id())
            .filter(|id| !legal.contains(*id))
            .map(str::to_string)
            .collect();
        if !invalid.is_empty() {
            return Err(RecordsError::InvalidSubjects(invalid));
        }

        let mut subjects = Vec::with_capacity(inputs.len());
        for input in inputs {
            let status = match input.status.as_deref() {
                None | Some("") => SubjectStatus::Pending,
                Some(raw) => SubjectStatus::parse(raw).ok_or_else(|| {
                    RecordsError::validation(format!(
                        "invalid subject status {raw:?}; use Pending, Failed or Passed"
                    ))
                })?,
            };
            let subject_id = input.subject.id().to_string();
            if let Some(previous) = scored_status(student, &semester.id, &subject_id) {
                if !previous.can_transition_to(status) {
                    return Err(RecordsError::validation(format!(
                        "cannot change subject {subject_id} from {} to {}",
                        previous.as_str(),
                        status.as_str()
                    )));
                }
            }
            subjects.push(SubjectRecord {
                subject: subject_id,
                status,
                marks: resolve_marks(status, input.marks)?,
            });
        }

        replaced.push(SemesterRecord {
            semester: semester.id,
            subjects,
            is_backlog: record.is_backlog.unwrap_or(false),
        });
    }

    student.semester_records = replaced;
    student.refresh_pending_subjects();
    Ok(())
}

fn scored_status(student: &Student, semester_id: &str, subject_id: &str) -> Option<SubjectStatus> {
    student
        .semester_records
        .iter()
        .filter(|r| r.semester == semester_id)
        .flat_map(|r| r.subjects.iter())
        .filter(|s| s.subject == subject_id && s.status.is_scored())
        .map(|s| s.status)
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdmissionType, Gender, StudentProfile};
    use crate::testutil::{seed_catalog, subject_id, Catalog};

    fn student_at(catalog: &Catalog, number: usize) -> Student {
        let records = (1..=number)
            .map(|n| {
                SemesterRecord::enrollment(
                    catalog.semesters[n - 1].clone(),
                    [
                        subject_id(n as i64, "ce", "a"),
                        subject_id(n as i64, "ce", "b"),
                    ],
                )
            })
            .collect();
        let mut student = Student {
            id: "student-1".into(),
            student_id: "COMPSCIBTECH001".into(),
            profile: StudentProfile {
                first_name: "Ravi".into(),
                middle_name: None,
                last_name: Some("Kumar".into()),
                father_name: None,
                unicode_father_name: None,
                mother_name: None,
                unicode_mother_name: None,
                unicode_name: None,
                enrollment_number: None,
                gender: Gender::Male,
                mobile_number: "9123456780".into(),
                caste_category: None,
                sub_caste: None,
                email: "ravi@example.org".into(),
                section: None,
                admission_type: AdmissionType::Regular,
                admission_through: None,
                remark: None,
            },
            stream: catalog.stream.clone(),
            department: catalog.computer.clone(),
            semester: catalog.semesters[number - 1].clone(),
            semester_records: records,
            backlogs: vec![],
            subjects: vec![],
            admission_date: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        student.refresh_pending_subjects();
        student
    }

    fn setup(number: usize) -> (Connection, Catalog, Student) {
        let conn = crate::db::open_in_memory().expect("db");
        let catalog = seed_catalog(&conn);
        let student = student_at(&catalog, number);
        (conn, catalog, student)
    }

    #[test]
    fn promote_from_seven_appends_semester_eight() {
        let (conn, catalog, mut student) = setup(7);
        let before = student.semester_records.clone();

        let next = promote(&conn, &mut student).expect("promote");

        assert_eq!(next.number, 8);
        assert_eq!(student.semester, catalog.semesters[7]);
        assert_eq!(student.semester_records.len(), before.len() + 1);
        assert_eq!(&student.semester_records[..7], &before[..]);
        let added = student.semester_records.last().expect("record");
        assert_eq!(added.semester, catalog.semesters[7]);
        assert!(!added.is_backlog);
        assert_eq!(
            added
                .subjects
                .iter()
                .map(|s| s.subject.as_str())
                .collect::<Vec<_>>(),
            vec!["sub-8-ce-a", "sub-8-ce-b"]
        );
        assert!(added
            .subjects
            .iter()
            .all(|s| s.status == SubjectStatus::Pending && s.marks == 0.0));
        assert_eq!(student.subjects, vec!["sub-8-ce-a", "sub-8-ce-b"]);
    }

    #[test]
    fn promote_at_final_semester_is_terminal() {
        let (conn, _catalog, mut student) = setup(8);
        let before = student.clone();
        let e = promote(&conn, &mut student).expect_err("terminal");
        assert!(matches!(e, RecordsError::TerminalSemester(8)));
        assert_eq!(student, before);
    }

    #[test]
    fn promote_without_next_semester_is_not_found() {
        let (conn, _catalog, mut student) = setup(3);
        conn.execute("DELETE FROM semester_subjects WHERE semester_id = 'sem-e'", [])
            .expect("unlink");
        conn.execute("DELETE FROM semesters WHERE number = 4", [])
            .expect("delete semester 4");
        let before = student.clone();
        let e = promote(&conn, &mut student).expect_err("missing");
        assert!(matches!(e, RecordsError::NotFound(_)));
        assert_eq!(student, before);
    }

    #[test]
    fn edit_to_current_semester_is_noop() {
        let (conn, catalog, mut student) = setup(3);
        let before = student.clone();
        let e = edit_semester(&conn, &mut student, &catalog.semesters[2]).expect_err("noop");
        assert!(matches!(e, RecordsError::NoOp(_)));
        assert_eq!(student, before);
    }

    #[test]
    fn demotion_prunes_by_semester_number() {
        // Semester ids sort opposite to numbers; pruning must follow numbers.
        let (conn, catalog, mut student) = setup(5);
        let target = edit_semester(&conn, &mut student, &catalog.semesters[1]).expect("demote");

        assert_eq!(target.number, 2);
        assert_eq!(student.semester, catalog.semesters[1]);
        let kept: Vec<&str> = student
            .semester_records
            .iter()
            .map(|r| r.semester.as_str())
            .collect();
        assert_eq!(kept, vec![catalog.semesters[0].as_str(), catalog.semesters[1].as_str()]);
        assert_eq!(student.subjects, vec!["sub-2-ce-a", "sub-2-ce-b"]);
    }

    #[test]
    fn forward_jump_opens_record_for_target() {
        let (conn, catalog, mut student) = setup(2);
        edit_semester(&conn, &mut student, &catalog.semesters[5]).expect("jump");
        assert_eq!(student.semester_records.len(), 3);
        let last = student.semester_records.last().expect("record");
        assert_eq!(last.semester, catalog.semesters[5]);
        assert_eq!(last.subjects.len(), 2);
    }

    #[test]
    fn edit_to_unknown_semester_is_reference_error() {
        let (conn, _catalog, mut student) = setup(2);
        let e = edit_semester(&conn, &mut student, "sem-zz").expect_err("unknown");
        assert_eq!(e.code(), "reference_not_found");
    }

    #[test]
    fn add_backlog_twice_yields_one_entry() {
        let (conn, catalog, mut student) = setup(3);
        let subjects = vec![subject_id(2, "ce", "a")];
        assert_eq!(
            add_backlog(&conn, &mut student, &catalog.semesters[1], &subjects).expect("add"),
            1
        );
        assert_eq!(
            add_backlog(&conn, &mut student, &catalog.semesters[1], &subjects).expect("add"),
            0
        );
        assert_eq!(student.backlogs.len(), 1);
        assert_eq!(student.backlogs[0].status, BacklogStatus::Pending);

        // Same subject in a different semester is a different pair.
        let dup_in_input = vec![subject_id(3, "ce", "b"), subject_id(3, "ce", "b")];
        add_backlog(&conn, &mut student, &catalog.semesters[2], &dup_in_input).expect("add");
        assert_eq!(student.backlogs.len(), 2);
    }

    #[test]
    fn add_backlog_rejects_foreign_subject_without_mutation() {
        let (conn, catalog, mut student) = setup(3);
        let subjects = vec![subject_id(2, "ce", "a"), subject_id(5, "ce", "a")];
        let e = add_backlog(&conn, &mut student, &catalog.semesters[1], &subjects)
            .expect_err("invalid");
        match e {
            RecordsError::InvalidSubjects(ids) => assert_eq!(ids, vec!["sub-5-ce-a".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(student.backlogs.is_empty());

        let e = add_backlog(&conn, &mut student, &catalog.semesters[1], &[]).expect_err("empty");
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn backlog_status_updates_in_place() {
        let (conn, catalog, mut student) = setup(3);
        add_backlog(
            &conn,
            &mut student,
            &catalog.semesters[0],
            &[subject_id(1, "ce", "b")],
        )
        .expect("add");
        let id = student.backlogs[0].id.clone();

        let e = update_backlog_status(&mut student, &id, "Done").expect_err("bad status");
        assert!(matches!(e, RecordsError::InvalidStatus(_)));
        let e = update_backlog_status(&mut student, "nope", "Cleared").expect_err("missing");
        assert!(matches!(e, RecordsError::NotFound(_)));

        update_backlog_status(&mut student, &id, "Cleared").expect("update");
        assert_eq!(student.backlogs[0].status, BacklogStatus::Cleared);
    }

    #[test]
    fn record_result_applies_defaults_and_guards_transitions() {
        let (_conn, catalog, mut student) = setup(2);
        let sem = catalog.semesters[1].clone();
        let subject = subject_id(2, "ce", "a");

        record_result(&mut student, &sem, &subject, "Passed", None).expect("pass");
        let entry = &student.semester_records[1].subjects[0];
        assert_eq!(entry.status, SubjectStatus::Passed);
        assert_eq!(entry.marks, 50.0);
        assert_eq!(student.subjects, vec!["sub-2-ce-b"]);

        let e = record_result(&mut student, &sem, &subject, "Pending", None).expect_err("regress");
        assert_eq!(e.code(), "bad_params");
        let e = record_result(&mut student, &sem, &subject, "Passed", Some(-1.0)).expect_err("neg");
        assert_eq!(e.code(), "bad_params");

        let other = subject_id(2, "ce", "b");
        record_result(&mut student, &sem, &other, "Failed", Some(12.0)).expect("fail");
        record_result(&mut student, &sem, &other, "Passed", Some(61.0)).expect("re-evaluate");
        assert!(student.subjects.is_empty());
    }

    fn subject_input(id: &str, status: Option<&str>, marks: Option<f64>) -> SubjectRecordInput {
        SubjectRecordInput {
            subject: RefInput::Id(id.to_string()),
            status: status.map(str::to_string),
            marks,
        }
    }

    #[test]
    fn replace_records_recomputes_pending_from_last_record() {
        let (conn, catalog, mut student) = setup(1);
        let records = vec![
            SemesterRecordInput {
                semester: Some(RefInput::Id(catalog.semesters[0].clone())),
                subjects: Some(vec![
                    subject_input(&subject_id(1, "ce", "a"), Some("Passed"), None),
                    subject_input(&subject_id(1, "ce", "b"), None, None),
                ]),
                is_backlog: None,
            },
            SemesterRecordInput {
                semester: Some(RefInput::Populated {
                    id: catalog.semesters[1].clone(),
                }),
                subjects: Some(vec![
                    subject_input(&subject_id(2, "ce", "a"), Some("Failed"), Some(20.0)),
                    subject_input(&subject_id(2, "ce", "b"), Some("Pending"), None),
                ]),
                is_backlog: Some(true),
            },
        ];

        replace_records(&conn, &mut student, records).expect("replace");

        assert_eq!(student.semester_records.len(), 2);
        let first = &student.semester_records[0];
        assert_eq!(first.subjects[0].marks, 50.0);
        assert_eq!(first.subjects[1].status, SubjectStatus::Pending);
        assert_eq!(first.subjects[1].marks, 0.0);
        assert!(student.semester_records[1].is_backlog);
        assert_eq!(student.subjects, vec!["sub-2-ce-b"]);
    }

    #[test]
    fn replace_records_passes_zero_mark_subject_with_default_marks() {
        let (conn, catalog, mut student) = setup(1);
        let sem = catalog.semesters[0].clone();
        let subject = subject_id(1, "ce", "a");
        assert_eq!(student.semester_records[0].subjects[0].marks, 0.0);

        let records = vec![SemesterRecordInput {
            semester: Some(RefInput::Id(sem)),
            subjects: Some(vec![
                subject_input(&subject, Some("Passed"), Some(0.0)),
                subject_input(&subject_id(1, "ce", "b"), Some("Failed"), Some(0.0)),
            ]),
            is_backlog: None,
        }];
        replace_records(&conn, &mut student, records).expect("replace");

        let subjects = &student.semester_records[0].subjects;
        assert_eq!(subjects[0].status, SubjectStatus::Passed);
        assert_eq!(subjects[0].marks, 50.0);
        assert_eq!(subjects[1].marks, 0.0);
    }

    #[test]
    fn replace_records_validates_before_writing() {
        let (conn, catalog, mut student) = setup(2);
        let before = student.clone();

        let foreign = vec![SemesterRecordInput {
            semester: Some(RefInput::Id(catalog.semesters[0].clone())),
            subjects: Some(vec![subject_input(&subject_id(1, "me", "a"), None, None)]),
            is_backlog: None,
        }];
        let e = replace_records(&conn, &mut student, foreign).expect_err("other department");
        assert!(matches!(e, RecordsError::InvalidSubjects(_)));

        let missing = vec![SemesterRecordInput {
            semester: None,
            subjects: None,
            is_backlog: None,
        }];
        let e = replace_records(&conn, &mut student, missing).expect_err("no semester");
        assert_eq!(e.code(), "bad_params");

        let e = replace_records(&conn, &mut student, vec![]).expect_err("empty");
        assert_eq!(e.code(), "bad_params");

        assert_eq!(student, before);
    }

    #[test]
    fn replace_records_rejects_scored_to_pending() {
        let (conn, catalog, mut student) = setup(1);
        let sem = catalog.semesters[0].clone();
        let subject = subject_id(1, "ce", "a");
        record_result(&mut student, &sem, &subject, "Passed", Some(77.0)).expect("grade");

        let records = vec![SemesterRecordInput {
            semester: Some(RefInput::Id(sem.clone())),
            subjects: Some(vec![subject_input(&subject, None, None)]),
            is_backlog: None,
        }];
        let e = replace_records(&conn, &mut student, records).expect_err("regress");
        assert_eq!(e.code(), "bad_params");
        assert_eq!(student.semester_records[0].subjects[0].marks, 77.0);
    }

    #[test]
    fn ref_input_accepts_bare_and_populated_ids() {
        let bare: RefInput = serde_json::from_value(serde_json::json!("abc")).expect("bare");
        let populated: RefInput =
            serde_json::from_value(serde_json::json!({ "_id": "def", "number": 3 }))
                .expect("populated");
        let plain: RefInput =
            serde_json::from_value(serde_json::json!({ "id": "ghi" })).expect("id field");
        assert_eq!(bare.id(), "abc");
        assert_eq!(populated.id(), "def");
        assert_eq!(plain.id(), "ghi");
    }
}
