//! Catalog fixtures shared by unit tests.

use rusqlite::Connection;

pub struct Catalog {
    pub stream: String,
    pub computer: String,
    pub mechanical: String,
    /// Semester ids indexed by `number - 1`.
    pub semesters: Vec<String>,
}

/// Semester ids sort in the reverse of their numbers ("sem-h" is 1,
/// "sem-a" is 8) so tests catch any ordering done on ids.
pub fn semester_id(number: i64) -> String {
    let letter = (b'i' - number as u8) as char;
    format!("sem-{letter}")
}

pub fn subject_id(number: i64, dept: &str, slot: &str) -> String {
    format!("sub-{number}-{dept}-{slot}")
}

pub fn seed_catalog(conn: &Connection) -> Catalog {
    conn.execute(
        "INSERT INTO streams(id, name) VALUES('stream-btech', 'B Tech')",
        [],
    )
    .expect("insert stream");
    conn.execute(
        "INSERT INTO departments(id, name, stream_id) VALUES('dept-cs', 'Comp Sci', 'stream-btech')",
        [],
    )
    .expect("insert department");
    conn.execute(
        "INSERT INTO departments(id, name, stream_id) VALUES('dept-me', 'mech', 'stream-btech')",
        [],
    )
    .expect("insert department");

    let mut semesters = Vec::new();
    for number in 1..=8i64 {
        let sem = semester_id(number);
        conn.execute(
            "INSERT INTO semesters(id, number) VALUES(?, ?)",
            (&sem, number),
        )
        .expect("insert semester");
        let subjects = [
            (subject_id(number, "ce", "a"), "dept-cs"),
            (subject_id(number, "me", "a"), "dept-me"),
            (subject_id(number, "ce", "b"), "dept-cs"),
        ];
        for (i, (sid, dept)) in subjects.iter().enumerate() {
            conn.execute(
                "INSERT INTO subjects(id, name, department_id) VALUES(?, ?, ?)",
                (sid, format!("Subject {sid}"), dept),
            )
            .expect("insert subject");
            conn.execute(
                "INSERT INTO semester_subjects(semester_id, subject_id, sort_order) VALUES(?, ?, ?)",
                (&sem, sid, i as i64),
            )
            .expect("link subject");
        }
        semesters.push(sem);
    }

    Catalog {
        stream: "stream-btech".to_string(),
        computer: "dept-cs".to_string(),
        mechanical: "dept-me".to_string(),
        semesters,
    }
}
