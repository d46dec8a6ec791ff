#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        Self::spawn_with_args(&[])
    }

    pub fn spawn_with_args(args: &[&str]) -> Self {
        let exe = env!("CARGO_BIN_EXE_studentd");
        let mut child = Command::new(exe)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .env_remove("STUDENTD_WORKSPACE")
            .spawn()
            .expect("spawn studentd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    /// Spawn and select a fresh workspace.
    pub fn with_workspace(prefix: &str) -> (Self, PathBuf) {
        let workspace = temp_dir(prefix);
        let mut sidecar = Self::spawn();
        sidecar.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
        (sidecar, workspace)
    }

    pub fn send_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Expect a failure and return the whole error object.
    pub fn err(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value.get("error").cloned().expect("error object")
    }

    pub fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        self.err(method, params)
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn id_of(v: &serde_json::Value) -> String {
    v.get("id")
        .and_then(|v| v.as_str())
        .expect("entity id")
        .to_string()
}

/// Catalog built over IPC: one stream, two departments, semesters 1..=8.
/// Each semester carries two Comp Sci subjects and one Mech subject.
pub struct Catalog {
    pub stream: String,
    pub computer: String,
    pub mechanical: String,
    /// Indexed by semester number - 1.
    pub semesters: Vec<String>,
    /// Comp Sci subjects per semester, in curriculum order.
    pub cs_subjects: Vec<Vec<String>>,
    pub me_subjects: Vec<String>,
}

impl Catalog {
    pub fn semester(&self, number: usize) -> &str {
        &self.semesters[number - 1]
    }

    pub fn cs(&self, number: usize) -> &[String] {
        &self.cs_subjects[number - 1]
    }
}

pub fn seed_catalog(sidecar: &mut Sidecar) -> Catalog {
    let stream = id_of(&sidecar.ok("streams.create", json!({ "name": "B Tech" }))["stream"]);
    let computer = id_of(
        &sidecar.ok(
            "departments.create",
            json!({ "name": "Comp Sci", "streamId": stream }),
        )["department"],
    );
    let mechanical = id_of(
        &sidecar.ok(
            "departments.create",
            json!({ "name": "mech", "streamId": stream }),
        )["department"],
    );

    let mut semesters = Vec::new();
    let mut cs_subjects = Vec::new();
    let mut me_subjects = Vec::new();
    for number in 1..=8 {
        let mut subject = |name: String, dept: &str| {
            id_of(
                &sidecar.ok(
                    "subjects.create",
                    json!({ "name": name, "departmentId": dept }),
                )["subject"],
            )
        };
        let cs_a = subject(format!("Programming {number}"), &computer);
        let me_a = subject(format!("Thermodynamics {number}"), &mechanical);
        let cs_b = subject(format!("Mathematics {number}"), &computer);
        let semester = id_of(
            &sidecar.ok(
                "semesters.create",
                json!({ "number": number, "subjectIds": [cs_a, me_a, cs_b] }),
            )["semester"],
        );
        semesters.push(semester);
        cs_subjects.push(vec![cs_a, cs_b]);
        me_subjects.push(me_a);
    }

    Catalog {
        stream,
        computer,
        mechanical,
        semesters,
        cs_subjects,
        me_subjects,
    }
}

pub fn new_student(catalog: &Catalog, semester: usize, first_name: &str) -> serde_json::Value {
    json!({
        "firstName": first_name,
        "lastName": "Patil",
        "email": format!("{}@example.edu", first_name.to_lowercase()),
        "mobileNumber": "9876543210",
        "gender": "Female",
        "stream": catalog.stream,
        "department": catalog.computer,
        "semester": catalog.semester(semester),
        "subjects": catalog.cs(semester),
        "admissionType": "Regular",
    })
}
