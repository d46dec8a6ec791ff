use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectStatus {
    Pending,
    Failed,
    Passed,
}

impl SubjectStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Pending" => Some(Self::Pending),
            "Failed" => Some(Self::Failed),
            "Passed" => Some(Self::Passed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Failed => "Failed",
            Self::Passed => "Passed",
        }
    }

    /// Marks recorded when the caller does not send any.
    pub fn default_marks(self) -> f64 {
        match self {
            Self::Passed => 50.0,
            Self::Pending | Self::Failed => 0.0,
        }
    }

    pub fn is_scored(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Pending -> Passed | Failed, Failed -> Passed on re-evaluation.
    /// A scored subject never goes back to Pending.
    pub fn can_transition_to(self, next: SubjectStatus) -> bool {
        match (self, next) {
            (a, b) if a == b => true,
            (Self::Pending, _) => true,
            (Self::Failed, Self::Passed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BacklogStatus {
    Pending,
    Cleared,
}

impl BacklogStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Pending" => Some(Self::Pending),
            "Cleared" => Some(Self::Cleared),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionType {
    Regular,
    #[serde(rename = "Direct Second Year")]
    DirectSecondYear,
    #[serde(rename = "Lateral Entry")]
    LateralEntry,
}

impl AdmissionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Regular" => Some(Self::Regular),
            "Direct Second Year" => Some(Self::DirectSecondYear),
            "Lateral Entry" => Some(Self::LateralEntry),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::DirectSecondYear => "Direct Second Year",
            Self::LateralEntry => "Lateral Entry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Transgender,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            "Transgender" => Some(Self::Transgender),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub subject: String,
    pub status: SubjectStatus,
    pub marks: f64,
}

impl SubjectRecord {
    pub fn pending(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            status: SubjectStatus::Pending,
            marks: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterRecord {
    pub semester: String,
    #[serde(default)]
    pub subjects: Vec<SubjectRecord>,
    #[serde(default)]
    pub is_backlog: bool,
}

impl SemesterRecord {
    /// Fresh enrollment: every subject Pending with zero marks.
    pub fn enrollment<I, S>(semester: impl Into<String>, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            semester: semester.into(),
            subjects: subjects.into_iter().map(SubjectRecord::pending).collect(),
            is_backlog: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogEntry {
    pub id: String,
    pub subject: String,
    pub semester: String,
    pub status: BacklogStatus,
}

/// Personal and admission details. Everything here is a plain scalar that
/// `students.update` may patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode_father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode_mother_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_number: Option<String>,
    pub gender: Gender,
    pub mobile_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caste_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_caste: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub admission_type: AdmissionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_through: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub student_id: String,
    #[serde(flatten)]
    pub profile: StudentProfile,
    pub stream: String,
    pub department: String,
    pub semester: String,
    #[serde(default)]
    pub semester_records: Vec<SemesterRecord>,
    #[serde(default)]
    pub backlogs: Vec<BacklogEntry>,
    /// Pending subjects of the latest ledger entry.
    #[serde(default)]
    pub subjects: Vec<String>,
    pub admission_date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Student {
    pub fn refresh_pending_subjects(&mut self) {
        self.subjects = self
            .semester_records
            .last()
            .map(|record| {
                record
                    .subjects
                    .iter()
                    .filter(|s| s.status == SubjectStatus::Pending)
                    .map(|s| s.subject.clone())
                    .collect()
            })
            .unwrap_or_default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    pub stream: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub id: String,
    pub number: i64,
    /// Subject ids in curriculum order.
    pub subjects: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scored_subjects_never_return_to_pending() {
        assert!(SubjectStatus::Pending.can_transition_to(SubjectStatus::Passed));
        assert!(SubjectStatus::Pending.can_transition_to(SubjectStatus::Failed));
        assert!(SubjectStatus::Failed.can_transition_to(SubjectStatus::Passed));
        assert!(SubjectStatus::Passed.can_transition_to(SubjectStatus::Passed));
        assert!(!SubjectStatus::Passed.can_transition_to(SubjectStatus::Pending));
        assert!(!SubjectStatus::Failed.can_transition_to(SubjectStatus::Pending));
        assert!(!SubjectStatus::Passed.can_transition_to(SubjectStatus::Failed));
    }

    #[test]
    fn admission_type_uses_display_names_on_the_wire() {
        let v = serde_json::to_value(AdmissionType::DirectSecondYear).expect("serialize");
        assert_eq!(v, serde_json::json!("Direct Second Year"));
        assert_eq!(
            AdmissionType::parse("Lateral Entry"),
            Some(AdmissionType::LateralEntry)
        );
        assert_eq!(AdmissionType::parse("lateral entry"), None);
    }

    #[test]
    fn pending_subjects_come_from_last_record() {
        let mut student = Student {
            id: "s".into(),
            student_id: "CSBTECH001".into(),
            profile: StudentProfile {
                first_name: "Asha".into(),
                middle_name: None,
                last_name: None,
                father_name: None,
                unicode_father_name: None,
                mother_name: None,
                unicode_mother_name: None,
                unicode_name: None,
                enrollment_number: None,
                gender: Gender::Female,
                mobile_number: "9876543210".into(),
                caste_category: None,
                sub_caste: None,
                email: "asha@example.org".into(),
                section: None,
                admission_type: AdmissionType::Regular,
                admission_through: None,
                remark: None,
            },
            stream: "st".into(),
            department: "d".into(),
            semester: "sem2".into(),
            semester_records: vec![
                SemesterRecord::enrollment("sem1", ["a", "b"]),
                SemesterRecord {
                    semester: "sem2".into(),
                    subjects: vec![
                        SubjectRecord::pending("c"),
                        SubjectRecord {
                            subject: "d".into(),
                            status: SubjectStatus::Passed,
                            marks: 70.0,
                        },
                    ],
                    is_backlog: false,
                },
            ],
            backlogs: vec![],
            subjects: vec![],
            admission_date: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        student.refresh_pending_subjects();
        assert_eq!(student.subjects, vec!["c".to_string()]);

        student.semester_records.clear();
        student.refresh_pending_subjects();
        assert!(student.subjects.is_empty());
    }
}
