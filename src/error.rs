use serde_json::json;

/// Failures surfaced by the records domain. Every validation variant is
/// raised before any write happens.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    /// Missing or malformed field, bad enum value, illegal state change.
    #[error("{0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    ReferenceNotFound { kind: &'static str, id: String },

    #[error("one or more subject ids are not valid for this semester and department")]
    InvalidSubjects(Vec<String>),

    #[error("student is already in the final semester (semester {0})")]
    TerminalSemester(i64),

    #[error("{0}")]
    NoOp(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid status {0:?}; use Pending or Cleared")]
    InvalidStatus(String),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecordsError>;

impl RecordsError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn reference(kind: &'static str, id: impl Into<String>) -> Self {
        Self::ReferenceNotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable code carried in the IPC error object.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "bad_params",
            Self::ReferenceNotFound { .. } => "reference_not_found",
            Self::InvalidSubjects(_) => "invalid_subjects",
            Self::TerminalSemester(_) => "terminal_semester",
            Self::NoOp(_) => "no_op",
            Self::NotFound(_) => "not_found",
            Self::InvalidStatus(_) => "invalid_status",
            Self::Store(_) | Self::Serialization(_) => "db_error",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::ReferenceNotFound { kind, id } => Some(json!({ "kind": kind, "id": id })),
            Self::InvalidSubjects(ids) => Some(json!({ "subjectIds": ids })),
            Self::TerminalSemester(number) => Some(json!({ "semesterNumber": number })),
            _ => None,
        }
    }
}
