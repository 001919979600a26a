use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgondaError {
    #[error("{entity} not found: {id}{}", .hint.as_deref().map(|h| format!(" ({h})")).unwrap_or_default())]
    NotFound {
        entity: &'static str,
        id: String,
        hint: Option<String>,
    },

    #[error("registry unreachable: {0}")]
    Network(String),

    #[error("validation failed with {errors} error(s)")]
    ValidationFailed { errors: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Broad failure class, used by callers to choose a remediation and an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    General,
    Validation,
    Network,
    NotFound,
}

impl AgondaError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AgondaError::NotFound {
            entity,
            id: id.into(),
            hint: None,
        }
    }

    pub fn not_found_with_hint(
        entity: &'static str,
        id: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        AgondaError::NotFound {
            entity,
            id: id.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AgondaError::NotFound { .. } => ErrorKind::NotFound,
            AgondaError::Network(_) => ErrorKind::Network,
            AgondaError::ValidationFailed { .. } => ErrorKind::Validation,
            AgondaError::Io(_) | AgondaError::Yaml(_) | AgondaError::Json(_) => ErrorKind::General,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::General => 1,
            ErrorKind::Validation => 2,
            ErrorKind::Network => 3,
            ErrorKind::NotFound => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgondaError>;
