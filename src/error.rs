use bincode::Error as BincodeError;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] BincodeError),

    #[error("Storage task failed: {0}")]
    Task(#[from] JoinError),

    #[error("Storage unavailable at '{path}': {reason}")]
    StorageUnavailable { path: String, reason: String },

    #[error("Stored schema version {found} is newer than supported version {supported}")]
    SchemaVersion { found: u32, supported: u32 },

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unknown index '{index}' on collection '{collection}'")]
    UnknownIndex { collection: String, index: String },

    #[error("Unique constraint violation on {collection}.{index} with value {value}")]
    ConstraintViolation {
        collection: String,
        index: String,
        value: String,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("{saga} failed at step '{step}' after completing {completed:?}: {source}")]
    StepFailed {
        saga: &'static str,
        step: String,
        completed: Vec<String>,
        source: Box<StoreError>,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// What a consumer surface shows for a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Attach the message to one form field.
    Field { field: String, message: String },
    /// The whole page cannot load its data.
    DataUnavailable,
    Generic(String),
}

impl StoreError {
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::ConstraintViolation { .. } => true,
            StoreError::StepFailed { source, .. } => source.is_constraint_violation(),
            _ => false,
        }
    }

    /// Translates the error into something fit for an end user. Engine details never
    /// leak through this path.
    pub fn notice(&self) -> Notice {
        match self {
            StoreError::ConstraintViolation {
                collection, index, ..
            } => {
                let message = match (collection.as_str(), index.as_str()) {
                    ("users", "email") => "email already registered".to_string(),
                    ("categories", "name") => "category already exists".to_string(),
                    (_, field) => format!("{} already exists", field),
                };
                Notice::Field {
                    field: index.clone(),
                    message,
                }
            }
            StoreError::StorageUnavailable { .. } | StoreError::SchemaVersion { .. } => {
                Notice::DataUnavailable
            }
            StoreError::StepFailed { source, .. } => source.notice(),
            _ => Notice::Generic("Something went wrong. Please try again.".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violation_notice() {
        let err = StoreError::ConstraintViolation {
            collection: "users".into(),
            index: "email".into(),
            value: "\"a@b.c\"".into(),
        };
        assert!(err.is_constraint_violation());
        assert_eq!(
            err.notice(),
            Notice::Field {
                field: "email".into(),
                message: "email already registered".into()
            }
        );

        let err = StoreError::ConstraintViolation {
            collection: "categories".into(),
            index: "name".into(),
            value: "\"Books\"".into(),
        };
        assert_eq!(
            err.notice(),
            Notice::Field {
                field: "name".into(),
                message: "category already exists".into()
            }
        );
    }

    #[test]
    fn test_unavailable_and_generic_notices() {
        let err = StoreError::StorageUnavailable {
            path: "x.db".into(),
            reason: "permission denied".into(),
        };
        assert_eq!(err.notice(), Notice::DataUnavailable);

        let err = StoreError::InvalidKey("bad".into());
        assert!(matches!(err.notice(), Notice::Generic(_)));
    }

    #[test]
    fn test_step_failure_surfaces_cause() {
        let err = StoreError::StepFailed {
            saga: "clear database",
            step: "orders".into(),
            completed: vec!["products".into()],
            source: Box::new(StoreError::StorageUnavailable {
                path: "x.db".into(),
                reason: "gone".into(),
            }),
        };
        assert_eq!(err.notice(), Notice::DataUnavailable);
        assert!(!err.is_constraint_violation());
    }
}
