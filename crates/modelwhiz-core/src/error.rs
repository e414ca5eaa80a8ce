use thiserror::Error;

use crate::TaskType;

#[derive(Error, Debug)]
pub enum ModelWhizError {
    #[error("Cannot compare a {0} model against a {1} model")]
    TaskTypeMismatch(TaskType, TaskType),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelWhizError>;
