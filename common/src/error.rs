use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range minimum {value} is outside {low}..={high}")]
    MinOutOfBounds { value: i32, low: i32, high: i32 },
    #[error("range maximum {value} is outside {low}..={high}")]
    MaxOutOfBounds { value: i32, low: i32, high: i32 },
    #[error("range minimum {min} is not below maximum {max}")]
    Inverted { min: i32, max: i32 },
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed json payload")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a json object")]
    NotAnObject,
    #[error("payload has no `{0}` member")]
    MissingField(&'static str),
    #[error("`{0}` member is not a usable number")]
    NotNumeric(&'static str),
}
