use thiserror::Error;

/// Client-facing failures of the reminder API. Storage details (KV
/// revisions in particular) never leak through here.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError,
    #[error("Invalid data provided: Error message: `{0}`")]
    BadClientData(String),
    #[error("There was a conflict with the request. Error message: `{0}`")]
    Conflict(String),
    #[error("404 Not found. Error message: `{0}`")]
    NotFound(String),
}
