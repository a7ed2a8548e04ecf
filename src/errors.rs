#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("UI event loop has been shut down")]
    LoopClosed,

    #[error("Waiting on the UI thread for work queued on the UI thread would deadlock")]
    WouldDeadlock,

    #[error("Worker pool could not be created: {0}")]
    Pool(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] AppError),

    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum WebviewError {
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] AppError),

    #[error("Window operation failed: {0}")]
    Window(#[from] WindowError),

    #[error("Window already hosts a webview")]
    SurfaceExists,

    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Script rejected the evaluation: {0}")]
    Rejected(serde_json::Value),

    #[error("Result could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Arguments could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Bad format string: {0}")]
    Format(String),

    #[error("Evaluation was abandoned before it settled")]
    Abandoned,

    #[error(transparent)]
    Dispatch(#[from] AppError),
}

/// Typed failure a scheme resolver answers a request with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SchemeError {
    #[error("Resource not found")]
    NotFound,

    #[error("Invalid request")]
    Invalid,

    #[error("Access denied")]
    Denied,

    #[error("Resolver failed")]
    Failed,
}

impl SchemeError {
    /// HTTP status the backend answers the request with.
    pub fn status(&self) -> http::StatusCode {
        match self {
            SchemeError::NotFound => http::StatusCode::NOT_FOUND,
            SchemeError::Invalid => http::StatusCode::BAD_REQUEST,
            SchemeError::Denied => http::StatusCode::FORBIDDEN,
            SchemeError::Failed => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
