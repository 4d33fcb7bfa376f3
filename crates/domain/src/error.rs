/// Shared error type used across all Flash crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("control plane returned {status}: {body}")]
    ControlPlane { status: u16, body: String },

    #[error("serialization: {0}")]
    Serialization(String),

    #[error("remote execution failed: {0}")]
    RemoteExecution(String),

    #[error("registry lock: {0}")]
    Lock(String),

    #[error("timed out acquiring registry lock after {0:?}")]
    LockTimeout(std::time::Duration),

    #[error("{0} is not supported for this resource type")]
    NotSupported(&'static str),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a control-plane error, truncating the response body so log
    /// lines and error chains stay bounded.
    pub fn control_plane(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > 500 {
            let mut cut = 500;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("…");
        }
        Error::ControlPlane { status, body }
    }

    /// Hint shown to users when no API key can be resolved.
    pub fn missing_api_key() -> Self {
        Error::Auth(
            "no API key found. Run 'flash login', set RUNPOD_API_KEY, or write \
             api_key to the credentials file"
                .into(),
        )
    }
}
