use crate::model::ObjectId;
use reqwest::StatusCode;

/// Failures talking to the PRTG API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network, TLS or timeout failure reaching the service.
    ///
    /// The request URL is stripped, it carries the passhash.
    #[error("Unable to reach PRTG: {0}")]
    Connection(#[source] reqwest::Error),
    /// The HTTP client could not be set up (e.g. TLS backend).
    #[error("Unable to set up HTTP client: {0}")]
    Builder(#[source] reqwest::Error),
    #[error("Invalid API credentials")]
    Auth,
    #[error("Not found: {what}")]
    NotFound { what: String },
    #[error("PRTG request failed{}: {detail}", status_suffix(.status))]
    Service {
        status: Option<StatusCode>,
        detail: String,
    },
    #[error("Invalid PRTG URL: {0}")]
    Url(#[from] url::ParseError),
}

fn status_suffix(status: &Option<StatusCode>) -> String {
    status
        .map(|status| format!(" (HTTP {status})"))
        .unwrap_or_default()
}

impl ClientError {
    pub(crate) fn connection(err: reqwest::Error) -> Self {
        Self::Connection(err.without_url())
    }

    pub(crate) fn service<S: Into<String>>(status: Option<StatusCode>, detail: S) -> Self {
        Self::Service {
            status,
            detail: detail.into(),
        }
    }

    /// Returns `true` if re-running the reconciliation might succeed without
    /// changing any input.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(err) => err.is_timeout() || err.is_connect(),
            Self::Service {
                status: Some(status),
                ..
            } => status.is_server_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_builder() {
            Self::Builder(err)
        } else if err.is_decode() {
            Self::service(err.status(), err.to_string())
        } else {
            Self::Connection(err)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Unable to create new device because: {0} parameter not specified")]
    MissingParameter(&'static str),
    #[error("Device {0} is the clone template and must not be modified")]
    TemplateTarget(ObjectId),
}
