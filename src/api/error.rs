use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures surfaced by the API client.
///
/// Cloneable because a single fetch result is shared by every observer that
/// attached to the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// No response was received (connect failure, timeout, reset)
  #[error("network error: {0}")]
  Network(String),
  /// The server answered 401; the session is over
  #[error("session expired, please sign in again")]
  Unauthorized,
  /// The server rejected the payload (400/422)
  #[error("{}", .message.as_deref().unwrap_or("request rejected by server"))]
  ValidationRejected { message: Option<String> },
  /// Any other failing status
  #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("request failed"))]
  Http { status: u16, message: Option<String> },
  /// A 2xx body that did not match the expected shape
  #[error("unexpected response: {0}")]
  Decode(String),
  #[error("invalid URL: {0}")]
  InvalidUrl(String),
}

impl ApiError {
  /// Map a failing status and its body message to the taxonomy.
  pub fn from_status(status: u16, message: Option<String>) -> Self {
    match status {
      401 => ApiError::Unauthorized,
      400 | 422 => ApiError::ValidationRejected { message },
      _ => ApiError::Http { status, message },
    }
  }

  /// Whether a read may be retried after this error.
  pub fn is_retryable(&self) -> bool {
    match self {
      ApiError::Network(_) => true,
      ApiError::Http { status, .. } => *status >= 500 || *status == 429,
      _ => false,
    }
  }

  /// Whether this error ends the current session.
  pub fn is_session_terminal(&self) -> bool {
    matches!(self, ApiError::Unauthorized)
  }

  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Unauthorized => Some(401),
      ApiError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      ApiError::Decode(err.to_string())
    } else if let Some(status) = err.status() {
      ApiError::from_status(status.as_u16(), None)
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    ApiError::Decode(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_status_classification() {
    assert_eq!(ApiError::from_status(401, None), ApiError::Unauthorized);
    assert!(matches!(
      ApiError::from_status(422, Some("bad".into())),
      ApiError::ValidationRejected { .. }
    ));
    assert_eq!(
      ApiError::from_status(404, None),
      ApiError::Http {
        status: 404,
        message: None
      }
    );
  }

  #[test]
  fn test_retryable() {
    assert!(ApiError::Network("reset".into()).is_retryable());
    assert!(ApiError::from_status(503, None).is_retryable());
    assert!(ApiError::from_status(429, None).is_retryable());
    assert!(!ApiError::from_status(404, None).is_retryable());
    assert!(!ApiError::Unauthorized.is_retryable());
    assert!(!ApiError::from_status(400, None).is_retryable());
  }

  #[test]
  fn test_display_uses_server_message() {
    let err = ApiError::from_status(500, Some("database down".into()));
    assert_eq!(err.to_string(), "HTTP 500: database down");
    let err = ApiError::from_status(400, Some("Title is required".into()));
    assert_eq!(err.to_string(), "Title is required");
    assert_eq!(
      ApiError::from_status(400, None).to_string(),
      "request rejected by server"
    );
  }

  #[test]
  fn test_unauthorized_is_terminal() {
    assert!(ApiError::Unauthorized.is_session_terminal());
    assert!(!ApiError::Network("x".into()).is_session_terminal());
  }
}
