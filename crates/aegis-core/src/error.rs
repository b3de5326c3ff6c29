use std::fmt;

/// The OAuth2/OIDC `error` codes a client-facing failure is reported under.
///
/// These map directly onto RFC 6749 §4.1.2.1 / §5.2 error codes plus the
/// OIDC-specific `user_not_found` extension used by the assertion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    InvalidRequest,
    InvalidClient,
    InvalidScope,
    InvalidToken,
    AccessDenied,
    UserNotFound,
    AuthenticationFailed,
    UnsupportedResponseType,
}

impl ClientErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidScope => "invalid_scope",
            Self::InvalidToken => "invalid_token",
            Self::AccessDenied => "access_denied",
            Self::UserNotFound => "user_not_found",
            Self::AuthenticationFailed => "authentication_failed",
            Self::UnsupportedResponseType => "unsupported_response_type",
        }
    }
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures that are this service's fault, never the caller's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorKind {
    SystemError,
    NotImplemented,
    StoreFailure,
    JwtVerifyFailure,
}

impl ServerErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemError => "system_error",
            Self::NotImplemented => "not_implemented",
            Self::StoreFailure => "store_failure",
            Self::JwtVerifyFailure => "jwt_verify_failure",
        }
    }
}

impl fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy shared by both cores.
///
/// A `Client` error means the request itself cannot succeed as submitted and
/// is safe to report back (error code + description). A `Server` error means
/// something internal to this service broke; callers get a generic message
/// and the detail goes to the trace log only.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{kind}: {message}")]
    Client {
        kind: ClientErrorKind,
        message: String,
    },
    #[error("{kind}: {message}")]
    Server {
        kind: ServerErrorKind,
        message: String,
    },
}

impl CoreError {
    pub fn client(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self::Client {
            kind,
            message: message.into(),
        }
    }

    pub fn server(kind: ServerErrorKind, message: impl Into<String>) -> Self {
        Self::Server {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::client(ClientErrorKind::InvalidRequest, message)
    }

    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::client(ClientErrorKind::InvalidClient, message)
    }

    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::client(ClientErrorKind::InvalidScope, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::client(ClientErrorKind::InvalidToken, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::client(ClientErrorKind::AccessDenied, message)
    }

    pub fn user_not_found(message: impl Into<String>) -> Self {
        Self::client(ClientErrorKind::UserNotFound, message)
    }

    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::client(ClientErrorKind::AuthenticationFailed, message)
    }

    pub fn unsupported_response_type(message: impl Into<String>) -> Self {
        Self::client(ClientErrorKind::UnsupportedResponseType, message)
    }

    pub fn system_error(message: impl Into<String>) -> Self {
        Self::server(ServerErrorKind::SystemError, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::server(ServerErrorKind::NotImplemented, message)
    }

    pub fn store_failure(message: impl Into<String>) -> Self {
        Self::server(ServerErrorKind::StoreFailure, message)
    }

    pub fn jwt_verify_failure(message: impl Into<String>) -> Self {
        Self::server(ServerErrorKind::JwtVerifyFailure, message)
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client { .. })
    }

    /// The OAuth2 `error` code this failure should be reported under. Server
    /// errors are never named to the caller beyond `server_error`.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Client { kind, .. } => kind.as_str(),
            Self::Server { .. } => "server_error",
        }
    }

    /// The `error_description` a client may see. Server-side detail stays in
    /// the trace log; clients get a fixed phrase instead.
    pub fn client_description(&self) -> &str {
        match self {
            Self::Client { message, .. } => message,
            Self::Server { .. } => "internal error",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
