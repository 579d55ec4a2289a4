use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable codes for invariant violations inside the wallet controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerErrorCode {
    NetworkNotSupported,
    SelectedAccountMissing,
    AccountMissing,
    AccountAlreadyExists,
    RemoveSelectedAccount,
    KeystoreNotAvailable,
    NetworkPropertiesMissing,
    MissingCapability,
    InvalidConfiguration,
}

impl ControllerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerErrorCode::NetworkNotSupported => "WALLET_NETWORK_NOT_SUPPORTED",
            ControllerErrorCode::SelectedAccountMissing => "WALLET_SELECTED_ACCOUNT_MISSING",
            ControllerErrorCode::AccountMissing => "WALLET_ACCOUNT_MISSING",
            ControllerErrorCode::AccountAlreadyExists => "WALLET_ACCOUNT_ALREADY_EXISTS",
            ControllerErrorCode::RemoveSelectedAccount => "WALLET_REMOVE_SELECTED_ACCOUNT",
            ControllerErrorCode::KeystoreNotAvailable => "WALLET_KEYSTORE_NOT_AVAILABLE",
            ControllerErrorCode::NetworkPropertiesMissing => "WALLET_NETWORK_PROPERTIES_MISSING",
            ControllerErrorCode::MissingCapability => "WALLET_MISSING_CAPABILITY",
            ControllerErrorCode::InvalidConfiguration => "WALLET_INVALID_CONFIGURATION",
        }
    }
}

/// Stable codes for failures raised by a keystore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeystoreErrorCode {
    AccountMissing,
    MnemonicMissing,
    AccountAlreadyExists,
    OperationUnsupported,
}

impl KeystoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeystoreErrorCode::AccountMissing => "KEYSTORE_ACCOUNT_MISSING",
            KeystoreErrorCode::MnemonicMissing => "KEYSTORE_MNEMONIC_MISSING",
            KeystoreErrorCode::AccountAlreadyExists => "KEYSTORE_ACCOUNT_ALREADY_EXISTS",
            KeystoreErrorCode::OperationUnsupported => "KEYSTORE_OPERATION_UNSUPPORTED",
        }
    }
}

/// Stable codes for failures reported by protocol adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorCode {
    ListenerOpenFailed,
    AnnounceFailed,
    NetworkIdentifierMismatch,
    InvalidResponse,
}

impl ApiErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::ListenerOpenFailed => "API_LISTENER_OPEN_FAILED",
            ApiErrorCode::AnnounceFailed => "API_ANNOUNCE_FAILED",
            ApiErrorCode::NetworkIdentifierMismatch => "API_NETWORK_IDENTIFIER_MISMATCH",
            ApiErrorCode::InvalidResponse => "API_INVALID_RESPONSE",
        }
    }
}

/// HTTP-shaped network failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkErrorKind {
    InvalidRequest,
    Unauthorized,
    NotFound,
    RateLimit,
    ServerError,
    Request,
}

impl NetworkErrorKind {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => NetworkErrorKind::InvalidRequest,
            401 | 403 => NetworkErrorKind::Unauthorized,
            404 => NetworkErrorKind::NotFound,
            429 => NetworkErrorKind::RateLimit,
            500..=599 => NetworkErrorKind::ServerError,
            _ => NetworkErrorKind::Request,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkErrorKind::InvalidRequest => "NETWORK_INVALID_REQUEST",
            NetworkErrorKind::Unauthorized => "NETWORK_UNAUTHORIZED",
            NetworkErrorKind::NotFound => "NETWORK_NOT_FOUND",
            NetworkErrorKind::RateLimit => "NETWORK_RATE_LIMIT",
            NetworkErrorKind::ServerError => "NETWORK_SERVER_ERROR",
            NetworkErrorKind::Request => "NETWORK_REQUEST_ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WalletError {
    // Orchestration errors
    Controller {
        code: ControllerErrorCode,
        message: String,
    },
    Keystore {
        code: KeystoreErrorCode,
        message: String,
    },

    // Adapter errors
    Api {
        code: ApiErrorCode,
        message: String,
    },
    Network {
        kind: NetworkErrorKind,
        status_code: Option<u16>,
        message: String,
    },

    // Infrastructure errors
    StorageError(String),
    CryptoError(String),
    ValidationError(String),
    SerializationError(String),
}

impl WalletError {
    pub fn controller(code: ControllerErrorCode, message: impl Into<String>) -> Self {
        WalletError::Controller {
            code,
            message: message.into(),
        }
    }

    pub fn keystore(code: KeystoreErrorCode, message: impl Into<String>) -> Self {
        WalletError::Keystore {
            code,
            message: message.into(),
        }
    }

    pub fn api(code: ApiErrorCode, message: impl Into<String>) -> Self {
        WalletError::Api {
            code,
            message: message.into(),
        }
    }

    pub fn network(status_code: Option<u16>, message: impl Into<String>) -> Self {
        let kind = status_code
            .map(NetworkErrorKind::from_status)
            .unwrap_or(NetworkErrorKind::Request);
        WalletError::Network {
            kind,
            status_code,
            message: message.into(),
        }
    }

    /// Machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::Controller { code, .. } => code.as_str(),
            WalletError::Keystore { code, .. } => code.as_str(),
            WalletError::Api { code, .. } => code.as_str(),
            WalletError::Network { kind, .. } => kind.as_str(),
            WalletError::StorageError(_) => "STORAGE_ERROR",
            WalletError::CryptoError(_) => "CRYPTO_ERROR",
            WalletError::ValidationError(_) => "VALIDATION_ERROR",
            WalletError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            WalletError::Controller { message, .. }
            | WalletError::Keystore { message, .. }
            | WalletError::Api { message, .. }
            | WalletError::Network { message, .. } => message,
            WalletError::StorageError(message)
            | WalletError::CryptoError(message)
            | WalletError::ValidationError(message)
            | WalletError::SerializationError(message) => message,
        }
    }

    /// HTTP status for network failures, when the transport reported one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            WalletError::Network { status_code, .. } => *status_code,
            _ => None,
        }
    }

    pub fn is_controller(&self, expected: ControllerErrorCode) -> bool {
        matches!(self, WalletError::Controller { code, .. } if *code == expected)
    }

    pub fn is_keystore(&self, expected: KeystoreErrorCode) -> bool {
        matches!(self, WalletError::Keystore { code, .. } if *code == expected)
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::Controller { code, message } => {
                write!(f, "Controller error [{}]: {}", code.as_str(), message)
            }
            WalletError::Keystore { code, message } => {
                write!(f, "Keystore error [{}]: {}", code.as_str(), message)
            }
            WalletError::Api { code, message } => {
                write!(f, "API error [{}]: {}", code.as_str(), message)
            }
            WalletError::Network {
                kind,
                status_code: Some(status),
                message,
            } => write!(f, "Network error [{}] ({}): {}", kind.as_str(), status, message),
            WalletError::Network { kind, message, .. } => {
                write!(f, "Network error [{}]: {}", kind.as_str(), message)
            }

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        WalletError::StorageError(error.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::SerializationError(format!("JSON error: {}", error))
    }
}
