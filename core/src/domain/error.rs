//! Domain-level error values.
//!
//! These errors are presentation agnostic. The core never formats user-facing
//! text; consumers translate [`ErrorCode`] values into whatever message their
//! surface needs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No identity source is reachable; the caller must prompt for login.
    CredentialUnavailable,
    /// The identity authenticated but holds no membership in any unit.
    NoMembership,
    /// A membership already exists for the `(user, unit)` pair.
    DuplicateMembership,
    /// No membership exists for the `(user, unit)` pair.
    MembershipNotFound,
    /// The remote directory is unreachable and the write could not be
    /// mirrored; changes were not saved remotely.
    DirectoryUnavailable,
    /// A cascade step failed after earlier steps succeeded; the operation
    /// must be retried with the same identifier.
    CascadePartialFailure,
    /// Authentication failed or is missing.
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    Forbidden,
    /// The requested record does not exist.
    NotFound,
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
#[serde(try_from = "DomainErrorDto", into = "DomainErrorDto")]
pub struct DomainError {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Validation errors emitted by the constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainErrorValidationError {
    /// The message was empty once trimmed.
    EmptyMessage,
}

impl std::fmt::Display for DomainErrorValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "error message must not be empty"),
        }
    }
}

impl std::error::Error for DomainErrorValidationError {}

impl DomainError {
    /// Create a new error, panicking if validation fails.
    ///
    /// # Panics
    ///
    /// Panics when `message` is empty once trimmed. Use [`Self::try_new`]
    /// for caller-supplied text.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        match Self::try_new(code, message) {
            Ok(value) => value,
            Err(err) => panic!("error messages must satisfy validation: {err}"),
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<Self, DomainErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(DomainErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
        })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Diagnostic message intended for logs, not end users.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary structured details, when present.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::CredentialUnavailable`].
    pub fn credential_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CredentialUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::NoMembership`].
    pub fn no_membership(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NoMembership, message)
    }

    /// Convenience constructor for [`ErrorCode::DuplicateMembership`].
    pub fn duplicate_membership(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DuplicateMembership, message)
    }

    /// Convenience constructor for [`ErrorCode::MembershipNotFound`].
    pub fn membership_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MembershipNotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::DirectoryUnavailable`].
    pub fn directory_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DirectoryUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::CascadePartialFailure`].
    pub fn cascade_partial_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CascadePartialFailure, message)
    }

    /// Convenience constructor for [`ErrorCode::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Convenience constructor for [`ErrorCode::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DomainError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainErrorDto {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<DomainError> for DomainErrorDto {
    fn from(value: DomainError) -> Self {
        Self {
            code: value.code,
            message: value.message,
            details: value.details,
        }
    }
}

impl TryFrom<DomainErrorDto> for DomainError {
    type Error = DomainErrorValidationError;

    fn try_from(value: DomainErrorDto) -> Result<Self, Self::Error> {
        let DomainErrorDto {
            code,
            message,
            details,
        } = value;

        let mut error = DomainError::try_new(code, message)?;
        error.details = details;
        Ok(error)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(ErrorCode::DuplicateMembership, "membership already exists")]
    #[case(ErrorCode::CascadePartialFailure, "minutes step failed")]
    fn construction_preserves_code_and_message(#[case] code: ErrorCode, #[case] message: &str) {
        let err = DomainError::new(code, message);
        assert_eq!(err.code(), code);
        assert_eq!(err.message(), message);
        assert!(err.details().is_none());
    }

    #[rstest]
    fn blank_messages_are_rejected() {
        let err = DomainError::try_new(ErrorCode::NotFound, "   ")
            .expect_err("blank messages must fail validation");
        assert_eq!(err, DomainErrorValidationError::EmptyMessage);
    }

    #[rstest]
    fn details_survive_serde_round_trip() {
        let err = DomainError::no_membership("user has no unit")
            .with_details(json!({ "userId": "abc" }));
        let encoded = serde_json::to_string(&err).expect("error serializes");
        let decoded: DomainError = serde_json::from_str(&encoded).expect("error deserializes");
        assert_eq!(decoded, err);
    }

    #[rstest]
    fn codes_use_snake_case_on_the_wire() {
        let encoded = serde_json::to_string(&ErrorCode::CredentialUnavailable)
            .expect("code serializes");
        assert_eq!(encoded, "\"credential_unavailable\"");
    }
}
