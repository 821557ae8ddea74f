use thiserror::Error;

/// Rejected subject or applicant data.
///
/// Raised before any key generation or network traffic happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("common name {0:?} contains an unresolved placeholder")]
    UnresolvedPlaceholder(String),

    #[error("pin must consist of decimal digits only")]
    InvalidPin,

    #[error("{0:?} is not a valid email address")]
    InvalidEmail(String),
}

/// Checks that `value` is not empty or whitespace only.
pub(crate) fn require(
    field: &'static str,
    value: &str,
) -> Result<(), InputError> {
    if value.trim().is_empty() {
        Err(InputError::Empty(field))
    } else {
        Ok(())
    }
}
