//! Convenience methods to turn any error (from any library), or a missing value, into twoface
//! errors.
use crate::twoface::{ExternalError, TfError};
use anyhow::anyhow;

pub trait Describe {
    /// Convert an error into a TfError by describing it to your users.
    fn describe(self, external: ExternalError) -> TfError;
}

impl<Internal: Into<anyhow::Error>> Describe for Internal {
    fn describe(self, external: ExternalError) -> TfError {
        TfError {
            internal: self.into(),
            external,
        }
    }
}

/// Any regular internal error can be turned into a TfError, using the default external error.
/// If you want to give an internal error a custom external error, use `internal.describe(ExternalError)`
impl<Internal: Into<anyhow::Error>> From<Internal> for TfError {
    fn from(internal: Internal) -> TfError {
        internal.describe(Default::default())
    }
}

pub trait DescribeErr<T> {
    /// Convert a result's error into a TfError by describing it to your users.
    /// `result.describe_err(external)` is shorthand for `result.map_err(|e| e.describe(external))`.
    fn describe_err(self, external: ExternalError) -> Result<T, TfError>;
}

impl<T, E> DescribeErr<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn describe_err(self, external: ExternalError) -> Result<T, TfError> {
        self.map_err(|e| e.describe(external))
    }
}

pub trait OrNotFound<T> {
    /// Turn a missing value (e.g. a lookup by id that found no row) into a TfError.
    fn or_not_found(self, external: ExternalError) -> Result<T, TfError>;
}

impl<T> OrNotFound<T> for Option<T> {
    fn or_not_found(self, external: ExternalError) -> Result<T, TfError> {
        self.ok_or_else(|| TfError {
            internal: anyhow!("{}", external.text),
            external,
        })
    }
}
