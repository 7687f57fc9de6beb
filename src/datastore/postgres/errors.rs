use crate::twoface::{Cause, ExternalError, Fallible, TfError};
use actix_web::error::BlockingError;
use anyhow::anyhow;
use diesel::result::Error as DieselError;

pub type DbPoolResult<T> = Result<T, BlockingError<DieselError>>;

/// The blocking thread pool dropped a query before it finished, e.g. during shutdown.
const QUERY_CANCELLED: ExternalError = ExternalError {
    cause: Cause::ServerError,
    text: "database query was cancelled",
};

/// Convenience extension used to extract errors from `web::block`.
pub trait BlockingResp<T> {
    /// Convert the return from a web::block into a normal `Fallible<T>`.
    fn to_resp(self) -> Fallible<T>;
}

impl<T, I: std::fmt::Debug + Into<TfError>> BlockingResp<T> for Result<T, BlockingError<I>> {
    fn to_resp(self) -> Fallible<T> {
        match self {
            Ok(t) => Ok(t),
            Err(BlockingError::Error(err)) => Err(err.into()),
            Err(BlockingError::Canceled) => Err(TfError {
                internal: anyhow!("blocking DB operation cancelled"),
                external: QUERY_CANCELLED,
            }),
        }
    }
}
