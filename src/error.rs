pub use tollgate_error::AppError;

use crate::rate_limit::LimiterError;

/// Reached only for errors the gate does not absorb. Store failures are
/// handled by failing open before they get here.
impl From<LimiterError> for AppError {
    fn from(err: LimiterError) -> Self {
        AppError::internal(err.to_string())
    }
}
