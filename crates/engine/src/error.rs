//! Scan-level error taxonomy
//!
//! Only precondition failures are user-visible errors of the scan-start
//! call. Everything that happens after acceptance degrades into a
//! partial-but-successful scan instead of propagating.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// The user owns no strategies and none are free. Returned
    /// synchronously; no scan is created.
    #[error("user has no eligible strategies")]
    NoEligibleStrategies,

    /// The asset universe could not be resolved for the user.
    #[error("asset universe unavailable: {0}")]
    UniverseUnavailable(String),

    /// The placeholder record could not be written. Without it, pollers on
    /// other workers would see `not_found` for an accepted scan, so scan
    /// creation fails instead.
    #[error(transparent)]
    Store(#[from] persistence::DbError),
}
