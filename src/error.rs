use thiserror::Error;

/// A string that is not a dotted-quad IPv4 address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid IP address: {0}")]
pub struct InvalidAddress(pub String);

/// Reasons a scan request is rejected before any probing starts.
///
/// The `Display` text is what the `scanError` notification carries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("A valid start and end IP address are required")]
    MissingAddress,

    #[error("Invalid IP range: {0}")]
    InvalidAddress(#[from] InvalidAddress),

    #[error("Start IP cannot be greater than End IP")]
    InvalidRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("monitor is not initialized, cannot start monitoring")]
    NotInitialized,
}
