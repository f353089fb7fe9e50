use std::fmt;

/// Supplementary error code reported alongside a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Hydration failed; the caller may retry later.
    TryAgain,
    /// The service is shutting down.
    Unavailable,
    /// The provider could not be reached.
    ProviderUnreachable,
}

#[cfg(unix)]
impl ErrorCode {
    /// Convert to a libc errno.
    pub fn to_errno(self) -> i32 {
        match self {
            ErrorCode::TryAgain => libc::EAGAIN,
            ErrorCode::Unavailable => libc::ESHUTDOWN,
            ErrorCode::ProviderUnreachable => libc::ENOTCONN,
        }
    }
}

/// Why an access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// A crawler touched a placeholder.
    Crawler,
    /// Write-type action on an offline root.
    OfflineWrite,
    /// Content-requiring action on a placeholder in an offline root.
    OfflinePlaceholder,
    /// The provider answered the hydration request with a failure.
    HydrationFailed,
    /// The request was raised or pending while the service shut down.
    ShuttingDown,
    /// The object could not be mapped to a path under its root.
    PathUnresolved,
    /// The provider channel refused the request.
    ProviderUnreachable,
}

impl DenyReason {
    /// Specific error code for the host to report. `None` means the host's
    /// default access-denied code (`EACCES`).
    pub fn error_code(self) -> Option<ErrorCode> {
        match self {
            DenyReason::HydrationFailed => Some(ErrorCode::TryAgain),
            DenyReason::ShuttingDown => Some(ErrorCode::Unavailable),
            DenyReason::ProviderUnreachable => Some(ErrorCode::ProviderUnreachable),
            DenyReason::Crawler
            | DenyReason::OfflineWrite
            | DenyReason::OfflinePlaceholder
            | DenyReason::PathUnresolved => None,
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DenyReason::Crawler => "crawler access to placeholder",
            DenyReason::OfflineWrite => "write on offline root",
            DenyReason::OfflinePlaceholder => "placeholder access on offline root",
            DenyReason::HydrationFailed => "hydration failed",
            DenyReason::ShuttingDown => "service shutting down",
            DenyReason::PathUnresolved => "path unresolved",
            DenyReason::ProviderUnreachable => "provider unreachable",
        };
        f.write_str(text)
    }
}

/// Outcome of one interception call.
///
/// `Allow` defers to the host's remaining access checks; it never grants
/// more than the host would on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Allow,
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_allow(self) -> bool {
        self == Verdict::Allow
    }

    pub fn is_deny(self) -> bool {
        !self.is_allow()
    }

    /// Error code for the hook's output slot; only meaningful on denial.
    pub fn error_code(self) -> Option<ErrorCode> {
        match self {
            Verdict::Allow => None,
            Verdict::Deny(reason) => reason.error_code(),
        }
    }
}
