use std::fmt;

use backtrace::Backtrace;

/// Unrecoverable failures of the journal buffer assembly path.
///
/// Nothing here is retryable. The durability subsystem assumes
/// the journal is never incomplete or wrong, so the driver that
/// receives one of these is expected to flush diagnostics and
/// terminate rather than continue with a journal it can no
/// longer trust. Surfacing these as a `Result` instead of
/// aborting inline lets a test harness intercept them.
#[derive(Debug)]
pub enum FatalError {
    /// A recorded write intent's start address did not resolve
    /// to any mapped region. This means an untracked write was
    /// recorded somewhere upstream; journaling it would risk
    /// writing against the wrong file and offset.
    UnresolvedAddress {
        address: u64,
        /// Number of mapped views at the time of failure, for
        /// postmortem diagnosis.
        views: usize,
        backtrace: Backtrace,
    },
    /// A caller contract was violated: building with an empty
    /// write-intent set, with no log file open, or resolving to
    /// an offset past the mapped-file size ceiling.
    Precondition(&'static str),
}

pub type Result<T> = std::result::Result<T, FatalError>;

impl FatalError {
    pub(crate) fn unresolved(address: u64, views: usize) -> FatalError {
        // capture the trace eagerly; by the time the driver sees
        // this error the interesting frames are gone
        let backtrace = Backtrace::new();
        log::error!(
            "write intent address {:#x} cannot be resolved against {} mapped views\n{:?}",
            address,
            views,
            backtrace,
        );
        FatalError::UnresolvedAddress {
            address,
            views,
            backtrace,
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::UnresolvedAddress { address, views, .. } => write!(
                f,
                "view pointer cannot be resolved: address {:#x} not present in any of {} mapped views",
                address, views,
            ),
            FatalError::Precondition(msg) => {
                write!(f, "durability precondition violated: {}", msg)
            }
        }
    }
}

impl std::error::Error for FatalError {}
