//! Console driver errors
//!
//! Only setup can fail. Once a console is running, writes absorb
//! backpressure and empty reads return 0, so the data path has no errors.

use pvcons_hypervisor::BindError;
use pvcons_ring::RingError;
use thiserror::Error;

/// Error types for console setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("invalid console page: {0}")]
    InvalidPage(#[from] RingError),

    #[error("console already installed")]
    AlreadyInstalled,

    #[error("failed to bind console input handler: {0}")]
    Bind(#[from] BindError),
}

pub type Result<T> = core::result::Result<T, ConsoleError>;
