//! Grobline Core - Common infrastructure for the paper harvesting pipeline
//!
//! Blocking HTTP over a shared async client, retry with backoff,
//! atomic file sinks, logging and progress reporting.

pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod sink;
pub mod stream;

// Re-exports for convenience
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{RetryPolicy, Retryable, retry_with_backoff};
pub use shutdown::{
    INTERRUPTED_EXIT_CODE, install_signal_handlers, is_shutdown_requested, shutdown_flag,
};
pub use sink::{FileSink, cleanup_tmp_files, write_atomic};
pub use stream::{StreamError, TimeoutReader, open_reader, post_multipart, probe};
