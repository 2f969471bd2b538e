//! Core infrastructure for MIGOP.
//!
//! Configuration, the retry policy for remote calls, the cooperative
//! chunked-processing primitive and the clock abstraction.

mod chunked;
mod clock;
mod config;
mod retry;

pub use chunked::{for_each_chunked, process_chunked, ChunkProgress, ChunkedRun};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ChunkConfig, ClipboardConfig, Config, GatewayConfig, RetrySettings};
pub use retry::{retry_async, RetryConfig, RetryResult};
