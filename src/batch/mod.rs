pub mod control;
pub mod dispatcher;
pub mod observer;
pub mod partition;
pub mod retry;
pub mod types;

pub use control::RunControl;
pub use dispatcher::BatchDispatcher;
pub use observer::{BatchObserver, FanoutObserver, TracingObserver};
pub use partition::{batch_count, partition};
pub use retry::{with_retry, BackoffStrategy, RetryPolicy};
pub use types::*;
