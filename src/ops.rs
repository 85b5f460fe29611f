//! Operator implementations behind [`ObservableExt`](crate::observable::ObservableExt).

pub mod buffer_count;
pub mod combine_latest;
pub mod join;
pub mod ref_count;
pub mod retry;
pub mod window;

pub use buffer_count::BufferCountOp;
pub use combine_latest::CombineLatestOp;
pub use join::JoinOp;
pub use ref_count::RefCountOp;
pub use retry::{AlwaysRetry, FalliblePredicate, RetryConfig, RetryDecision, RetryPredicate, RetryWhenOp};
pub use window::{WindowCountOp, WindowToggleOp};
