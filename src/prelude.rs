//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

pub use crate::{
  error::{ByteSourceError, RetryError},
  observable::*,
  observer::*,
  ops::retry::{AlwaysRetry, FalliblePredicate, RetryConfig, RetryDecision, RetryPredicate},
  rc::MutArc,
  scheduler::*,
  subject::*,
  subscription::*,
};
