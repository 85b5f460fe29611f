//! # rxlab: push-based streams for Rust
//!
//! A small reactive core built around three traits: [`Observable`] produces
//! values, [`Observer`] consumes `next`, `error` and `complete` signals, and
//! [`Subscription`] cancels the link between them. Time and concurrency go
//! through a [`Scheduler`].
//!
//! ## Quick Start
//!
//! ```rust
//! use rxlab::prelude::*;
//!
//! from_iter(0..10)
//!   .buffer_count(4)
//!   .subscribe(|chunk| println!("chunk: {chunk:?}"));
//! ```
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): [`ThreadPoolScheduler`] backed by a `futures` thread pool
//! - **`timer`** (default): [`TimerScheduler`] with a dedicated timer thread
//! - **`tokio-scheduler`**: [`TokioScheduler`] running tasks on a tokio runtime
//!
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`Subscription`]: subscription::Subscription
//! [`Scheduler`]: scheduler::Scheduler
//! [`ThreadPoolScheduler`]: scheduler::ThreadPoolScheduler
//! [`TimerScheduler`]: scheduler::TimerScheduler
//! [`TokioScheduler`]: scheduler::TokioScheduler

pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod rc;
pub mod scheduler;
pub mod subject;
pub mod subscription;
