//! Error types produced by this crate.
//!
//! Stream errors are generic: every operator forwards the upstream `Err`
//! unchanged. The types here cover the failures the crate raises itself.
//! Unsubscribing is never an error: releasing a subscription that already
//! terminated or was already released does nothing.

use std::{io, sync::Arc};

/// Failures of a [`ByteSource`](crate::observable::ByteSource).
///
/// The I/O error is shared behind an `Arc` so the error stays `Clone` and can
/// be multicast to several observers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ByteSourceError {
  /// The source could not be opened at subscription time.
  #[error("failed to open byte source: {0}")]
  Open(#[source] Arc<io::Error>),

  /// A chunk read failed.
  #[error("failed to read from byte source: {0}")]
  Read(#[source] Arc<io::Error>),

  /// Releasing the source after the last chunk failed.
  #[error("failed to close byte source: {0}")]
  Close(#[source] Arc<io::Error>),
}

impl ByteSourceError {
  pub fn open(err: io::Error) -> Self { Self::Open(Arc::new(err)) }

  pub fn read(err: io::Error) -> Self { Self::Read(Arc::new(err)) }

  pub fn close(err: io::Error) -> Self { Self::Close(Arc::new(err)) }

  /// Kind of the underlying I/O error.
  pub fn kind(&self) -> io::ErrorKind {
    match self {
      Self::Open(err) | Self::Read(err) | Self::Close(err) => err.kind(),
    }
  }
}

/// Terminal error of a retry whose predicate can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E, P> {
  /// The retry count was used up; carries the last source error.
  #[error("retries exhausted: {0}")]
  Exhausted(E),

  /// The predicate declined to retry this error.
  #[error("retry declined: {0}")]
  Rejected(E),

  /// The predicate itself failed. The source error that was being judged is
  /// kept as `original`.
  #[error("retry predicate failed: {failure} (while handling: {original})")]
  Predicate { original: E, failure: P },
}

impl<E, P> RetryError<E, P> {
  /// The source error that ended the stream, whichever way it ended.
  pub fn original(&self) -> &E {
    match self {
      Self::Exhausted(err) | Self::Rejected(err) | Self::Predicate { original: err, .. } => err,
    }
  }
}
