//! Byte streams read chunk by chunk from a [`ByteSource`].
//!
//! The source is opened when an observer subscribes and closed exactly once,
//! on completion, on error, or on unsubscribe, whichever comes first. Each
//! chunk is read into one reusable buffer and pushed byte by byte; the next
//! read is scheduled only after the observer consumed the whole chunk, so a
//! slow consumer slows the reads instead of growing a queue.
//!
//! ```rust,no_run
//! use rxlab::prelude::*;
//!
//! let mut size = 0usize;
//! from_file("Cargo.toml", DEFAULT_BUFFER_SIZE, TrampolineScheduler).subscribe_all(
//!   move |_byte| size += 1,
//!   |err| eprintln!("read failed: {err}"),
//!   || println!("done"),
//! );
//! ```

use std::{
  fs::File,
  io::{self, Read},
  path::PathBuf,
  sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
  },
};

use tracing::warn;

use crate::{
  error::ByteSourceError,
  observable::Observable,
  observer::Observer,
  scheduler::{Scheduler, Task, TaskHandle, TaskState},
  subscription::Subscription,
};

pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// A sequential container of bytes.
pub trait ByteSource {
  /// Read the next chunk into `buf`, returning how many bytes were written.
  /// `Ok(0)` means the source is exhausted.
  fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ByteSourceError>;

  /// Release the source. Called at most once.
  fn close(&mut self) -> Result<(), ByteSourceError> { Ok(()) }
}

/// [`ByteSource`] over any [`Read`]er. Closing drops the reader.
pub struct IoByteSource<R> {
  reader: Option<R>,
}

impl<R: Read> IoByteSource<R> {
  pub fn new(reader: R) -> Self { Self { reader: Some(reader) } }
}

impl<R: Read> ByteSource for IoByteSource<R> {
  fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ByteSourceError> {
    let Some(reader) = self.reader.as_mut() else {
      return Ok(0);
    };
    loop {
      match reader.read(buf) {
        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
        res => return res.map_err(ByteSourceError::read),
      }
    }
  }

  fn close(&mut self) -> Result<(), ByteSourceError> {
    self.reader = None;
    Ok(())
  }
}

/// Creates a byte stream over the source returned by `open`.
///
/// `open` runs at subscription time; a failure is delivered as the stream's
/// error. Reads run on `scheduler`, one chunk of up to `buffer_size` bytes per
/// step. A `buffer_size` of zero is treated as one.
pub fn from_byte_source<F, B, Sch>(open: F, buffer_size: usize, scheduler: Sch) -> FromByteSource<F, Sch>
where
  F: FnOnce() -> Result<B, ByteSourceError>,
  B: ByteSource + Send + 'static,
  Sch: Scheduler,
{
  FromByteSource { open, buffer_size: buffer_size.max(1), scheduler }
}

/// Creates a byte stream over the file at `path`. The file is opened anew for
/// every subscription.
pub fn from_file<Sch: Scheduler>(
  path: impl Into<PathBuf>, buffer_size: usize, scheduler: Sch,
) -> FromByteSource<impl FnOnce() -> Result<IoByteSource<File>, ByteSourceError> + Clone, Sch> {
  let path = path.into();
  from_byte_source(
    move || File::open(&path).map(IoByteSource::new).map_err(ByteSourceError::open),
    buffer_size,
    scheduler,
  )
}

#[derive(Clone)]
pub struct FromByteSource<F, Sch> {
  open: F,
  buffer_size: usize,
  scheduler: Sch,
}

impl<F, B, Sch> Observable for FromByteSource<F, Sch>
where
  F: FnOnce() -> Result<B, ByteSourceError>,
  B: ByteSource + Send + 'static,
  Sch: Scheduler,
{
  type Item = u8;
  type Err = ByteSourceError;
  type Unsub = ByteSourceSubscription<B>;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<u8, ByteSourceError> + Send + 'static,
  {
    let source = match (self.open)() {
      Ok(source) => source,
      Err(err) => {
        observer.error(err);
        return ByteSourceSubscription { reader: None, handle: TaskHandle::finished() };
      }
    };

    let reader = Arc::new(Reader { source: Mutex::new(Some(source)), disposed: AtomicBool::new(false) });
    let task = ReadTask { reader: reader.clone(), observer: Some(observer), buffer: vec![0; self.buffer_size] };
    let handle = self.scheduler.schedule(Task::new(task, ReadTask::step), None);
    ByteSourceSubscription { reader: Some(reader), handle }
  }
}

struct Reader<B> {
  source: Mutex<Option<B>>,
  disposed: AtomicBool,
}

impl<B: ByteSource> Reader<B> {
  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }

  /// Closes the source if nobody did yet.
  fn close(&self) -> Result<(), ByteSourceError> {
    let source = self.source.lock().unwrap_or_else(PoisonError::into_inner).take();
    match source {
      Some(mut source) => source.close(),
      None => Ok(()),
    }
  }
}

struct ReadTask<B, O> {
  reader: Arc<Reader<B>>,
  observer: Option<O>,
  buffer: Vec<u8>,
}

impl<B, O> ReadTask<B, O>
where
  B: ByteSource,
  O: Observer<u8, ByteSourceError>,
{
  fn step(&mut self) -> TaskState {
    let Self { reader, observer: slot, buffer } = self;
    let Some(observer) = slot.as_mut() else {
      return TaskState::Finished;
    };
    if reader.is_disposed() {
      *slot = None;
      return TaskState::Finished;
    }

    let read = {
      let mut source = reader.source.lock().unwrap_or_else(PoisonError::into_inner);
      match source.as_mut() {
        Some(source) => source.read_chunk(buffer),
        None => return TaskState::Finished,
      }
    };

    match read {
      Ok(0) => {
        let closed = reader.close();
        if let Some(observer) = slot.take().filter(|_| !reader.is_disposed()) {
          match closed {
            Ok(()) => observer.complete(),
            Err(err) => observer.error(err),
          }
        }
        TaskState::Finished
      }
      Ok(n) => {
        // The source lock is released while the observer runs.
        for &byte in &buffer[..n] {
          if reader.is_disposed() || observer.is_closed() {
            *slot = None;
            close_quietly(reader);
            return TaskState::Finished;
          }
          observer.next(byte);
        }
        TaskState::Yield
      }
      Err(err) => {
        close_quietly(reader);
        if let Some(observer) = slot.take().filter(|_| !reader.is_disposed()) {
          observer.error(err);
        }
        TaskState::Finished
      }
    }
  }
}

fn close_quietly<B: ByteSource>(reader: &Reader<B>) {
  if let Err(err) = reader.close() {
    warn!(error = %err, "byte source failed to close");
  }
}

/// Subscription of a byte stream: cancels the pending read and closes the
/// source.
pub struct ByteSourceSubscription<B> {
  reader: Option<Arc<Reader<B>>>,
  handle: TaskHandle,
}

impl<B: ByteSource> Subscription for ByteSourceSubscription<B> {
  fn unsubscribe(self) {
    self.handle.unsubscribe();
    if let Some(reader) = self.reader {
      if !reader.disposed.swap(true, Ordering::AcqRel) {
        close_quietly(&reader);
      }
    }
  }

  fn is_closed(&self) -> bool {
    self.handle.is_closed() || self.reader.as_ref().is_none_or(|reader| reader.is_disposed())
  }
}
