//! Integration tests for rxlab
//!
//! End-to-end checks of the public API: retry bounds, file reading, count
//! windows, latest-value combination, shared connections and disposal.

use std::{
  convert::Infallible,
  io::Write,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
    mpsc,
  },
  thread,
};

use rxlab::prelude::*;

/// A source that fails on its first `failures` subscriptions and then emits
/// `1, 2, 3` and completes.
fn flaky(
  failures: usize, attempts: Arc<AtomicUsize>,
) -> impl Observable<Item = i32, Err = &'static str> + Clone + Send + 'static {
  create(move |emitter: Emitter<i32, &'static str>| {
    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
    if attempt < failures {
      emitter.error("boom");
    } else {
      for v in 1..=3 {
        emitter.next(v);
      }
      emitter.complete();
    }
  })
}

type Log = Arc<Mutex<Vec<String>>>;

fn record<S>(source: S) -> Log
where
  S: Observable,
  S::Item: std::fmt::Debug,
  S::Err: std::fmt::Display,
{
  let log = Log::default();
  let (n, e, c) = (log.clone(), log.clone(), log.clone());
  source.subscribe_all(
    move |v| n.lock().unwrap().push(format!("{v:?}")),
    move |err| e.lock().unwrap().push(format!("error: {err}")),
    move || c.lock().unwrap().push("complete".to_owned()),
  );
  log
}

#[rxlab_macro::test]
fn retry_recovers_within_the_bound() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let log = record(flaky(3, attempts.clone()).retry(3));

  assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3", "complete"]);
  assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[rxlab_macro::test]
fn retry_gives_up_with_the_original_error() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let log = record(flaky(3, attempts.clone()).retry(2));

  assert_eq!(*log.lock().unwrap(), vec!["error: boom"]);
  // The first subscription plus two retries.
  assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[rxlab_macro::test]
fn declined_retry_fails_without_scheduling() {
  TestScheduler::init();
  let attempts = Arc::new(AtomicUsize::new(0));
  let config = RetryConfig::new().count(5).delay(Duration::from_secs(1));
  let log = record(flaky(1, attempts.clone()).retry_when(config, |_| false, TestScheduler));

  assert_eq!(*log.lock().unwrap(), vec!["error: boom"]);
  assert_eq!(attempts.load(Ordering::SeqCst), 1);
  assert!(TestScheduler::is_empty());
}

#[rxlab_macro::test]
fn delayed_retry_waits_on_virtual_time() {
  TestScheduler::init();
  let attempts = Arc::new(AtomicUsize::new(0));
  let config = RetryConfig::new().count(2).delay(Duration::from_millis(100));
  let log = record(flaky(2, attempts.clone()).retry_when(config, |err| *err == "boom", TestScheduler));

  assert_eq!(attempts.load(Ordering::SeqCst), 1);
  TestScheduler::advance_by(Duration::from_millis(99));
  assert_eq!(attempts.load(Ordering::SeqCst), 1);
  TestScheduler::advance_by(Duration::from_millis(1));
  assert_eq!(attempts.load(Ordering::SeqCst), 2);
  TestScheduler::advance_by(Duration::from_millis(100));

  assert_eq!(attempts.load(Ordering::SeqCst), 3);
  assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3", "complete"]);
}

fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  file.write_all(content).unwrap();
  file.flush().unwrap();
  file
}

#[rxlab_macro::test]
fn file_bytes_arrive_in_order_on_a_thread_pool() {
  let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
  let file = temp_file(&content);

  let (tx, rx) = mpsc::channel();
  let bytes = Arc::new(Mutex::new(Vec::with_capacity(content.len())));
  let c_bytes = bytes.clone();
  let err_tx = tx.clone();
  from_file(file.path(), 64, ThreadPoolScheduler::default()).subscribe_all(
    move |b| c_bytes.lock().unwrap().push(b),
    move |err| err_tx.send(Err(err.to_string())).unwrap(),
    move || tx.send(Ok(())).unwrap(),
  );

  assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), Ok(()));
  assert_eq!(*bytes.lock().unwrap(), content);
}

#[rxlab_macro::test]
fn missing_file_reports_open_error() {
  let dir = tempfile::tempdir().unwrap();
  let log = record(from_file(dir.path().join("missing.bin"), DEFAULT_BUFFER_SIZE, TrampolineScheduler));

  let log = log.lock().unwrap();
  assert_eq!(log.len(), 1);
  assert!(log[0].starts_with("error: failed to open byte source"));
}

#[rxlab_macro::test]
fn no_byte_after_dispose_returns() {
  let content = vec![7u8; 50_000];
  let file = temp_file(&content);

  let (reached_tx, reached_rx) = mpsc::channel();
  let (gate_tx, gate_rx) = mpsc::channel::<()>();
  let received = Arc::new(AtomicUsize::new(0));
  let c_received = received.clone();
  let subscription = from_file(file.path(), 16, ThreadPoolScheduler::default()).subscribe_err(
    move |_| {
      if c_received.fetch_add(1, Ordering::SeqCst) + 1 == 100 {
        reached_tx.send(()).unwrap();
        // Hold the reading thread inside `next` while the main thread disposes.
        let _ = gate_rx.recv();
      }
    },
    |_| {},
  );

  reached_rx.recv_timeout(Duration::from_secs(10)).unwrap();
  subscription.unsubscribe();
  let at_dispose = received.load(Ordering::SeqCst);
  gate_tx.send(()).unwrap();

  thread::sleep(Duration::from_millis(50));
  assert_eq!(at_dispose, 100);
  assert_eq!(received.load(Ordering::SeqCst), at_dispose);
}

#[rxlab_macro::test]
fn count_windows_partition_the_source() {
  let windows: Arc<Mutex<Vec<Vec<i32>>>> = Arc::default();
  let c_windows = windows.clone();
  from_iter(0..10).window_count(3).subscribe(move |window: Subject<i32, Infallible>| {
    let index = {
      let mut windows = c_windows.lock().unwrap();
      windows.push(vec![]);
      windows.len() - 1
    };
    let items = c_windows.clone();
    window.subscribe(move |v| items.lock().unwrap()[index].push(v));
  });

  let windows = windows.lock().unwrap();
  let sizes: Vec<usize> = windows.iter().map(Vec::len).collect();
  assert_eq!(sizes, vec![3, 3, 3, 1]);
  assert_eq!(windows.concat(), (0..10).collect::<Vec<_>>());
}

#[rxlab_macro::test]
fn count_buffers_match_count_windows() {
  let log = record(from_iter(1..=7).buffer_count(2));
  assert_eq!(*log.lock().unwrap(), vec!["[1, 2]", "[3, 4]", "[5, 6]", "[7]", "complete"]);
}

/// A source emitting each `(millis, value)` pair at that virtual time.
fn timed<T>(events: Vec<(u64, T)>) -> impl Observable<Item = T, Err = Infallible> + Clone + Send + 'static
where
  T: Clone + Send + 'static,
{
  create(move |emitter: Emitter<T, Infallible>| {
    let group = MultiSubscription::new();
    for (at, value) in events.iter().cloned() {
      group.append(TestScheduler.schedule(
        Task::new((emitter.clone(), Some(value)), |(emitter, value)| {
          if let Some(value) = value.take() {
            emitter.next(value);
          }
          TaskState::Finished
        }),
        Some(Duration::from_millis(at)),
      ));
    }
    group
  })
}

#[rxlab_macro::test]
fn combine_latest_follows_virtual_time() {
  TestScheduler::init();
  let a = timed(vec![(0, 1), (10, 2)]);
  let b = timed(vec![(5, 'x'), (15, 'y')]);

  let output = Arc::new(Mutex::new(vec![]));
  let c_output = output.clone();
  a.combine_latest(b, |n, c| (n, c))
    .subscribe(move |pair| c_output.lock().unwrap().push((pair, TestScheduler::now())));
  TestScheduler::flush();

  let ms = Duration::from_millis;
  assert_eq!(
    *output.lock().unwrap(),
    vec![((1, 'x'), ms(5)), ((2, 'x'), ms(10)), ((2, 'y'), ms(15))]
  );
}

#[rxlab_macro::test]
fn shared_source_runs_its_side_effect_once() {
  let connections = Arc::new(AtomicUsize::new(0));
  let c_connections = connections.clone();
  let subject = Subject::<i32, Infallible>::new();
  let c_subject = subject.clone();
  let shared = create(move |emitter: Emitter<i32, Infallible>| {
    c_connections.fetch_add(1, Ordering::SeqCst);
    c_subject.clone().subscribe(move |v| emitter.next(v))
  })
  .share();

  let seen = Arc::new(Mutex::new(vec![]));
  let (s1, s2) = (seen.clone(), seen.clone());
  let first = shared.clone().subscribe(move |v| s1.lock().unwrap().push(("first", v)));
  let second = shared.clone().subscribe(move |v| s2.lock().unwrap().push(("second", v)));

  subject.clone().next(1);
  assert_eq!(connections.load(Ordering::SeqCst), 1);
  assert_eq!(*seen.lock().unwrap(), vec![("first", 1), ("second", 1)]);

  first.unsubscribe();
  second.unsubscribe();
  assert_eq!(subject.subscriber_count(), 0);

  // Cold again: a new subscriber starts a new connection.
  let _third = shared.subscribe(|_| {});
  assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[rxlab_macro::test]
fn dispose_twice_releases_once() {
  let teardowns = Arc::new(AtomicUsize::new(0));
  let c_teardowns = teardowns.clone();
  let subscription = MultiSubscription::new();
  subscription.append(ClosureSubscription(move || {
    c_teardowns.fetch_add(1, Ordering::SeqCst);
  }));

  subscription.clone().unsubscribe();
  subscription.clone().unsubscribe();
  assert!(subscription.is_closed());
  assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[rxlab_macro::test]
fn concurrent_dispose_releases_once() {
  for _ in 0..50 {
    let teardowns = Arc::new(AtomicUsize::new(0));
    let c_teardowns = teardowns.clone();
    let subject = Subject::<i32, Infallible>::new();
    let subscription = create(move |emitter: Emitter<i32, Infallible>| {
      let c_teardowns = c_teardowns.clone();
      let inner = subject.clone().subscribe(move |v| emitter.next(v));
      ClosureSubscription(move || {
        c_teardowns.fetch_add(1, Ordering::SeqCst);
        inner.unsubscribe();
      })
    })
    .retry(1)
    .subscribe(|_| {})
    .into_inner();

    let handles: Vec<_> = (0..4)
      .map(|_| {
        let subscription = subscription.clone();
        thread::spawn(move || subscription.unsubscribe())
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
  }
}

/// Records every signal and reports the terminal one on the returned channel.
fn record_until_done<S>(source: S) -> (Log, mpsc::Receiver<()>)
where
  S: Observable,
  S::Item: std::fmt::Debug,
  S::Err: std::fmt::Display,
{
  let log = Log::default();
  let (tx, rx) = mpsc::channel();
  let err_tx = tx.clone();
  let (n, e, c) = (log.clone(), log.clone(), log.clone());
  source.subscribe_all(
    move |v| n.lock().unwrap().push(format!("{v:?}")),
    move |err| {
      e.lock().unwrap().push(format!("error: {err}"));
      let _ = err_tx.send(());
    },
    move || {
      c.lock().unwrap().push("complete".to_owned());
      let _ = tx.send(());
    },
  );
  (log, rx)
}

#[rxlab_macro::test]
fn delayed_retry_on_a_thread_pool() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let config = RetryConfig::new().count(2).delay(Duration::from_millis(20));
  let started = std::time::Instant::now();
  let (log, done) = record_until_done(flaky(2, attempts.clone()).retry_when(
    config,
    |err| *err == "boom",
    ThreadPoolScheduler::default(),
  ));

  done.recv_timeout(Duration::from_secs(10)).unwrap();
  assert!(started.elapsed() >= Duration::from_millis(40));
  assert_eq!(attempts.load(Ordering::SeqCst), 3);
  assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3", "complete"]);
}

#[cfg(feature = "timer")]
#[rxlab_macro::test]
fn delayed_retry_on_the_timer_thread() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let config = RetryConfig::new().count(2).delay(Duration::from_millis(20));
  let started = std::time::Instant::now();
  let timer = TimerScheduler::new().unwrap();
  let (log, done) = record_until_done(flaky(2, attempts.clone()).retry_when(config, |_| true, timer));

  done.recv_timeout(Duration::from_secs(10)).unwrap();
  assert!(started.elapsed() >= Duration::from_millis(40));
  assert_eq!(attempts.load(Ordering::SeqCst), 3);
  assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3", "complete"]);
}

#[rxlab_macro::test]
fn delayed_retry_gives_up_on_a_thread_pool() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let config = RetryConfig::new().count(1).delay(Duration::from_millis(10));
  let (log, done) =
    record_until_done(flaky(5, attempts.clone()).retry_when(config, |_| true, ThreadPoolScheduler::default()));

  done.recv_timeout(Duration::from_secs(10)).unwrap();
  assert_eq!(*log.lock().unwrap(), vec!["error: boom"]);
  assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[rxlab_macro::test]
fn combine_latest_from_two_producer_threads() {
  let a = Subject::<i32, Infallible>::new();
  let b = Subject::<i32, Infallible>::new();
  let pairs = Arc::new(Mutex::new(vec![]));
  let (c_pairs, completions) = (pairs.clone(), Arc::new(AtomicUsize::new(0)));
  let c_completions = completions.clone();
  let (tx, rx) = mpsc::channel();
  let _subscription = a.clone().combine_latest(b.clone(), |x, y| (x, y)).subscribe_all(
    move |pair| c_pairs.lock().unwrap().push(pair),
    |never: Infallible| match never {},
    move || {
      c_completions.fetch_add(1, Ordering::SeqCst);
      tx.send(()).unwrap();
    },
  );

  let producers: Vec<_> = [a, b]
    .into_iter()
    .map(|mut side| {
      thread::spawn(move || {
        for v in 0..100 {
          side.next(v);
        }
        side.complete();
      })
    })
    .collect();
  for producer in producers {
    producer.join().unwrap();
  }

  rx.recv_timeout(Duration::from_secs(10)).unwrap();
  thread::sleep(Duration::from_millis(20));
  assert_eq!(completions.load(Ordering::SeqCst), 1);
  let pairs = pairs.lock().unwrap();
  assert!(!pairs.is_empty());
  assert!(pairs.iter().all(|&(x, y)| (0..100).contains(&x) && (0..100).contains(&y)));
  // Whichever side registers its last value second pairs it with the other's.
  assert!(pairs.contains(&(99, 99)));
}

#[rxlab_macro::test]
fn concurrent_subscribers_share_one_connection() {
  for _ in 0..20 {
    let connections = Arc::new(AtomicUsize::new(0));
    let c_connections = connections.clone();
    let subject = Subject::<i32, Infallible>::new();
    let c_subject = subject.clone();
    let shared = create(move |emitter: Emitter<i32, Infallible>| {
      c_connections.fetch_add(1, Ordering::SeqCst);
      c_subject.clone().subscribe(move |v| emitter.next(v))
    })
    .share();

    let seen = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(std::sync::Barrier::new(4));
    let subscribers: Vec<_> = (0..4)
      .map(|_| {
        let (shared, seen, barrier) = (shared.clone(), seen.clone(), barrier.clone());
        thread::spawn(move || {
          barrier.wait();
          shared.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
          })
        })
      })
      .collect();
    let subscriptions: Vec<_> = subscribers.into_iter().map(|s| s.join().unwrap()).collect();

    subject.clone().next(1);
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(seen.load(Ordering::SeqCst), 4);

    for subscription in subscriptions {
      subscription.unsubscribe();
    }
    assert_eq!(subject.subscriber_count(), 0);
  }
}
