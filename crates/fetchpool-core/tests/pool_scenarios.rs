//! Integration tests: the pool drains a backlog against a fake downloader and
//! an on-disk history, and scales against a scripted CPU probe.

mod common;

use std::sync::mpsc::TryRecvError;
use std::sync::Arc;
use std::time::Duration;

use common::fakes::RecordingDownloader;
use common::{fast_config, wait_for, Fixture};
use fetchpool_core::{HistoryStore, Job, PoolError, PoolEvent, PoolState, StaticProbe};

const LONG: Duration = Duration::from_secs(10);

fn jobs(n: usize) -> Vec<Job> {
    (0..n).map(|i| Job::new(format!("https://v.test/{i}"))).collect()
}

#[test]
fn ten_jobs_with_fixed_pool_all_marked_done() {
    let fx = Fixture::new();
    let downloader = Arc::new(RecordingDownloader::new());
    let (mut pool, _rx) = fx.pool(fast_config(2, 2), downloader.clone(), Arc::new(StaticProbe::new(50.0)));

    fx.queue.enqueue_all(jobs(10));
    pool.start().unwrap();
    assert_eq!(pool.live_workers(), 2);
    fx.queue.wait_until_drained();
    pool.stop().unwrap();

    assert_eq!(fx.history.len(), 10);
    for job in jobs(10) {
        assert!(fx.history.is_done(&job), "{job} not done");
    }
    let stats = pool.stats();
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.failed, 0);
    assert_eq!(downloader.total_calls(), 10);
    // Durable: a fresh store sees the same records.
    assert_eq!(HistoryStore::open(fx.history_path()).len(), 10);
}

#[test]
fn already_done_job_is_never_downloaded() {
    let fx = Fixture::new();
    let x = Job::new("https://v.test/x");
    fx.history.mark_done(&x).unwrap();
    let downloader = Arc::new(RecordingDownloader::new());
    let (mut pool, _rx) = fx.pool(fast_config(2, 4), downloader.clone(), Arc::new(StaticProbe::new(80.0)));

    fx.queue.enqueue(x.clone());
    pool.start().unwrap();
    assert!(fx.queue.wait_until_drained_timeout(Duration::from_secs(2)));
    pool.stop().unwrap();

    assert_eq!(downloader.total_calls(), 0);
    assert_eq!(pool.stats().skipped, 1);
    assert!(fx.history.is_done(&x));
}

#[test]
fn failing_job_is_reported_once_and_left_unmarked() {
    let fx = Fixture::new();
    let y = "https://v.test/y";
    let downloader = Arc::new(RecordingDownloader::new().failing(y));
    let (mut pool, rx) = fx.pool(fast_config(2, 2), downloader.clone(), Arc::new(StaticProbe::new(50.0)));

    let mut backlog = jobs(4);
    backlog.insert(2, Job::new(y));
    fx.queue.enqueue_all(backlog);
    pool.start().unwrap();
    fx.queue.wait_until_drained();
    pool.stop().unwrap();
    drop(pool);

    assert!(!fx.history.is_done(&Job::new(y)));
    assert_eq!(fx.history.len(), 4);
    assert_eq!(downloader.calls_for(y), 1);

    let failures: Vec<_> = rx
        .try_iter()
        .filter_map(|e| match e {
            PoolEvent::Failed { job, error } => Some((job, error)),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Job::new(y));
    assert!(failures[0].1.contains("simulated failure"));
}

#[test]
fn every_job_is_either_done_or_reported_failed() {
    let fx = Fixture::new();
    let downloader = Arc::new(
        RecordingDownloader::new()
            .failing("https://v.test/3")
            .failing("https://v.test/7"),
    );
    let (mut pool, rx) = fx.pool(fast_config(3, 3), downloader, Arc::new(StaticProbe::new(50.0)));

    fx.queue.enqueue_all(jobs(12));
    pool.start().unwrap();
    fx.queue.wait_until_drained();
    pool.stop().unwrap();
    drop(pool);

    let failed: Vec<Job> = rx
        .try_iter()
        .filter_map(|e| match e {
            PoolEvent::Failed { job, .. } => Some(job),
            _ => None,
        })
        .collect();
    for job in jobs(12) {
        let done = fx.history.is_done(&job);
        let reported = failed.contains(&job);
        assert!(done ^ reported, "{job}: done={done} reported={reported}");
    }
    assert_eq!(failed.len(), 2);
}

#[test]
fn panicking_downloader_counts_as_failure_and_pool_keeps_going() {
    let fx = Fixture::new();
    let downloader = Arc::new(RecordingDownloader::new().panicking("https://v.test/1"));
    let (mut pool, _rx) = fx.pool(fast_config(1, 1), downloader, Arc::new(StaticProbe::new(50.0)));

    fx.queue.enqueue_all(jobs(3));
    pool.start().unwrap();
    assert!(fx.queue.wait_until_drained_timeout(LONG));
    pool.stop().unwrap();

    let stats = pool.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 2);
    assert!(!fx.history.is_done(&Job::new("https://v.test/1")));
}

#[test]
fn duplicate_enqueue_yields_single_done_record() {
    let fx = Fixture::new();
    let downloader = Arc::new(RecordingDownloader::new().with_delay(Duration::from_millis(30)));
    let (mut pool, _rx) = fx.pool(fast_config(2, 2), downloader.clone(), Arc::new(StaticProbe::new(50.0)));

    let job = Job::new("https://v.test/dup");
    fx.queue.enqueue(job.clone());
    fx.queue.enqueue(job.clone());
    pool.start().unwrap();
    fx.queue.wait_until_drained();
    pool.stop().unwrap();

    assert_eq!(fx.history.done_jobs(), vec![job]);
    let calls = downloader.total_calls();
    assert!((1..=2).contains(&calls), "calls = {calls}");
    let stats = pool.stats();
    assert_eq!(stats.processed(), 2);
    assert_eq!(stats.failed, 0);
}

#[test]
fn low_cpu_grows_to_max_and_no_further() {
    let fx = Fixture::new();
    let (mut pool, rx) = fx.pool(
        fast_config(2, 8),
        Arc::new(RecordingDownloader::new()),
        Arc::new(StaticProbe::new(10.0)),
    );
    pool.start().unwrap();
    assert_eq!(pool.live_workers(), 2);

    assert!(wait_for(LONG, || pool.live_workers() == 8), "live = {}", pool.live_workers());
    // Several more intervals at low CPU: still capped.
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(pool.live_workers(), 8);
    pool.stop().unwrap();
    drop(pool);

    let max_seen = rx
        .try_iter()
        .filter_map(|e| match e {
            PoolEvent::Scaled { live, .. } => Some(live),
            _ => None,
        })
        .max();
    assert_eq!(max_seen, Some(8));
}

#[test]
fn high_cpu_shrinks_to_min_and_can_grow_again() {
    let fx = Fixture::new();
    let probe = Arc::new(StaticProbe::new(10.0));
    let (mut pool, _rx) = fx.pool(fast_config(1, 4), Arc::new(RecordingDownloader::new()), probe.clone());
    pool.start().unwrap();

    assert!(wait_for(LONG, || pool.live_workers() == 4));
    probe.set(99.0);
    assert!(wait_for(LONG, || pool.live_workers() == 1));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(pool.live_workers(), 1, "never below min_workers");

    // Shrinking keeps the accounting exact, so growth works again afterwards.
    probe.set(10.0);
    assert!(wait_for(LONG, || pool.live_workers() == 4));
    pool.stop().unwrap();
}

#[test]
fn live_count_stays_within_bounds_while_load_oscillates() {
    let fx = Fixture::new();
    let probe = Arc::new(StaticProbe::new(10.0));
    let (mut pool, _rx) = fx.pool(
        fast_config(2, 5),
        Arc::new(RecordingDownloader::new().with_delay(Duration::from_millis(5))),
        probe.clone(),
    );
    fx.queue.enqueue_all(jobs(40));
    pool.start().unwrap();

    std::thread::scope(|s| {
        let pool = &pool;
        let sampler = s.spawn(move || {
            for _ in 0..200 {
                let live = pool.live_workers();
                assert!((2..=5).contains(&live), "live = {live}");
                std::thread::sleep(Duration::from_millis(2));
            }
        });
        for i in 0..10 {
            probe.set(if i % 2 == 0 { 99.0 } else { 5.0 });
            std::thread::sleep(Duration::from_millis(40));
        }
        sampler.join().unwrap();
    });

    fx.queue.wait_until_drained();
    pool.stop().unwrap();
    assert_eq!(fx.history.len(), 40);
}

#[test]
fn retiring_workers_count_against_max_until_they_exit() {
    let fx = Fixture::new();
    let probe = Arc::new(StaticProbe::new(10.0));
    let downloader = Arc::new(RecordingDownloader::new().with_delay(Duration::from_millis(10)));
    let (mut pool, _rx) = fx.pool(fast_config(1, 2), downloader.clone(), probe.clone());
    // Long backlog: a retire signal sits behind hundreds of jobs.
    fx.queue.enqueue_all(jobs(300));
    pool.start().unwrap();

    for i in 0..30 {
        probe.set(if i % 2 == 0 { 10.0 } else { 99.0 });
        std::thread::sleep(Duration::from_millis(20));
    }
    probe.set(50.0);

    fx.queue.wait_until_drained();
    pool.stop().unwrap();
    assert_eq!(fx.history.len(), 300);
    let peak = downloader.peak_in_flight();
    assert!(peak <= 2, "peak concurrent downloads = {peak}");
}

#[test]
fn equal_bounds_disable_scaling() {
    let fx = Fixture::new();
    let probe = Arc::new(StaticProbe::new(0.0));
    let (mut pool, rx) = fx.pool(fast_config(3, 3), Arc::new(RecordingDownloader::new()), probe.clone());
    pool.start().unwrap();
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(pool.live_workers(), 3);
    probe.set(100.0);
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(pool.live_workers(), 3);
    pool.stop().unwrap();
    drop(pool);
    assert!(!rx.try_iter().any(|e| matches!(e, PoolEvent::Scaled { .. })));
}

#[test]
fn stop_waits_for_in_flight_job_and_leaves_no_threads() {
    let fx = Fixture::new();
    let downloader = Arc::new(RecordingDownloader::new().with_delay(Duration::from_millis(200)));
    let (mut pool, rx) = fx.pool(fast_config(2, 6), downloader.clone(), Arc::new(StaticProbe::new(10.0)));

    fx.queue.enqueue(Job::new("https://v.test/slow"));
    pool.start().unwrap();
    assert!(wait_for(LONG, || downloader.in_flight() == 1));
    pool.stop().unwrap();

    assert_eq!(downloader.in_flight(), 0);
    assert!(fx.history.is_done(&Job::new("https://v.test/slow")));
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(pool.live_workers(), 0);
    assert_eq!(fx.queue.outstanding(), 0, "leftover shutdown signals discarded");

    // Every worker and the scaler held a handle to the event sender; once the
    // pool is gone the channel must be closed, i.e. no thread outlived stop().
    drop(pool);
    let _ = rx.try_iter().count();
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
}

#[test]
fn stop_before_any_job_returns_promptly() {
    let fx = Fixture::new();
    let (mut pool, _rx) = fx.pool(fast_config(2, 4), Arc::new(RecordingDownloader::new()), Arc::new(StaticProbe::new(80.0)));
    pool.start().unwrap();
    pool.stop().unwrap();
    assert!(fx.queue.wait_until_drained_timeout(Duration::from_secs(1)));
}

#[test]
fn jobs_queued_before_stop_are_processed_before_shutdown() {
    let fx = Fixture::new();
    let (mut pool, _rx) = fx.pool(fast_config(2, 2), Arc::new(RecordingDownloader::new()), Arc::new(StaticProbe::new(50.0)));
    fx.queue.enqueue_all(jobs(6));
    pool.start().unwrap();
    pool.stop().unwrap();
    assert_eq!(fx.history.len(), 6);
    assert_eq!(fx.queue.outstanding(), 0);
}

#[test]
fn lifecycle_is_idle_running_stopped() {
    let fx = Fixture::new();
    let (mut pool, _rx) = fx.pool(fast_config(1, 2), Arc::new(RecordingDownloader::new()), Arc::new(StaticProbe::new(80.0)));
    assert_eq!(pool.state(), PoolState::Idle);
    assert!(matches!(pool.stop(), Err(PoolError::NotStarted)));

    pool.start().unwrap();
    assert_eq!(pool.state(), PoolState::Running);
    assert!(matches!(pool.start(), Err(PoolError::AlreadyRunning)));

    pool.stop().unwrap();
    assert!(matches!(pool.stop(), Err(PoolError::AlreadyStopped)));
    assert!(matches!(pool.start(), Err(PoolError::AlreadyStopped)));
}

#[test]
fn progress_reaches_total() {
    let fx = Fixture::new();
    let (mut pool, rx) = fx.pool(fast_config(2, 2), Arc::new(RecordingDownloader::new()), Arc::new(StaticProbe::new(50.0)));
    fx.queue.enqueue_all(jobs(5));
    pool.start().unwrap();
    fx.queue.wait_until_drained();
    pool.stop().unwrap();
    drop(pool);

    let last = rx
        .try_iter()
        .filter_map(|e| match e {
            PoolEvent::Progress(p) => Some(p),
            _ => None,
        })
        .max_by_key(|p| p.done)
        .unwrap();
    assert_eq!((last.done, last.total), (5, 5));
}

#[test]
fn invalid_config_is_clamped_not_rejected() {
    let fx = Fixture::new();
    let (mut pool, _rx) = fx.pool(fast_config(0, 0), Arc::new(RecordingDownloader::new()), Arc::new(StaticProbe::new(50.0)));
    assert_eq!(pool.config().min_workers, 1);
    assert_eq!(pool.config().max_workers, 1);
    fx.queue.enqueue_all(jobs(2));
    pool.start().unwrap();
    fx.queue.wait_until_drained();
    pool.stop().unwrap();
    assert_eq!(fx.history.len(), 2);
}
