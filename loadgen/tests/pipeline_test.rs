use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use loadgen::{
    AppendOutcome, CancellationSignal, CompactionPolicy, Pipeline, PipelineConfig, PipelineStats,
    SharedAggregate, run_consumer, run_producer,
};
use rand::Rng;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{sleep, timeout};

const VECTOR_LEN: usize = 10_000;

fn random_vector(len: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(-1.0e6..1.0e6)).collect()
}

fn small_config() -> PipelineConfig {
    PipelineConfig {
        producer_size: 8,
        producer_iterations: 2,
        consumer_iterations: 2,
        main_loop_size: 8,
        main_loop_iterations: 2,
        ..PipelineConfig::default()
    }
}

async fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if done() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    done()
}

fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values
}

/// Appends `per_thread` random vectors from 5 threads at once while a
/// watcher thread checks the live length. Returns every appended value
/// and every outcome.
fn concurrent_appends(
    aggregate: &Arc<SharedAggregate>,
    per_thread: usize,
) -> (Vec<f64>, Vec<AppendOutcome>) {
    let cap = aggregate.policy().cap;
    let running = Arc::new(AtomicBool::new(true));

    let watcher = {
        let aggregate = Arc::clone(aggregate);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut max_seen = 0;
            while running.load(Ordering::SeqCst) {
                max_seen = max_seen.max(aggregate.len());
                thread::yield_now();
            }
            max_seen
        })
    };

    let workers: Vec<_> = (0..5)
        .map(|_| {
            let aggregate = Arc::clone(aggregate);
            thread::spawn(move || {
                let mut seen = Vec::with_capacity(per_thread * VECTOR_LEN);
                let mut outcomes = Vec::with_capacity(per_thread);
                for _ in 0..per_thread {
                    let data = random_vector(VECTOR_LEN);
                    seen.extend_from_slice(&data);
                    outcomes.push(aggregate.append(data));
                }
                (seen, outcomes)
            })
        })
        .collect();

    let mut all = Vec::new();
    let mut outcomes = Vec::new();
    for worker in workers {
        let (seen, worker_outcomes) = worker.join().unwrap();
        all.extend(seen);
        outcomes.extend(worker_outcomes);
    }

    running.store(false, Ordering::SeqCst);
    let max_seen = watcher.join().unwrap();
    assert!(max_seen <= cap, "observed length {} above cap {}", max_seen, cap);

    (all, outcomes)
}

#[test]
fn test_concurrent_append_then_single_compaction() {
    let aggregate = Arc::new(SharedAggregate::default());

    // 5 x 20 x 10_000 lands exactly on the cap, which does not compact.
    let (mut all, outcomes) = concurrent_appends(&aggregate, 20);
    assert!(outcomes.iter().all(|o| matches!(o, AppendOutcome::Appended { .. })));
    assert_eq!(aggregate.len(), 1_000_000);

    let last = random_vector(VECTOR_LEN);
    all.extend_from_slice(&last);
    assert_eq!(aggregate.append(last), AppendOutcome::Compacted { len: 1_000 });

    let expected: Vec<f64> = sorted(all).into_iter().take(1_000).collect();
    assert_eq!(aggregate.snapshot(), expected);

    let stats = aggregate.stats();
    assert_eq!(stats.compactions, 1);
    assert_eq!(stats.appended_total, 1_010_000);
    assert!(stats.high_water <= 1_000_000);
}

#[test]
fn test_concurrent_append_keeps_smallest_values() {
    let aggregate = Arc::new(SharedAggregate::default());

    let (all, outcomes) = concurrent_appends(&aggregate, 50);

    for outcome in &outcomes {
        if let AppendOutcome::Compacted { len } = outcome {
            assert_eq!(*len, 1_000);
        }
    }

    let stats = aggregate.stats();
    assert!(stats.compactions >= 2);
    assert_eq!(stats.appended_total, 2_500_000);
    assert!(stats.high_water <= 1_000_000);
    assert_eq!(stats.last_compaction_len, 1_000);

    // The overall smallest `keep` values survive every compaction.
    let smallest: Vec<f64> = sorted(all).into_iter().take(1_000).collect();
    let live = sorted(aggregate.snapshot());
    assert_eq!(&live[..1_000], &smallest[..]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_producer_blocks_on_full_channel() {
    let cancel = CancellationSignal::new();
    let stats = Arc::new(PipelineStats::default());
    let (tx, mut rx) = mpsc::channel(5);

    let producer = tokio::spawn(run_producer(4, 1, tx, cancel.clone(), Arc::clone(&stats)));

    assert!(wait_until(Duration::from_secs(10), || stats.produced() == 5).await);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(stats.produced(), 5, "producer must block, not drop");

    let first = rx.recv().await.unwrap();
    assert_eq!(first.len(), 16);
    assert!(wait_until(Duration::from_secs(10), || stats.produced() == 6).await);

    cancel.cancel();
    timeout(Duration::from_secs(5), producer)
        .await
        .expect("producer did not observe cancellation")
        .unwrap()
        .unwrap();

    let mut queued = 0;
    while rx.try_recv().is_ok() {
        queued += 1;
    }
    assert_eq!(queued, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_consumer_exits_when_producer_hangs_up() {
    let (tx, rx) = mpsc::channel::<Vec<f64>>(5);
    tx.send(vec![1.0, 2.0, 3.0]).await.unwrap();
    drop(tx);

    let aggregate = Arc::new(SharedAggregate::default());
    let stats = Arc::new(PipelineStats::default());
    let consumer = run_consumer(
        0,
        1,
        Arc::new(Mutex::new(rx)),
        Arc::clone(&aggregate),
        CancellationSignal::new(),
        Arc::clone(&stats),
    );

    timeout(Duration::from_secs(5), consumer)
        .await
        .expect("consumer did not exit on closed channel")
        .unwrap();

    assert_eq!(stats.consumed(), 1);
    assert_eq!(aggregate.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_stops_every_task() {
    let cancel = CancellationSignal::new();
    let aggregate = Arc::new(SharedAggregate::default());
    let pipeline = Pipeline::spawn(small_config(), Arc::clone(&aggregate), cancel.clone()).unwrap();
    let stats = pipeline.stats();

    assert!(
        wait_until(Duration::from_secs(30), || {
            stats.consumed() >= 10 && stats.main_loop_rounds() >= 1
        })
        .await
    );

    assert!(cancel.cancel());
    assert!(!cancel.cancel());

    timeout(Duration::from_secs(10), pipeline.join())
        .await
        .expect("pipeline did not stop after cancellation")
        .unwrap();

    assert!(!aggregate.is_empty());
}

#[tokio::test]
async fn test_spawn_rejects_invalid_config() {
    let config = PipelineConfig {
        consumers: 0,
        ..small_config()
    };
    let result = Pipeline::spawn(config, Arc::new(SharedAggregate::default()), CancellationSignal::new());
    assert!(matches!(result, Err(loadgen::Error::InvalidConfig(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_to_end_compaction() {
    let config = PipelineConfig {
        producer_size: 200,
        producer_iterations: 1,
        consumer_iterations: 1,
        main_loop: false,
        compaction: CompactionPolicy::default(),
        ..PipelineConfig::default()
    };
    assert_eq!(config.consumers, 5);

    let cancel = CancellationSignal::new();
    let aggregate = Arc::new(SharedAggregate::default());
    let pipeline = Pipeline::spawn(config, Arc::clone(&aggregate), cancel.clone()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(600);
    loop {
        let stats = aggregate.stats();
        assert!(stats.len <= 1_000_000, "live length {} above cap", stats.len);
        if stats.appended_total >= 2_000_000 {
            break;
        }
        assert!(Instant::now() < deadline, "pipeline too slow");
        sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    timeout(Duration::from_secs(60), pipeline.join())
        .await
        .expect("pipeline did not stop")
        .unwrap();

    let stats = aggregate.stats();
    assert!(stats.compactions >= 1);
    assert_eq!(stats.last_compaction_len, 1_000);
    assert!(stats.high_water <= 1_000_000);
}
