use crossbeam::channel::unbounded;
use prodcons::{
    BoundedBuffer, BufferState, Coordinator, Event, NullObserver, Recorder, Role, RunConfig,
    ShutdownStrategy, StrategyKind, Worker, WorkerId,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn config(
    capacity: usize,
    producers: usize,
    consumers: usize,
    strategy: StrategyKind,
) -> RunConfig {
    RunConfig {
        capacity,
        producers,
        consumers,
        run_duration_ms: 30,
        max_sleep_ms: 2,
        join_timeout_ms: 5_000,
        strategy,
    }
}

#[test]
fn test_single_slot_producer_blocks_until_shutdown() {
    let buffer = Arc::new(BoundedBuffer::new(1, ShutdownStrategy::Close).unwrap());
    let recorder = Arc::new(Recorder::new());
    let (tx, rx) = unbounded();

    let worker = Worker::new(
        WorkerId::new(Role::Producer, 1),
        Arc::clone(&buffer),
        recorder.clone(),
        Duration::ZERO,
    )
    .with_reports(tx);
    let handle = thread::spawn(move || worker.run());

    thread::sleep(Duration::from_millis(300));
    assert!(!handle.is_finished(), "producer should still be blocked");
    assert!(rx.try_recv().is_err());
    assert_eq!(buffer.len(), 1);
    assert_eq!(recorder.produced(), 1);

    buffer.shutdown();
    let report = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("producer did not exit after shutdown");
    assert_eq!(report.operations, 1);
    assert!(!report.panicked);
    assert_eq!(handle.join().unwrap(), 1);

    // The item written before the block is still there, unread.
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.state(), BufferState::ShuttingDown);
}

#[test]
fn test_shutdown_never_deadlocks_for_any_worker_mix() {
    for strategy in [StrategyKind::Close, StrategyKind::ReleasePermits] {
        for producers in 0..=4 {
            for consumers in 0..=4 {
                let report = Coordinator::new(config(2, producers, consumers, strategy))
                    .unwrap()
                    .with_observer(Arc::new(NullObserver))
                    .run()
                    .unwrap_or_else(|err| {
                        panic!("{strategy:?} P={producers} C={consumers}: {err}")
                    });
                assert_eq!(report.workers.len(), producers + consumers);
                assert!(report.is_conserved());
            }
        }
    }
}

#[test]
fn test_stress_without_pauses() {
    for strategy in [StrategyKind::Close, StrategyKind::ReleasePermits] {
        for _ in 0..5 {
            let config = RunConfig {
                max_sleep_ms: 0,
                run_duration_ms: 50,
                ..config(1, 8, 8, strategy)
            };
            let report = Coordinator::new(config)
                .unwrap()
                .with_observer(Arc::new(NullObserver))
                .run()
                .unwrap();
            assert!(report.is_conserved(), "{report:?}");
            assert!(report.leftover.len() <= 1);
        }
    }
}

#[test]
fn test_filled_count_stays_within_capacity() {
    let capacity = 3;
    let recorder = Arc::new(Recorder::new());
    let config = RunConfig {
        max_sleep_ms: 1,
        run_duration_ms: 200,
        ..config(capacity, 4, 2, StrategyKind::Close)
    };
    Coordinator::new(config)
        .unwrap()
        .with_observer(recorder.clone())
        .run()
        .unwrap();

    for event in recorder.events() {
        match event {
            Event::Produced { filled, .. } => assert!((1..=capacity).contains(&filled)),
            Event::Consumed { filled, .. } => assert!(filled < capacity),
            _ => {}
        }
    }
}

#[test]
fn test_two_second_single_pair_scenario() {
    let recorder = Arc::new(Recorder::new());
    let config = RunConfig {
        capacity: 2,
        producers: 1,
        consumers: 1,
        run_duration_ms: 2000,
        ..RunConfig::default()
    };
    let report = Coordinator::new(config)
        .unwrap()
        .with_observer(recorder.clone())
        .run()
        .unwrap();

    assert_eq!(report.produced as usize, recorder.produced());
    assert_eq!(report.consumed as usize, recorder.consumed());
    assert!(report.produced >= report.consumed);
    // Whatever was produced but not consumed is still sitting in the buffer.
    assert_eq!(report.produced - report.consumed, report.leftover.len() as u64);
    assert!(report.leftover.len() <= 2);
    assert_eq!(recorder.count(|e| matches!(e, Event::WorkerExited { .. })), 2);
}
