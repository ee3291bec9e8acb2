// tests/dispatch_concurrency.rs

use std::error::Error;
use std::sync::Arc;

use tokio::time::{Duration, Instant, timeout};

use fanrun::dispatch::{Dispatcher, OutputSink};
use fanrun::resolve::Target;
use fanrun_test_utils::builders::CommandSpecBuilder;
use fanrun_test_utils::fake_unit::{FakeUnitFactory, UnitScript};
use fanrun_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_targets_finish_in_roughly_the_slowest_unit_time() -> TestResult {
    init_tracing();

    // Stagger the waits between 25ms and 160ms. Serial execution would sum
    // to ~9s; concurrent execution is bounded by the slowest unit.
    let mut factory = FakeUnitFactory::new();
    let mut targets = Vec::new();
    for i in 0u64..100 {
        let addr = format!("/pool/n{i:03}");
        factory = factory.with_script(
            &addr,
            UnitScript {
                wait_delay: Duration::from_millis(25 + (i % 10) * 15),
                ..Default::default()
            },
        );
        targets.push(Target::new(&addr));
    }
    let dispatcher = Dispatcher::new(Arc::new(factory));
    let command = CommandSpecBuilder::new("/bin/true").build();

    let started = Instant::now();
    let outcomes = timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(targets, command, false),
    )
    .await??;
    let elapsed = started.elapsed();

    assert_eq!(outcomes.len(), 100);
    assert!(outcomes.iter().all(|o| o.is_success()));
    assert!(
        elapsed < Duration::from_secs(2),
        "dispatch took {elapsed:?}; units did not run concurrently"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tagged_lines_from_many_targets_stay_intact_and_ordered_per_target() -> TestResult {
    init_tracing();

    let mut factory = FakeUnitFactory::new();
    let mut targets = Vec::new();
    for t in 0..10 {
        let addr = format!("/pool/n{t}");
        let mut stdout = Vec::new();
        for line in 0..50 {
            stdout.extend_from_slice(format!("line{line}\n").as_bytes());
        }
        factory = factory.with_script(
            &addr,
            UnitScript {
                stdout,
                ..Default::default()
            },
        );
        targets.push(Target::new(&addr));
    }

    let (sink, mut rx) = OutputSink::capture();
    let dispatcher = Dispatcher::new(Arc::new(factory)).with_output_sink(sink);
    let command = CommandSpecBuilder::new("/bin/true").build();

    let collector = tokio::spawn(async move {
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        lines
    });

    let outcomes = timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(targets, command, true),
    )
    .await??;
    assert!(outcomes.iter().all(|o| o.is_success()));

    drop(dispatcher);
    let lines = timeout(Duration::from_secs(5), collector).await??;

    // Every line must be whole ("<addr> line<n>"), and per target the line
    // numbers must arrive in stream order.
    assert_eq!(lines.len(), 10 * 50);
    let mut next_for_target = vec![0usize; 10];
    for line in &lines {
        let (addr, rest) = line.split_once(' ').expect("line without separator");
        let t: usize = addr.strip_prefix("/pool/n").unwrap().parse()?;
        let n: usize = rest.strip_prefix("line").unwrap().parse()?;
        assert_eq!(n, next_for_target[t], "out-of-order line for {addr}: {line}");
        next_for_target[t] += 1;
    }
    assert!(next_for_target.iter().all(|&n| n == 50));
    Ok(())
}
