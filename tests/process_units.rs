// tests/process_units.rs

//! End-to-end tests over real local processes (unix only: they shell out to
//! `sh` and `sleep`).

#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;

use tokio::time::{Duration, timeout};

use fanrun::config::ConfigFile;
use fanrun::dispatch::{Dispatcher, OutputSink, UnitOutcome};
use fanrun::errors::FanrunError;
use fanrun::resolve::Target;
use fanrun::unit::{RosterUnitFactory, UnitFactory};
use fanrun_test_utils::builders::{CommandSpecBuilder, ConfigFileBuilder, TargetConfigBuilder};
use fanrun_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn two_node_roster() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_target(
            "/local/alpha",
            TargetConfigBuilder::new().env("NODE", "alpha").build(),
        )
        .with_target(
            "/local/beta",
            TargetConfigBuilder::new().env("NODE", "beta").build(),
        )
        .build()
}

fn sh(script: &str) -> fanrun::command::CommandSpec {
    CommandSpecBuilder::new("sh").arg("-c").arg(script).build()
}

async fn drain(mut rx: tokio::sync::mpsc::Receiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    lines
}

#[tokio::test]
async fn echo_across_two_targets_is_tagged_per_source() -> TestResult {
    init_tracing();
    let factory = Arc::new(RosterUnitFactory::from_config(&two_node_roster()));
    let (sink, rx) = OutputSink::capture();
    let dispatcher = Dispatcher::new(factory).with_output_sink(sink);

    let targets = vec![Target::new("/local/alpha"), Target::new("/local/beta")];
    let outcomes = timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(targets, sh("echo node $NODE"), true),
    )
    .await??;
    assert!(outcomes.iter().all(|o| o.is_success()));

    drop(dispatcher);
    let mut lines = drain(rx).await;
    lines.sort();
    assert_eq!(lines, ["/local/alpha node alpha", "/local/beta node beta"]);
    Ok(())
}

#[tokio::test]
async fn stderr_lines_are_tagged_too() -> TestResult {
    init_tracing();
    let factory = Arc::new(RosterUnitFactory::from_config(&two_node_roster()));
    let (sink, rx) = OutputSink::capture();
    let dispatcher = Dispatcher::new(factory).with_output_sink(sink);

    let outcomes = timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(
            vec![Target::new("/local/alpha")],
            sh("echo oops 1>&2"),
            true,
        ),
    )
    .await??;
    assert!(outcomes[0].is_success());

    drop(dispatcher);
    assert_eq!(drain(rx).await, ["/local/alpha oops"]);
    Ok(())
}

#[tokio::test]
async fn a_command_reading_stdin_terminates_because_stdin_is_closed() -> TestResult {
    init_tracing();
    let factory = Arc::new(RosterUnitFactory::from_config(&two_node_roster()));
    let dispatcher = Dispatcher::new(factory);

    // `cat` only exits once its stdin reaches end-of-input.
    let outcomes = timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(vec![Target::new("/local/alpha")], sh("cat"), false),
    )
    .await??;

    assert!(outcomes[0].is_success());
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_comes_back_as_a_completed_status() -> TestResult {
    init_tracing();
    let factory = Arc::new(RosterUnitFactory::from_config(&two_node_roster()));
    let dispatcher = Dispatcher::new(factory);

    let outcomes = timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(vec![Target::new("/local/alpha")], sh("exit 7"), false),
    )
    .await??;

    match &outcomes[0].outcome {
        UnitOutcome::Completed(status) => {
            assert_eq!(status.code, Some(7));
            assert!(!status.success());
        }
        other => panic!("expected a completed outcome, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn a_missing_binary_is_a_creation_failure() -> TestResult {
    init_tracing();
    let factory = Arc::new(RosterUnitFactory::from_config(&two_node_roster()));
    let dispatcher = Dispatcher::new(factory);

    let command = CommandSpecBuilder::new("/nonexistent/fanrun-no-such-binary").build();
    let outcomes = timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(vec![Target::new("/local/alpha")], command, false),
    )
    .await??;

    match &outcomes[0].outcome {
        UnitOutcome::Failed(err) => {
            assert!(err.to_string().contains("creating execution unit"), "got: {err}");
        }
        other => panic!("expected a failed outcome, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn an_address_missing_from_the_roster_fails_only_that_target() -> TestResult {
    init_tracing();
    let factory = Arc::new(RosterUnitFactory::from_config(&two_node_roster()));
    let dispatcher = Dispatcher::new(factory);

    let targets = vec![Target::new("/local/alpha"), Target::new("/ghost")];
    let outcomes = timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(targets, sh("true"), false),
    )
    .await??;

    assert!(outcomes[0].is_success());
    match &outcomes[1].outcome {
        UnitOutcome::Failed(err) => {
            assert!(err.to_string().contains("not in the roster"), "got: {err}");
        }
        other => panic!("expected a failed outcome, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn signalled_processes_report_the_signal_in_their_status() -> TestResult {
    init_tracing();
    let factory = RosterUnitFactory::from_config(&two_node_roster());
    let target = Target::new("/local/alpha");
    let command = CommandSpecBuilder::new("sleep").arg("30").build();

    let mut unit = factory.create(&target, &command).await?;
    unit.close_stdin().await?;
    // Give the child a moment to get going before signalling it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    unit.signal("TERM").await?;

    let status = timeout(Duration::from_secs(5), unit.wait()).await??;
    assert_eq!(status.signal, Some(15));
    assert_eq!(status.code, None);
    assert!(!status.success());
    Ok(())
}

#[tokio::test]
async fn dispatch_one_unwraps_a_real_process_failure() -> TestResult {
    init_tracing();
    let factory = Arc::new(RosterUnitFactory::from_config(&two_node_roster()));
    let dispatcher = Dispatcher::new(factory);

    let err = timeout(
        Duration::from_secs(5),
        dispatcher.dispatch_one(Target::new("/local/alpha"), sh("exit 3"), false),
    )
    .await?
    .unwrap_err();

    match err {
        FanrunError::CommandFailed { target, status } => {
            assert_eq!(target, "/local/alpha");
            assert_eq!(status.code, Some(3));
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
    Ok(())
}
