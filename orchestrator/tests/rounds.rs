mod common;

use std::time::Duration;

use common::{Script, ScriptedAdapter, coordinator, dataset, params, seen, w};
use orchestrator::{CoordinatorState, Evaluator, OrchestratorError};
use parameter_server::AggregationErr;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn round_is_weighted_by_partition_size() {
    let scripts = [Script::new(1.), Script::new(2.), Script::new(3.)];
    let mut coordinator = coordinator(&scripts, &[10, 20, 30], None);

    let result = coordinator.start_round().await.unwrap();
    let global = coordinator.get_global_parameters();

    assert_eq!(result.round.number, 1);
    assert_eq!(result.round.participants, [0, 1, 2]);
    assert!(result.dropped.is_empty());
    assert!((w(&global) - 7. / 3.).abs() < 1e-6);

    // Structural state comes from the lowest participant id.
    assert_eq!(seen(&global), 10);
    assert_eq!(coordinator.get_history().len(), 1);
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_participant_is_dropped_and_survivor_renormalized() {
    let scripts = [Script::new(4.), Script::failing(100.)];
    let mut coordinator = coordinator(&scripts, &[5, 50], None);

    let result = coordinator.start_round().await.unwrap();

    assert_eq!(result.round.number, 1);
    assert_eq!(result.round.participants, [0]);
    assert_eq!(result.round.dropped, [1]);
    assert_eq!(result.dropped[0].participant, 1);
    assert_eq!(w(&coordinator.get_global_parameters()), 4.);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn round_without_survivors_changes_nothing() {
    let scripts = [Script::failing(1.), Script::failing(2.)];
    let mut coordinator = coordinator(&scripts, &[5, 5], None);
    let before = coordinator.handle().checkpoint();

    let err = coordinator.start_round().await.unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Aggregation(AggregationErr::NoSuccessfulParticipants)
    ));
    assert!(err.to_string().contains("no successful participants"));
    assert_eq!(coordinator.handle().checkpoint(), before);
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn straggler_past_the_deadline_is_dropped() {
    let mut slow = Script::new(9.);
    slow.delay = Some(Duration::from_millis(400));

    let scripts = [Script::new(1.), slow];
    let mut coordinator = coordinator(&scripts, &[5, 5], Some(Duration::from_millis(100)));

    let result = coordinator.start_round().await.unwrap();

    assert_eq!(result.round.participants, [0]);
    assert_eq!(result.round.dropped, [1]);
    assert!(result.dropped[0].reason.contains("deadline"));
    assert_eq!(w(&coordinator.get_global_parameters()), 1.);

    // Still training the first round, so it sits this one out at once.
    let result = coordinator.start_round().await.unwrap();
    assert_eq!(result.round.dropped, [1]);
    assert!(result.dropped[0].reason.contains("busy"));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(coordinator.client_history(0), Some(vec![1., 1.]));
    assert_eq!(coordinator.client_history(1), Some(Vec::new()));
    assert_eq!(coordinator.client_history(7), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_participant_is_dropped() {
    let mut panicking = Script::new(9.);
    panicking.panic = true;

    let scripts = [panicking, Script::new(2.)];
    let mut coordinator = coordinator(&scripts, &[5, 5], None);

    let result = coordinator.start_round().await.unwrap();

    assert_eq!(result.round.dropped, [0]);
    assert!(result.dropped[0].reason.contains("scripted panic"));
    assert_eq!(w(&coordinator.get_global_parameters()), 2.);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_partitions_sit_out_without_being_dropped() {
    let scripts = [Script::new(1.), Script::new(5.)];
    let mut coordinator = coordinator(&scripts, &[5, 0], None);

    let result = coordinator.start_round().await.unwrap();

    assert_eq!(result.round.participants, [0]);
    assert!(result.round.dropped.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn eval_loss_is_kept_apart_from_train_loss() {
    let scripts = [
        Script::new(1.).losses(&[1., 3.]),
        Script::new(1.).losses(&[5.]),
    ];

    let mut eval = Script::new(0.);
    eval.eval = Some(42.);
    let evaluator = Evaluator::new(Box::new(ScriptedAdapter::new(eval)), dataset());

    let mut coordinator = coordinator(&scripts, &[5, 5], None).with_evaluator(evaluator);
    let result = coordinator.start_round().await.unwrap();

    assert_eq!(result.round.train_loss, Some(3.));
    assert_eq!(result.round.eval_loss, Some(42.));
    assert_eq!(result.round.client_losses[&0], [1., 3.]);
    assert_eq!(result.round.client_losses[&1], [5.]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_evaluation_still_commits() {
    let mut eval = Script::new(0.);
    eval.eval = None;
    let evaluator = Evaluator::new(Box::new(ScriptedAdapter::new(eval)), dataset());

    let mut coordinator = coordinator(&[Script::new(3.)], &[5], None).with_evaluator(evaluator);
    let result = coordinator.start_round().await.unwrap();

    assert_eq!(result.round.number, 1);
    assert_eq!(result.round.eval_loss, None);
    assert_eq!(result.round.train_loss, Some(1.));
    assert_eq!(w(&coordinator.get_global_parameters()), 3.);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn participants_train_on_their_own_copy() {
    let mut scribbler = Script::failing(9.);
    scribbler.scribble = true;

    let mut reader = Script::new(3.);
    reader.delay = Some(Duration::from_millis(100));

    let (scribbled, read) = (scribbler.received.clone(), reader.received.clone());
    let mut coordinator = coordinator(&[scribbler, reader], &[5, 5], None);

    let result = coordinator.start_round().await.unwrap();

    assert_eq!(result.round.participants, [1]);
    assert_eq!(*scribbled.lock(), [999.]);
    assert_eq!(*read.lock(), [0.]);
    assert_eq!(coordinator.get_global_parameters(), params(3., 5));
}
