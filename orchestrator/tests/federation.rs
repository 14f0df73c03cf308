use machine_learning::arch::{BIAS, SAMPLES_SEEN, WEIGHTS};
use orchestrator::{Checkpoint, configs::FederationConfig, train};

fn config(partition: &str, checkpoint: &str) -> FederationConfig {
    let json = format!(
        r#"{{
            "participants": 4,
            "global_rounds": 8,
            "local_epochs": 2,
            "seed": 11,
            "round_deadline_ms": 30000,
            "model": {{
                "kind": "linear_regression",
                "x_size": 3,
                "y_size": 1,
                "batch_size": 8,
                "optimizer": {{ "kind": "gradient_descent", "lr": 0.02 }}
            }},
            "dataset": {{ "kind": "synthetic", "samples": 160, "x_size": 3, "groups": 4, "noise": 0.01 }},
            "eval_dataset": {{ "kind": "synthetic", "samples": 40, "x_size": 3, "seed": 99 }},
            "partition": {partition},
            "checkpoint": "{checkpoint}"
        }}"#
    );

    FederationConfig::from_json(&json).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn grouped_federation_learns_and_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fedavg.json");
    let config = config(r#"{ "kind": "grouped" }"#, &path.display().to_string());

    let (coordinator, report) = train(&config).await.unwrap();

    assert_eq!(report.rounds.len(), 8);
    assert_eq!(coordinator.handle().round(), 8);

    let first = &report.rounds[0].round;
    let last = &report.rounds[7].round;
    assert_eq!(first.participants, [0, 1, 2, 3]);
    assert!(last.train_loss.unwrap() < first.train_loss.unwrap());
    assert!(last.eval_loss.unwrap() < first.eval_loss.unwrap());

    let checkpoint = Checkpoint::load(&path).unwrap();
    let state = checkpoint.global_state();
    assert_eq!(state.round(), 8);
    assert_eq!(checkpoint.history().len(), 8);

    let names: Vec<&str> = state.parameters().names().collect();
    assert_eq!(names, [WEIGHTS, BIAS, SAMPLES_SEEN]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn iid_federation_runs_every_round() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("iid.json");
    let config = config(r#"{ "kind": "iid" }"#, &path.display().to_string());

    let (coordinator, report) = train(&config).await.unwrap();

    assert_eq!(report.last_round(), Some(8));
    assert!(report.rounds.iter().all(|r| r.dropped.is_empty()));
    assert_eq!(coordinator.get_history().train_losses().len(), 8);
}
