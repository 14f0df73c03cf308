use std::{env, process};

use anyhow::{Context, bail};
use orchestrator::{Checkpoint, configs::FederationConfig, train};

const CONFIG_ENV: &str = "FEDAVG_CONFIG";

fn usage(bin: &str) -> ! {
    eprintln!("Usage: {bin} train [config.json] | {bin} inspect <checkpoint.json>");
    eprintln!("The config path may also be given through {CONFIG_ENV}.");
    process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let bin = args.first().map(String::as_str).unwrap_or("orchestrator");

    match args.get(1).map(String::as_str) {
        Some("train") => {
            let path = match args.get(2) {
                Some(path) => path.clone(),
                None => env::var(CONFIG_ENV).unwrap_or_else(|_| usage(bin)),
            };

            run_training(&path).await
        }
        Some("inspect") => {
            let Some(path) = args.get(2) else {
                usage(bin);
            };

            inspect(path)
        }
        Some(other) => bail!("unknown command: {other}"),
        None => usage(bin),
    }
}

async fn run_training(path: &str) -> anyhow::Result<()> {
    let config = FederationConfig::from_json_file(path)
        .with_context(|| format!("loading config '{path}'"))?;

    let (coordinator, report) = train(&config).await.context("federated training failed")?;

    for result in &report.rounds {
        let round = &result.round;
        println!(
            "round {:>3}: participants={:?} dropped={:?} train_loss={} eval_loss={}",
            round.number,
            round.participants,
            round.dropped,
            fmt_loss(round.train_loss),
            fmt_loss(round.eval_loss),
        );
    }

    if report.stopped {
        println!("stopped early after round {}", coordinator.handle().round());
    }

    if let Some(path) = &config.checkpoint {
        println!("checkpoint written to {}", path.display());
    }

    Ok(())
}

fn inspect(path: &str) -> anyhow::Result<()> {
    let checkpoint =
        Checkpoint::load(path).with_context(|| format!("loading checkpoint '{path}'"))?;
    let state = checkpoint.global_state();

    println!("model from round {}", state.round());
    for (name, param) in state.parameters().iter() {
        let tensor = param.tensor();
        println!(
            "  {name}: {} {} {:?}",
            param.kind(),
            tensor.dtype(),
            tensor.shape()
        );
    }

    if let Some(last) = checkpoint.history().last() {
        println!(
            "last round: train_loss={} eval_loss={}",
            fmt_loss(last.train_loss),
            fmt_loss(last.eval_loss)
        );
    }

    Ok(())
}

fn fmt_loss(loss: Option<f64>) -> String {
    loss.map_or_else(|| "-".to_string(), |l| format!("{l:.6}"))
}
