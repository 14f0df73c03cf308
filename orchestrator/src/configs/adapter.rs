use std::sync::Arc;

use log::info;
use machine_learning::{
    Dataset, ModelAdapter,
    arch::{LinearRegression, loss::Mse},
    initialization::{ConstParamGen, ParamGen, RandParamGen},
    optimization::{GradientDescent, Optimizer},
};
use parameter_server::ParameterStore;
use rand::{SeedableRng, rngs::StdRng};
use worker::{ClientTrainer, Partitioner, Strategy};

use super::{
    DatasetConfig, FederationConfig, LossFnConfig, ModelConfig, OptimizerConfig, ParamGenConfig,
    PartitionConfig,
};
use crate::{
    coordinator::{Coordinator, CoordinatorOptions, Evaluator},
    error::{OrchestratorError, Result},
};

/// Checks that `config` describes a federation that can be built.
pub fn validate(config: &FederationConfig) -> Result<()> {
    if config.participants == 0 {
        return Err(invalid("at least one participant is required"));
    }

    let (x_size, y_size) = config.model.dims();
    if x_size == 0 || y_size == 0 {
        return Err(invalid("model x_size and y_size must be greater than 0"));
    }

    let ModelConfig::LinearRegression { optimizer, .. } = config.model;
    let lr = optimizer.learning_rate();
    if !lr.is_finite() || lr <= 0. {
        return Err(invalid(format!("learning rate must be positive, got {lr}")));
    }

    validate_dataset("dataset", &config.dataset, config.model.dims())?;
    if let Some(eval) = &config.eval_dataset {
        validate_dataset("eval_dataset", eval, config.model.dims())?;
    }

    let grouped = matches!(config.partition, PartitionConfig::Grouped { .. });
    if grouped && !config.dataset.has_groups() {
        return Err(invalid("grouped partitioning needs a dataset with groups"));
    }

    if config.round_deadline_ms == Some(0) {
        return Err(invalid("round_deadline_ms must be greater than 0"));
    }

    Ok(())
}

fn validate_dataset(name: &str, dataset: &DatasetConfig, dims: (usize, usize)) -> Result<()> {
    let samples = match dataset {
        DatasetConfig::Synthetic {
            samples, groups, ..
        } => {
            if *groups == 0 {
                return Err(invalid(format!("{name}: groups must be greater than 0")));
            }
            *samples
        }
        DatasetConfig::Inline {
            data,
            x_size,
            y_size,
            groups,
        } => {
            let row_size = x_size + y_size;
            if row_size == 0 {
                return Err(invalid(format!(
                    "{name}: x_size + y_size must be greater than 0"
                )));
            }

            if data.len() % row_size != 0 {
                return Err(invalid(format!(
                    "{name}: length ({}) is not divisible by x_size + y_size ({row_size})",
                    data.len()
                )));
            }

            let samples = data.len() / row_size;
            let keys = groups.as_ref().map_or(samples, Vec::len);
            if keys != samples {
                return Err(invalid(format!(
                    "{name}: {keys} group keys for {samples} samples"
                )));
            }

            samples
        }
    };

    if samples == 0 {
        return Err(invalid(format!("{name} must have at least one sample")));
    }

    if dataset.dims() != dims {
        return Err(invalid(format!(
            "{name}: samples are {:?} but the model expects {dims:?}",
            dataset.dims()
        )));
    }

    Ok(())
}

/// Builds a ready to run `Coordinator` out of a validated config.
///
/// The dataset is partitioned among the participants, every participant gets its own
/// model, and the global model is initialized from the config's parameter generator.
pub fn build(config: &FederationConfig) -> Result<Coordinator> {
    validate(config)?;

    let dataset = Arc::new(build_dataset(&config.dataset, config.seed)?);
    let strategy = match config.partition {
        PartitionConfig::Iid => Strategy::Iid,
        PartitionConfig::Grouped {
            groups_per_participant,
        } => Strategy::Grouped {
            groups_per_participant,
        },
    };

    let partitions = Partitioner::new(strategy, config.seed)
        .partition(dataset.as_ref(), config.participants)?;

    let global = build_adapter(&config.model, config.seed)?;
    let store = ParameterStore::new(global.parameters());

    let trainers = partitions
        .into_inner()
        .into_iter()
        .enumerate()
        .map(|(id, partition)| {
            let seed = config.seed.wrapping_add(1 + id as u64);
            let adapter = build_adapter(&config.model, seed)?;
            Ok(ClientTrainer::new(id, adapter, Arc::clone(&dataset), partition))
        })
        .collect::<Result<Vec<_>>>()?;

    let options = CoordinatorOptions {
        local_epochs: config.local_epochs,
        round_deadline: config.round_deadline(),
    };

    info!(
        "built a federation of {} participants over {} samples",
        trainers.len(),
        dataset.len()
    );

    let coordinator = Coordinator::new(store, trainers, options);

    match &config.eval_dataset {
        Some(eval) => {
            let eval = Arc::new(build_dataset(eval, config.seed.wrapping_add(u64::MAX / 2))?);
            let adapter = build_adapter(&config.model, config.seed)?;
            Ok(coordinator.with_evaluator(Evaluator::new(adapter, eval)))
        }
        None => Ok(coordinator),
    }
}

fn build_dataset(config: &DatasetConfig, default_seed: u64) -> Result<Dataset> {
    let dataset = match config {
        DatasetConfig::Synthetic {
            samples,
            x_size,
            groups,
            noise,
            seed,
        } => Dataset::synthetic_linear(
            *samples,
            *x_size,
            *groups,
            *noise,
            seed.unwrap_or(default_seed),
        )?,
        DatasetConfig::Inline {
            data,
            x_size,
            y_size,
            groups,
        } => {
            let dataset = Dataset::from_rows(data.clone(), *x_size, *y_size)?;
            match groups {
                Some(groups) => dataset.with_groups(groups.clone())?,
                None => dataset,
            }
        }
    };

    Ok(dataset)
}

/// Creates a fresh model as described by `config`.
pub fn build_adapter(config: &ModelConfig, seed: u64) -> Result<Box<dyn ModelAdapter>> {
    let ModelConfig::LinearRegression {
        x_size,
        y_size,
        batch_size,
        optimizer,
        init,
        loss_fn,
    } = *config;

    let optimizer = build_optimizer(optimizer);
    let loss_fn = match loss_fn {
        LossFnConfig::Mse => Mse,
    };

    let mut param_gen = build_param_gen(init, (x_size, y_size), seed)?;
    let model = LinearRegression::new((x_size, y_size), optimizer, loss_fn, batch_size, seed)
        .with_init(param_gen.as_mut());

    Ok(Box::new(model))
}

fn build_optimizer(config: OptimizerConfig) -> Box<dyn Optimizer> {
    match config {
        OptimizerConfig::GradientDescent { lr } => Box::new(GradientDescent::new(lr)),
    }
}

fn build_param_gen(
    config: ParamGenConfig,
    dims: (usize, usize),
    seed: u64,
) -> Result<Box<dyn ParamGen>> {
    let (fan_in, fan_out) = dims;
    let limit = fan_in * fan_out;
    let rng = StdRng::seed_from_u64(seed);

    let param_gen: Box<dyn ParamGen> = match config {
        ParamGenConfig::Const { value } => Box::new(ConstParamGen::new(value, limit)),
        ParamGenConfig::Uniform { low, high } => {
            Box::new(RandParamGen::uniform(rng, limit, low, high)?)
        }
        ParamGenConfig::Normal { mean, std_dev } => {
            Box::new(RandParamGen::normal(rng, limit, mean, std_dev)?)
        }
        ParamGenConfig::XavierUniform => {
            Box::new(RandParamGen::xavier_uniform(rng, limit, fan_in, fan_out)?)
        }
        ParamGenConfig::Kaiming => Box::new(RandParamGen::kaiming(rng, limit, fan_in)?),
    };

    Ok(param_gen)
}

fn invalid(msg: impl Into<String>) -> OrchestratorError {
    OrchestratorError::InvalidConfig(msg.into())
}
