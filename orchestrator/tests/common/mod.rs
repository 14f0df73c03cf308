#![allow(dead_code)]

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use machine_learning::{
    DType, Dataset, MlErr, ModelAdapter, Param, ParamKind, ParameterSet, Result, Schema,
};
use ndarray::arr1;
use orchestrator::{Coordinator, CoordinatorOptions};
use parameter_server::ParameterStore;
use parking_lot::Mutex;
use worker::ClientTrainer;

pub const W: &str = "w";
pub const SEEN: &str = "seen";

pub fn schema() -> Schema {
    Schema::new()
        .with(W, ParamKind::Trainable, DType::F32, &[1])
        .with(SEEN, ParamKind::Structural, DType::I64, &[1])
}

pub fn params(w: f32, seen: i64) -> ParameterSet {
    ParameterSet::new()
        .with(W, Param::trainable(arr1(&[w]).into_dyn()))
        .with(SEEN, Param::structural(arr1(&[seen]).into_dyn()))
}

pub fn w(params: &ParameterSet) -> f32 {
    params.get(W).unwrap().tensor().as_f32().unwrap()[[0]]
}

pub fn seen(params: &ParameterSet) -> i64 {
    params.get(SEEN).unwrap().tensor().as_i64().unwrap()[[0]]
}

/// What a scripted participant reports when asked to train.
#[derive(Clone)]
pub struct Script {
    pub value: f32,
    pub losses: Vec<f64>,
    pub fail: Arc<AtomicBool>,
    /// Reports parameters under a schema nobody else uses.
    pub foreign: Arc<AtomicBool>,
    /// Overwrites its loaded copy of the global model before training.
    pub scribble: bool,
    /// The `w` every training run started from.
    pub received: Arc<Mutex<Vec<f32>>>,
    pub panic: bool,
    pub delay: Option<Duration>,
    /// `None` makes evaluation fail.
    pub eval: Option<f64>,
}

impl Script {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            losses: vec![1.0],
            fail: Arc::new(AtomicBool::new(false)),
            foreign: Arc::new(AtomicBool::new(false)),
            scribble: false,
            received: Arc::new(Mutex::new(Vec::new())),
            panic: false,
            delay: None,
            eval: Some(0.5),
        }
    }

    pub fn failing(value: f32) -> Self {
        let script = Self::new(value);
        script.fail.store(true, Ordering::SeqCst);
        script
    }

    pub fn losses(mut self, losses: &[f64]) -> Self {
        self.losses = losses.to_vec();
        self
    }
}

/// A model whose training outcome is fixed in advance.
pub struct ScriptedAdapter {
    params: ParameterSet,
    script: Script,
}

impl ScriptedAdapter {
    pub fn new(script: Script) -> Self {
        Self {
            params: params(0., 0),
            script,
        }
    }
}

impl ModelAdapter for ScriptedAdapter {
    fn schema(&self) -> Schema {
        schema()
    }

    fn parameters(&self) -> ParameterSet {
        self.params.clone()
    }

    fn load(&mut self, params: ParameterSet) -> Result<()> {
        schema().check(&params)?;
        self.params = params;

        if self.script.scribble {
            let w = self.params.get_mut(W).and_then(|p| p.tensor_mut().as_f32_mut());
            w.ok_or(MlErr::EmptyDataset)?.fill(999.);
        }

        Ok(())
    }

    fn train_local(
        &mut self,
        _dataset: &Dataset,
        partition: &[usize],
        _epochs: NonZeroUsize,
    ) -> Result<(ParameterSet, Vec<f64>)> {
        if let Some(delay) = self.script.delay {
            thread::sleep(delay);
        }

        self.script.received.lock().push(w(&self.params));

        if self.script.panic {
            panic!("scripted panic");
        }

        if self.script.fail.load(Ordering::SeqCst) {
            return Err(MlErr::Diverged { epoch: 0 });
        }

        self.params = params(self.script.value, partition.len() as i64);

        let mut update = self.params.clone();
        if self.script.foreign.load(Ordering::SeqCst) {
            update.insert("extra", Param::trainable(arr1(&[0.0f32]).into_dyn()));
        }

        Ok((update, self.script.losses.clone()))
    }

    fn evaluate(&self, _dataset: &Dataset) -> Result<f64> {
        self.script.eval.ok_or(MlErr::EmptyDataset)
    }
}

pub fn dataset() -> Arc<Dataset> {
    Arc::new(Dataset::from_rows(vec![0.; 200], 1, 1).unwrap())
}

/// Builds a coordinator whose participant `i` owns `sizes[i]` samples and follows
/// `scripts[i]`.
pub fn coordinator(
    scripts: &[Script],
    sizes: &[usize],
    round_deadline: Option<Duration>,
) -> Coordinator {
    let dataset = dataset();
    let mut start = 0;

    let trainers = scripts
        .iter()
        .zip(sizes)
        .enumerate()
        .map(|(id, (script, &size))| {
            let partition = (start..start + size).collect();
            start += size;

            let adapter = Box::new(ScriptedAdapter::new(script.clone()));
            ClientTrainer::new(id, adapter, Arc::clone(&dataset), partition)
        })
        .collect();

    let options = CoordinatorOptions {
        local_epochs: NonZeroUsize::MIN,
        round_deadline,
    };

    Coordinator::new(ParameterStore::new(params(0., 0)), trainers, options)
}
