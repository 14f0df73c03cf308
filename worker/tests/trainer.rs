use std::{num::NonZeroUsize, sync::Arc};

use machine_learning::{
    Dataset, ModelAdapter, Param, ParameterSet,
    arch::{LinearRegression, WEIGHTS, loss::Mse},
    optimization::GradientDescent,
};
use worker::{ClientTrainer, Partitioner, Strategy, WorkerErr};

fn adapter() -> Box<dyn ModelAdapter> {
    let batch_size = NonZeroUsize::new(8).unwrap();
    Box::new(LinearRegression::new(
        (2, 1),
        GradientDescent::new(0.05),
        Mse,
        batch_size,
        7,
    ))
}

fn dataset() -> Arc<Dataset> {
    Arc::new(Dataset::synthetic_linear(60, 2, 3, 0.01, 1).unwrap())
}

#[test]
fn trains_only_its_partition_and_weights_by_size() {
    let ds = dataset();
    let parts = Partitioner::new(Strategy::Iid, 3)
        .partition(ds.as_ref(), 4)
        .unwrap();

    let partition = parts.get(1).unwrap().to_vec();
    let mut trainer = ClientTrainer::new(1, adapter(), ds, partition.clone());
    let global = adapter().parameters();

    let epochs = NonZeroUsize::new(3).unwrap();
    let update = trainer.train_round(global, epochs).unwrap();
    trainer.record(&update);

    assert_eq!(update.participant(), 1);
    assert_eq!(update.weight(), partition.len() as f64);
    assert_eq!(update.losses().len(), 3);
    assert_eq!(trainer.history(), update.losses());

    let metrics = trainer.metrics();
    assert_eq!(metrics.rounds, 1);
    assert_eq!(metrics.epochs, 3);
    assert_eq!(metrics.samples, 3 * partition.len() as u64);
}

#[test]
fn history_accumulates_across_rounds() {
    let mut trainer = ClientTrainer::new(0, adapter(), dataset(), (0..20).collect());
    let epochs = NonZeroUsize::new(2).unwrap();

    let first = trainer.train_round(adapter().parameters(), epochs).unwrap();
    trainer.record(&first);
    let second = trainer.train_round(first.params().clone(), epochs).unwrap();
    trainer.record(&second);

    assert_eq!(trainer.history().len(), 4);
    assert_eq!(&trainer.history()[2..], second.losses());
}

#[test]
fn unrecorded_updates_stay_out_of_the_history() {
    let mut trainer = ClientTrainer::new(0, adapter(), dataset(), (0..20).collect());
    let epochs = NonZeroUsize::new(2).unwrap();

    trainer.train_round(adapter().parameters(), epochs).unwrap();

    assert!(trainer.history().is_empty());
    assert_eq!(trainer.metrics().rounds, 0);
    assert_eq!(trainer.metrics().epochs, 2);
}

#[test]
fn empty_partition_is_a_training_error() {
    let mut trainer = ClientTrainer::new(0, adapter(), dataset(), Vec::new());
    let epochs = NonZeroUsize::new(1).unwrap();

    let err = trainer.train_round(adapter().parameters(), epochs).unwrap_err();
    assert!(matches!(err, WorkerErr::EmptyPartition));
    assert_eq!(trainer.metrics().failures, 1);
}

#[test]
fn foreign_parameters_are_a_shape_mismatch() {
    let mut trainer = ClientTrainer::new(0, adapter(), dataset(), vec![0, 1, 2]);
    let epochs = NonZeroUsize::new(1).unwrap();

    let mut global = adapter().parameters();
    global.insert(WEIGHTS, Param::trainable(ndarray::arr1(&[1.0f32]).into_dyn()));

    let err = trainer.train_round(global, epochs).unwrap_err();
    assert!(matches!(err, WorkerErr::ShapeMismatch(_)));
    assert!(trainer.history().is_empty());
}

#[test]
fn global_copy_is_not_aliased() {
    let mut trainer = ClientTrainer::new(0, adapter(), dataset(), (0..30).collect());
    let epochs = NonZeroUsize::new(2).unwrap();

    let global: ParameterSet = adapter().parameters();
    let before = global.clone();
    let update = trainer.train_round(global.clone(), epochs).unwrap();

    assert_eq!(global, before);
    assert_ne!(update.params(), &before);
}
