use machine_learning::{ClientUpdate, Param, ParamKind, ParameterSet, Schema, Tensor};
use ndarray::ArrayD;
use rayon::prelude::*;

use super::{AggregationErr, Result};

/// Combines client updates into a single parameter set by weighted average.
///
/// Trainable parameters become `sum_i(w_i / sum(w) * value_i)`, accumulated in `f64`
/// and narrowed back to their declared dtype. Structural parameters are copied from
/// the first update, callers pass updates in a stable order so that source is
/// deterministic.
///
/// # Arguments
/// * `schema` - The layout of the global model, every update must follow it exactly.
/// * `updates` - The surviving updates of a round.
///
/// # Returns
/// The aggregated parameters or an `AggregationErr`, no partial result is ever produced.
pub fn fedavg(schema: &Schema, updates: &[ClientUpdate]) -> Result<ParameterSet> {
    let first = updates.first().ok_or(AggregationErr::EmptyUpdates)?;
    let scales = normalized_weights(updates)?;

    for update in updates {
        if let Some(detail) = schema.diff(&update.params().schema()) {
            return Err(AggregationErr::SchemaMismatch {
                participant: update.participant(),
                detail,
            });
        }
    }

    // Schemas match, so every update lists the same parameters in the same order.
    let columns: Vec<Vec<&Param>> = updates
        .iter()
        .map(|u| u.params().iter().map(|(_, p)| p).collect())
        .collect();

    let names: Vec<&str> = first.params().names().collect();

    let combined: Vec<(String, Param)> = names
        .par_iter()
        .enumerate()
        .map(|(i, &name)| {
            let canonical = columns[0][i];

            let param = match canonical.kind() {
                ParamKind::Structural => canonical.clone(),
                ParamKind::Trainable => {
                    let values = columns.iter().map(|params| params[i].tensor());
                    let tensor = weighted_sum(canonical.tensor(), values, &scales);
                    Param::trainable(tensor)
                }
            };

            (name.to_string(), param)
        })
        .collect();

    Ok(combined.into_iter().collect())
}

/// Validates every weight and scales them so they add up to one.
fn normalized_weights(updates: &[ClientUpdate]) -> Result<Vec<f64>> {
    for update in updates {
        let weight = update.weight();

        if !weight.is_finite() || weight < 0. {
            return Err(AggregationErr::InvalidWeight {
                participant: update.participant(),
                weight,
            });
        }
    }

    let total: f64 = updates.iter().map(ClientUpdate::weight).sum();
    if !total.is_finite() || total <= 0. {
        return Err(AggregationErr::NonPositiveTotalWeight);
    }

    Ok(updates.iter().map(|u| u.weight() / total).collect())
}

fn weighted_sum<'a, I>(like: &Tensor, values: I, scales: &[f64]) -> Tensor
where
    I: Iterator<Item = &'a Tensor>,
{
    let mut acc = ArrayD::<f64>::zeros(like.shape());

    for (value, &scale) in values.zip(scales) {
        acc.scaled_add(scale, &value.to_f64());
    }

    Tensor::from_f64(like.dtype(), acc)
}

#[cfg(test)]
mod tests {
    use machine_learning::DType;
    use ndarray::arr1;

    use super::*;

    fn update(participant: usize, weight: f64, w: f32, steps: i64) -> ClientUpdate {
        let params = ParameterSet::new()
            .with("w", Param::trainable(arr1(&[w]).into_dyn()))
            .with("steps", Param::structural(arr1(&[steps]).into_dyn()));

        ClientUpdate::new(participant, params, weight, vec![0.])
    }

    fn schema() -> Schema {
        Schema::new()
            .with("w", ParamKind::Trainable, DType::F32, &[1])
            .with("steps", ParamKind::Structural, DType::I64, &[1])
    }

    fn w(params: &ParameterSet) -> f32 {
        params.get("w").unwrap().tensor().as_f32().unwrap()[[0]]
    }

    #[test]
    fn weights_by_data_size() {
        let updates = [
            update(0, 10., 1., 0),
            update(1, 20., 2., 0),
            update(2, 30., 3., 0),
        ];

        let avg = fedavg(&schema(), &updates).unwrap();
        assert!((w(&avg) - 7. / 3.).abs() < 1e-6);
    }

    #[test]
    fn structural_comes_from_first_update() {
        let updates = [update(3, 1., 0., 40), update(5, 100., 0., 90)];

        let avg = fedavg(&schema(), &updates).unwrap();
        let steps = avg.get("steps").unwrap();

        assert_eq!(steps.kind(), ParamKind::Structural);
        assert_eq!(steps.tensor().as_i64().unwrap()[[0]], 40);
    }

    #[test]
    fn single_survivor_is_renormalized() {
        let avg = fedavg(&schema(), &[update(1, 0.25, 4., 0)]).unwrap();
        assert_eq!(w(&avg), 4.);
    }

    #[test]
    fn integer_trainables_are_rounded() {
        let schema = Schema::new().with("n", ParamKind::Trainable, DType::I64, &[1]);
        let params = |v: i64| ParameterSet::new().with("n", Param::trainable(arr1(&[v]).into_dyn()));
        let updates = [
            ClientUpdate::new(0, params(1), 1., vec![]),
            ClientUpdate::new(1, params(2), 3., vec![]),
        ];

        let avg = fedavg(&schema, &updates).unwrap();
        assert_eq!(avg.get("n").unwrap().tensor().as_i64().unwrap()[[0]], 2);
    }

    #[test]
    fn rejects_empty_updates() {
        assert_eq!(fedavg(&schema(), &[]), Err(AggregationErr::EmptyUpdates));
    }

    #[test]
    fn rejects_zero_total_weight() {
        let updates = [update(0, 0., 1., 0), update(1, 0., 2., 0)];
        assert_eq!(
            fedavg(&schema(), &updates),
            Err(AggregationErr::NonPositiveTotalWeight)
        );
    }

    #[test]
    fn rejects_negative_and_nan_weights() {
        let updates = [update(0, 5., 1., 0), update(1, -1., 2., 0)];
        assert!(matches!(
            fedavg(&schema(), &updates),
            Err(AggregationErr::InvalidWeight { participant: 1, .. })
        ));

        let updates = [update(4, f64::NAN, 1., 0)];
        assert!(matches!(
            fedavg(&schema(), &updates),
            Err(AggregationErr::InvalidWeight { participant: 4, .. })
        ));
    }

    #[test]
    fn rejects_different_name_sets() {
        let other = ParameterSet::new()
            .with("v", Param::trainable(arr1(&[1.0f32]).into_dyn()))
            .with("steps", Param::structural(arr1(&[0i64]).into_dyn()));
        let updates = [update(0, 1., 1., 0), ClientUpdate::new(1, other, 1., vec![])];

        let err = fedavg(&schema(), &updates).unwrap_err();
        assert!(matches!(err, AggregationErr::SchemaMismatch { participant: 1, .. }));
        assert!(err.to_string().contains("schema mismatch"));
    }

    #[test]
    fn rejects_kind_mismatch() {
        let flipped = ParameterSet::new()
            .with("w", Param::structural(arr1(&[1.0f32]).into_dyn()))
            .with("steps", Param::structural(arr1(&[0i64]).into_dyn()));
        let updates = [ClientUpdate::new(2, flipped, 1., vec![])];

        assert!(matches!(
            fedavg(&schema(), &updates),
            Err(AggregationErr::SchemaMismatch { participant: 2, .. })
        ));
    }
}
