use std::{
    error::Error,
    fmt::{self, Display},
};

/// The aggregation module's result type.
pub type Result<T> = std::result::Result<T, AggregationErr>;

/// Failures that make a round impossible to aggregate. The global model is never
/// touched when one of these is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationErr {
    EmptyUpdates,
    NonPositiveTotalWeight,
    InvalidWeight {
        participant: usize,
        weight: f64,
    },
    SchemaMismatch {
        participant: usize,
        detail: String,
    },
    /// Every participant of the round failed or timed out.
    NoSuccessfulParticipants,
}

impl Display for AggregationErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationErr::EmptyUpdates => f.write_str("empty updates"),
            AggregationErr::NonPositiveTotalWeight => f.write_str("non-positive total weight"),
            AggregationErr::InvalidWeight {
                participant,
                weight,
            } => write!(f, "invalid weight {weight} from participant {participant}"),
            AggregationErr::SchemaMismatch {
                participant,
                detail,
            } => write!(f, "schema mismatch in participant {participant}: {detail}"),
            AggregationErr::NoSuccessfulParticipants => f.write_str("no successful participants"),
        }
    }
}

impl Error for AggregationErr {}
