mod linear;
pub mod loss;

pub use linear::{BIAS, LinearRegression, SAMPLES_SEEN, WEIGHTS};
