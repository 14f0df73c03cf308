mod state;
mod store;

pub use state::GlobalModelState;
pub use store::ParameterStore;
