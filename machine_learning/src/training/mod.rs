mod update;

pub use update::ClientUpdate;
