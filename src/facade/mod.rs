pub mod config;
pub mod container;

pub use config::{ContainerConfig, StoreLocation};
pub use container::Container;
