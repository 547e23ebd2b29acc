pub mod load_selector;

pub use load_selector::{LoadBalancingAlgorithm, LoadSelector};
