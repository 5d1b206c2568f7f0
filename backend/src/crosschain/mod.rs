pub mod tracker;

pub use tracker::{CrossChainTracker, TrackerSettings};
