//! Correlation strategies. Each one inspects the finding snapshot and emits
//! zero or more signals; the engine owns weighting and aggregation.

pub mod code;
pub mod dependency;
pub mod entity;
pub mod infra;
pub mod operation;
pub mod temporal;

use driftgate_core::{Budget, Result, Signal};

use crate::snapshot::Snapshot;

pub trait CorrelationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn default_budget(&self) -> Budget {
        Budget::Low
    }

    fn default_weight(&self) -> f64;

    fn default_enabled(&self) -> bool {
        true
    }

    fn run(&self, snapshot: &Snapshot) -> Result<Vec<Signal>>;
}

/// The built-in strategy set, in a stable order.
pub fn default_strategies() -> Vec<Box<dyn CorrelationStrategy>> {
    vec![
        Box::new(entity::EntityStrategy),
        Box::new(operation::OperationStrategy),
        Box::new(infra::InfrastructureStrategy),
        Box::new(dependency::DependencyStrategy),
        Box::new(temporal::TemporalStrategy),
        Box::new(code::CodeStrategy),
    ]
}

pub use code::CodeStrategy;
pub use dependency::DependencyStrategy;
pub use entity::EntityStrategy;
pub use infra::InfrastructureStrategy;
pub use operation::OperationStrategy;
pub use temporal::TemporalStrategy;
