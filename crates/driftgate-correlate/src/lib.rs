pub mod aggregate;
pub mod engine;
pub mod reassess;
pub mod snapshot;
pub mod strategies;

pub use aggregate::{aggregate, EXPLICIT_STRATEGY};
pub use engine::CorrelationEngine;
pub use reassess::reassess;
pub use snapshot::Snapshot;
pub use strategies::CorrelationStrategy;
