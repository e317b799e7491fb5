pub mod context;
pub mod execution;
pub mod executors;
pub mod json_writer;
pub mod operation;
pub mod plan;
pub mod response;
pub mod schema;
pub mod utils;

#[cfg(test)]
mod tests;

pub use context::{ErrorSettings, FusionExecutionContext};
pub use execution::{error::ExecutionError, plan::execute_operation};
pub use executors::map::SubgraphExecutorMap;
pub use operation::Operation;
pub use plan::QueryPlan;
