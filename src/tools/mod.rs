pub mod actions;
pub mod executor;
pub mod registry;
pub mod schema;

pub use executor::ActionExecutor;
pub use registry::{Action, ActionKind, ActionRegistry, ActionResult};
pub use schema::{parse_args, schema_of, validate_args, ArgsValidator};
