//! Graph admission: structural validation and compilation into an executable
//! plan.

pub mod compiler;
pub mod validation;

pub use compiler::{CompileError, ExecutablePlan, FlowCompiler, PlannedNode};
pub use validation::{ValidationError, validate};
