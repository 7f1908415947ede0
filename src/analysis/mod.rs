//! Analyses over JVM method bodies
//!
//! The typical pipeline for one method is:
//!
//!   1. Build a [`ValueFactory`] and an [`InvocationUnit`] (possibly sharing a [`SideTable`]
//!      with the units of other methods)
//!   2. Run a [`PartialEvaluator`] to get an [`EvaluationTrace`] describing every reachable
//!      instruction
//!   3. Feed the trace to an [`InstructionUsageMarker`] to find out what can be removed
//!
//! Values form a lattice ordered by generality. Merging two states where control flow joins
//! always produces a state at least as general as both of its inputs, which is what makes the
//! evaluation reach a fixed point.

mod errors;
mod evaluator;
mod factory;
pub mod frame;
mod invocation;
mod settings;
mod usage;
pub mod value;

pub use errors::*;
pub use evaluator::*;
pub use factory::*;
pub use frame::{Frame, Slot, Stack, Variables};
pub use invocation::*;
pub use settings::*;
pub use usage::*;
