//! Partial evaluation and instruction usage analysis for JVM method bodies
//!
//! The crate is split in two halves:
//!
//!   - [`jvm`] is a small read-only model of classes, members, constant pools, and decoded method
//!     code. It is just enough for the analyses to know what each instruction refers to.
//!
//!   - [`analysis`] contains the analyses themselves: a lattice of abstract values, a forward
//!     partial evaluator producing a trace of stack and local variable states for every reachable
//!     instruction, pluggable interprocedural policies, and a backward marker that decides which
//!     instructions and stack entries are still needed.
//!
//! Each analysis handles one method body at a time. Independent methods can be analysed from
//! different threads, sharing only a [`analysis::SideTable`].

pub mod analysis;
pub mod jvm;
pub mod util;
