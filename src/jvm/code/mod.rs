//! Decoded method code
//!
//! Method bodies come either from decoding the raw `Code` attribute with [`Code::decode`] or from
//! laying out a list of instructions with [`Code::assemble`]. Either way, instructions are kept
//! in an [`crate::util::OffsetVec`] so that they can be looked up by bytecode offset.

mod code;
mod decode;
mod instructions;

pub use code::*;
pub use instructions::*;
