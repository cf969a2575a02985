//! Bytecode representation, decoding, and encoding
//!
//! ### Structure
//!
//! Despite being pushed off into [just another method attribute](crate::jvm::class_file::Code),
//! the bytecode is arguably the most important part of the class file - it contains the actual
//! executable [instructions][0]. Here, a method body is a flat sequence of [`Instruction`]s in which
//! bytecode offsets are replaced by [`Label`] markers. Line numbers and stack map frames are also
//! markers in the sequence, so the body can be compared or rewritten without tracking offsets.
//!
//!   - [`decode_code`] turns a `Code` attribute into instructions
//!   - [`encode_code`] lays instructions back out into a `Code` attribute
//!   - [`equivalent_code`] decides if two bodies are the same up to label numbering
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod decode;
mod encode;
mod equivalence;
mod frame;
mod instructions;
mod label;
mod opcodes;

pub use decode::*;
pub use encode::*;
pub use equivalence::*;
pub use frame::*;
pub use instructions::*;
pub use label::*;
pub use opcodes::*;
