//! Semantic representations of classes
//!
//! This is the representation to use while comparing or patching classes. Every constant pool
//! index is resolved (names, descriptors, constants), and method bodies are decoded into
//! [`crate::jvm::code::Instruction`] sequences with labels instead of bytecode offsets.
//!
//!   - __Class__ is represented using [`Class`]
//!   - __Method__ is represented using [`Method`]
//!   - __Field__ is represented using [`Field`]
//!
//! [`Class::parse`] and [`Class::to_bytes`] go to and from the binary class format.

mod annotation;
mod class;
mod constant;
mod field;
mod method;

pub use annotation::*;
pub use class::*;
pub use constant::*;
pub use field::*;
pub use method::*;
