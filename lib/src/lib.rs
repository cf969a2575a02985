//! Compute, store, and apply structural differences between two versions of a set of JVM classes
//!
//!   - [`jvm`] reads and writes class files, and compares method bodies
//!   - [`delta`] diffs class sets and encodes the differences as patches
//!   - [`archive`] pulls class files out of zip, jar, and jmod archives
//!   - [`scheduler`] runs the parallel parts of loading and diffing

pub mod archive;
pub mod delta;
pub mod jvm;
pub mod scheduler;
mod util;
