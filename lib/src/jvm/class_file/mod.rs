//! Raw representation of the binary class file format
//!
//! Everything here maps one-to-one onto the structures in the class file: names, descriptors, and
//! constants are indices into the constant pool, and attributes other than the ones being looked
//! at are left as opaque bytes. See [`crate::jvm::model`] for the resolved representation.

mod attribute;
mod class;
mod constants;
mod constants_reader;
mod field;
mod method;
mod serialize;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use constants_reader::*;
pub use field::*;
pub use method::*;
pub use serialize::*;
pub use version::*;
