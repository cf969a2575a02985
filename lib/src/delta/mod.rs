//! Structural differences between two sets of classes
//!
//! ### Computing differences
//!
//! Classes are compared by name. A class only in the old set is removed, a class only in the new
//! set is added (and carries its whole definition), and classes in both sets are compared
//! attribute by attribute, then field by field (by name) and method by method (by name and
//! descriptor). Method bodies are compared with [`crate::jvm::code::equivalent_code`], and any
//! change to a body is recorded by carrying the whole new method.
//!
//! ```
//! use jardelta::delta::{compare_class, Difference};
//! use jardelta::jvm::class_file::Version;
//! use jardelta::jvm::model::Class;
//! use jardelta::jvm::ClassAccessFlags;
//!
//! let old = Class {
//!     name: String::from("me/Flag"),
//!     access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//!     version: Version::JAVA8,
//!     super_name: Some(String::from("java/lang/Object")),
//!     interfaces: vec![],
//!     signature: None,
//!     source_file: None,
//!     source_debug: None,
//!     outer_class: None,
//!     outer_method: None,
//!     outer_method_descriptor: None,
//!     nest_host: None,
//!     nest_members: vec![],
//!     inner_classes: vec![],
//!     fields: vec![],
//!     methods: vec![],
//! };
//! let new = Class {
//!     access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE,
//!     ..old.clone()
//! };
//!
//! let differences = compare_class(&old, &new);
//! assert_eq!(differences.len(), 1);
//! assert!(!differences[0].is_runtime_appliable());
//! ```
//!
//! ### Patches
//!
//! A [`Patch`] is a named list of differences. It is stored as gzipped JSON through a
//! [`PatchCodec`], and can be applied onto the old classes to get the new ones.

mod diff;
mod difference;
mod errors;
mod patch;

pub use diff::*;
pub use difference::*;
pub use errors::*;
pub use patch::*;
