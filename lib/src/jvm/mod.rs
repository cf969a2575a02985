//! Read, write, and compare JVM classes
//!
//! ### Simple example
//!
//! Consider the following simple Java class:
//!
//! ```java,ignore,no_run
//! public class Flag {
//!     public static int get() {
//!         return 1;
//!     }
//! }
//! ```
//!
//! An analogous class can be built up, encoded into class file bytes, and read back as follows:
//!
//! ```
//! use jardelta::jvm::class_file::Version;
//! use jardelta::jvm::code::{Instruction, Opcode};
//! use jardelta::jvm::model::{Class, Method, ReaderFlags};
//! use jardelta::jvm::*;
//!
//! # fn generate_class() -> Result<(), Error> {
//! let get = Method {
//!     name: String::from("get"),
//!     descriptor: String::from("()I"),
//!     access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!     signature: None,
//!     exceptions: vec![],
//!     annotation_default: None,
//!     max_stack: 1,
//!     max_locals: 0,
//!     instructions: vec![
//!         Instruction::Simple(Opcode::ICONST_1),
//!         Instruction::Simple(Opcode::IRETURN),
//!     ],
//!     exception_handlers: vec![],
//! };
//!
//! let class = Class {
//!     name: String::from("me/Flag"),
//!     access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//!     version: Version::JAVA8,
//!     super_name: Some(String::from("java/lang/Object")),
//!     interfaces: vec![],
//!     signature: None,
//!     source_file: Some(String::from("Flag.java")),
//!     source_debug: None,
//!     outer_class: None,
//!     outer_method: None,
//!     outer_method_descriptor: None,
//!     nest_host: None,
//!     nest_members: vec![],
//!     inner_classes: vec![],
//!     fields: vec![],
//!     methods: vec![get],
//! };
//!
//! // Encode the class into bytes, then parse it back out
//! let class_bytes: Vec<u8> = class.to_bytes()?;
//! let parsed = Class::parse(&class_bytes, ReaderFlags::empty())?;
//! assert_eq!(parsed, class);
//! # Ok(())
//! # }
//! # generate_class().unwrap();
//! ```

mod access_flags;
pub mod class_file;
pub mod code;
mod errors;
mod java_string;
pub mod model;

pub use access_flags::*;
pub use errors::*;
pub use java_string::*;
