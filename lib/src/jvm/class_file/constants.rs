use crate::jvm::class_file::{
    read_bytes, Attribute, AttributeLike, BootstrapMethod, Deserialize, Serialize,
};
use crate::jvm::code::{FieldRef, MethodRef};
use crate::jvm::model::{ConstantData, ConstantDynamic, Handle};
use crate::jvm::{Error, JavaString};
use crate::util::{Offset, OffsetVec, Width};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::result::Result;

/// Class file constants pool builder
///
/// The pool is append only and only after the pool is fully built up, it can be consumed into a
/// regular [`OffsetVec`]. Every constant is deduplicated, so asking twice for the same class,
/// string, or member returns the same index. The `BootstrapMethods` table is built up alongside
/// the pool, since `invokedynamic` and dynamic constants refer to it by index.
///
/// The [`ConstantsWriter`] trait exposes inserting model types into the constants pool.
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,
    bootstrap_methods: Vec<BootstrapMethod>,

    classes: HashMap<String, ClassConstantIndex>,
    fieldrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex), FieldRefConstantIndex>,
    methodrefs:
        HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), MethodRefConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, StringConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<u32, ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<u64, ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    utf8s: HashMap<String, Utf8ConstantIndex>,
    ill_formed_utf8s: HashMap<Vec<u16>, Utf8ConstantIndex>,
    method_handles: HashMap<(HandleKind, ConstantIndex), ConstantIndex>,
    method_types: HashMap<Utf8ConstantIndex, ConstantIndex>,
    invoke_dynamics: HashMap<(u16, NameAndTypeConstantIndex), InvokeDynamicConstantIndex>,
    dynamics: HashMap<(u16, NameAndTypeConstantIndex), ConstantIndex>,
    bootstrap_method_indices: HashMap<(ConstantIndex, Vec<ConstantIndex>), u16>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            bootstrap_methods: vec![],
            classes: HashMap::new(),
            fieldrefs: HashMap::new(),
            methodrefs: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
            name_and_types: HashMap::new(),
            utf8s: HashMap::new(),
            ill_formed_utf8s: HashMap::new(),
            method_handles: HashMap::new(),
            method_types: HashMap::new(),
            invoke_dynamics: HashMap::new(),
            dynamics: HashMap::new(),
            bootstrap_method_indices: HashMap::new(),
        }
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        // Compute the offset at which this constant will be inserted
        let offset = self.constants.offset_len().0;

        // Detect if the next constant would overflow the pool
        if offset + constant.width() > u16::MAX as usize {
            return Err(ConstantPoolOverflow {
                constant,
                offset: offset as u16,
            });
        }

        self.constants.push(constant);
        Ok(ConstantIndex(offset as u16))
    }

    /// Take the bootstrap methods table accumulated so far
    ///
    /// The `BootstrapMethods` attribute name is itself a pool constant, so the table is taken
    /// out before the attribute is added and before the pool is consumed.
    pub fn take_bootstrap_methods(&mut self) -> Vec<BootstrapMethod> {
        std::mem::take(&mut self.bootstrap_methods)
    }

    /// Consume the pool into the final vector of constants
    pub fn into_offset_vec(self) -> OffsetVec<Constant> {
        self.constants
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        let cow = utf8.into();

        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            Ok(*idx)
        } else {
            let owned = cow.into_owned();
            let constant = Constant::Utf8(JavaString::from(owned.clone()));
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    /// Get or insert a utf8 constant which may contain unpaired surrogates
    pub fn get_java_utf8(
        &mut self,
        utf8: &JavaString,
    ) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        if let Some(text) = utf8.as_str() {
            return self.get_utf8(text);
        }
        let units = utf8.to_utf16().into_owned();
        if let Some(idx) = self.ill_formed_utf8s.get(&units) {
            Ok(*idx)
        } else {
            let idx = Utf8ConstantIndex(self.push_constant(Constant::Utf8(utf8.clone()))?);
            self.ill_formed_utf8s.insert(units, idx);
            Ok(idx)
        }
    }

    /// Get or insert a string constant from the constant pool
    pub fn get_string(&mut self, string: &str) -> Result<StringConstantIndex, ConstantPoolOverflow> {
        self.get_java_string(&JavaString::from(string))
    }

    pub fn get_java_string(
        &mut self,
        string: &JavaString,
    ) -> Result<StringConstantIndex, ConstantPoolOverflow> {
        let utf8 = self.get_java_utf8(string)?;
        if let Some(idx) = self.strings.get(&utf8) {
            Ok(*idx)
        } else {
            let constant = Constant::String(utf8);
            let idx = StringConstantIndex(self.push_constant(constant)?);
            self.strings.insert(utf8, idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant from the constant pool
    ///
    /// The name is an internal name (eg. `java/lang/Object`) or an array descriptor.
    pub fn get_class(&mut self, name: &str) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.classes.get(name) {
            Ok(*idx)
        } else {
            let name_utf8 = self.get_utf8(name)?;
            let idx = ClassConstantIndex(self.push_constant(Constant::Class(name_utf8))?);
            self.classes.insert(name.to_owned(), idx);
            Ok(idx)
        }
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let name = self.get_utf8(name)?;
        let descriptor = self.get_utf8(descriptor)?;
        let name_and_type_key = (name, descriptor);
        if let Some(idx) = self.name_and_types.get(&name_and_type_key) {
            Ok(*idx)
        } else {
            let constant = Constant::NameAndType { name, descriptor };
            let idx = NameAndTypeConstantIndex(self.push_constant(constant)?);
            self.name_and_types.insert(name_and_type_key, idx);
            Ok(idx)
        }
    }

    pub fn get_integer(&mut self, integer: i32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.integers.get(&integer) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Integer(integer))?;
            self.integers.insert(integer, idx);
            Ok(idx)
        }
    }

    /// Floats are deduplicated on their bits (so `0.0` and `-0.0` stay distinct)
    pub fn get_float(&mut self, float: f32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.floats.get(&float.to_bits()) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Float(float))?;
            self.floats.insert(float.to_bits(), idx);
            Ok(idx)
        }
    }

    pub fn get_long(&mut self, long: i64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.longs.get(&long) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Long(long))?;
            self.longs.insert(long, idx);
            Ok(idx)
        }
    }

    pub fn get_double(&mut self, double: f64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.doubles.get(&double.to_bits()) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Double(double))?;
            self.doubles.insert(double.to_bits(), idx);
            Ok(idx)
        }
    }

    /// Get or insert a method type constant from the constant pool
    pub fn get_method_type(&mut self, descriptor: &str) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let descriptor = self.get_utf8(descriptor)?;
        if let Some(idx) = self.method_types.get(&descriptor) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::MethodType { descriptor })?;
            self.method_types.insert(descriptor, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method handle constant from the constant pool
    fn get_method_handle(
        &mut self,
        handle_kind: HandleKind,
        member: ConstantIndex,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let handle_key = (handle_kind, member);
        if let Some(idx) = self.method_handles.get(&handle_key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodHandle {
                handle_kind,
                member,
            };
            let idx = self.push_constant(constant)?;
            self.method_handles.insert(handle_key, idx);
            Ok(idx)
        }
    }

    /// Get or insert an entry in the bootstrap methods table
    pub fn get_bootstrap_method(
        &mut self,
        bootstrap_method: &Handle,
        bootstrap_arguments: &[ConstantData],
    ) -> Result<u16, ConstantPoolOverflow> {
        let bootstrap_method = bootstrap_method.constant_index(self)?;
        let bootstrap_arguments = bootstrap_arguments
            .iter()
            .map(|argument| argument.constant_index(self))
            .collect::<Result<Vec<ConstantIndex>, _>>()?;

        let key = (bootstrap_method, bootstrap_arguments);
        if let Some(idx) = self.bootstrap_method_indices.get(&key) {
            Ok(*idx)
        } else {
            let idx = self.bootstrap_methods.len() as u16;
            self.bootstrap_methods.push(BootstrapMethod {
                bootstrap_method: key.0,
                bootstrap_arguments: key.1.clone(),
            });
            self.bootstrap_method_indices.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert an invoke dynamic constant from the constant pool
    pub fn get_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    ) -> Result<InvokeDynamicConstantIndex, ConstantPoolOverflow> {
        let indy_key = (bootstrap_method, method_descriptor);
        if let Some(idx) = self.invoke_dynamics.get(&indy_key) {
            Ok(*idx)
        } else {
            let constant = Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            };
            let idx = InvokeDynamicConstantIndex(self.push_constant(constant)?);
            self.invoke_dynamics.insert(indy_key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a dynamically-computed constant from the constant pool
    fn get_dynamic(
        &mut self,
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let key = (bootstrap_method, name_and_type);
        if let Some(idx) = self.dynamics.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            };
            let idx = self.push_constant(constant)?;
            self.dynamics.insert(key, idx);
            Ok(idx)
        }
    }

    /// Add an attribute to the constant pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let mut info = vec![];

        attribute.serialize(&mut info).map_err(Error::IoError)?;

        Ok(Attribute { name_index, info })
    }
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: u16,
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different), and the value may contain unpaired surrogates.
    Utf8(JavaString),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// Depending on the method kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    },

    /// Module (only in `module-info` classes)
    Module(Utf8ConstantIndex),

    /// Package exported or opened by a module (only in `module-info` classes)
    Package(Utf8ConstantIndex),
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_java_string(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(bytes) => {
                8u8.serialize(writer)?;
                bytes.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                17u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                method_descriptor.serialize(writer)?;
            }
            Constant::Module(name) => {
                19u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::Package(name) => {
                20u8.serialize(writer)?;
                name.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for Constant {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(match u8::deserialize(reader)? {
            1 => {
                let len = u16::deserialize(reader)?;
                let bytes = read_bytes(reader, len as usize)?;
                Constant::Utf8(decode_modified_utf8(&bytes)?)
            }
            3 => Constant::Integer(i32::deserialize(reader)?),
            4 => Constant::Float(f32::deserialize(reader)?),
            5 => Constant::Long(i64::deserialize(reader)?),
            6 => Constant::Double(f64::deserialize(reader)?),
            7 => Constant::Class(Utf8ConstantIndex::deserialize(reader)?),
            8 => Constant::String(Utf8ConstantIndex::deserialize(reader)?),
            9 => Constant::FieldRef(
                ClassConstantIndex::deserialize(reader)?,
                NameAndTypeConstantIndex::deserialize(reader)?,
            ),
            tag @ (10 | 11) => Constant::MethodRef {
                class: ClassConstantIndex::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: Utf8ConstantIndex::deserialize(reader)?,
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            15 => Constant::MethodHandle {
                handle_kind: HandleKind::deserialize(reader)?,
                member: ConstantIndex::deserialize(reader)?,
            },
            16 => Constant::MethodType {
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            17 => Constant::Dynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: u16::deserialize(reader)?,
                method_descriptor: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            19 => Constant::Module(Utf8ConstantIndex::deserialize(reader)?),
            20 => Constant::Package(Utf8ConstantIndex::deserialize(reader)?),
            other => return Err(Error::UnknownConstantTag(other)),
        })
    }
}

/// The pool is prefixed by its count, which is one more than the largest index (indices start at 1)
impl Serialize for OffsetVec<Constant> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.offset_len().0 as u16).serialize(writer)?;
        for (_, _, constant) in self {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for OffsetVec<Constant> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let count = u16::deserialize(reader)? as usize;
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < count {
            constants.push(Constant::deserialize(reader)?);
        }
        Ok(constants)
    }
}

/// Typed lookups into a constant pool that was read from a class file
impl OffsetVec<Constant> {
    pub fn get_constant(&self, index: ConstantIndex) -> Result<&Constant, Error> {
        self.get_offset(Offset(index.0 as usize))
            .ok()
            .ok_or(Error::BadConstantIndex {
                index: index.0,
                expected: "pool",
            })
    }

    pub fn get_java_utf8(&self, index: Utf8ConstantIndex) -> Result<&JavaString, Error> {
        match self.get_constant(index.0) {
            Ok(Constant::Utf8(string)) => Ok(string),
            _ => Err(Error::BadConstantIndex {
                index: (index.0).0,
                expected: "Utf8",
            }),
        }
    }

    /// Get a UTF-8 constant used as a name or descriptor, which must be valid unicode
    pub fn get_utf8(&self, index: Utf8ConstantIndex) -> Result<&str, Error> {
        let string = self.get_java_utf8(index)?;
        string
            .as_str()
            .ok_or_else(|| Error::InvalidModifiedUtf8(encode_java_string(string)))
    }

    /// Get a UTF-8 constant, unless the index is zero
    pub fn get_optional_utf8(&self, index: Utf8ConstantIndex) -> Result<Option<&str>, Error> {
        if index.0 == ConstantIndex::ZERO {
            Ok(None)
        } else {
            self.get_utf8(index).map(Some)
        }
    }

    pub fn get_class_name(&self, index: ClassConstantIndex) -> Result<&str, Error> {
        match self.get_constant(index.0) {
            Ok(Constant::Class(name)) => self.get_utf8(*name),
            _ => Err(Error::BadConstantIndex {
                index: (index.0).0,
                expected: "Class",
            }),
        }
    }

    /// Get a class name, unless the index is zero (eg. the super class of `java/lang/Object`)
    pub fn get_optional_class_name(&self, index: ClassConstantIndex) -> Result<Option<&str>, Error> {
        if index.0 == ConstantIndex::ZERO {
            Ok(None)
        } else {
            self.get_class_name(index).map(Some)
        }
    }

    pub fn get_name_and_type(&self, index: NameAndTypeConstantIndex) -> Result<(&str, &str), Error> {
        match self.get_constant(index.0) {
            Ok(Constant::NameAndType { name, descriptor }) => {
                Ok((self.get_utf8(*name)?, self.get_utf8(*descriptor)?))
            }
            _ => Err(Error::BadConstantIndex {
                index: (index.0).0,
                expected: "NameAndType",
            }),
        }
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    encode_utf16_units(string.encode_utf16())
}

/// Encode a string which may contain unpaired surrogates
pub fn encode_java_string(string: &JavaString) -> Vec<u8> {
    match string.as_str() {
        Some(text) => encode_modified_utf8(text),
        None => encode_utf16_units(string.to_utf16().iter().copied()),
    }
}

/// Each UTF-16 code unit gets encoded separately, so supplementary characters come out as their
/// two surrogates (the main divergence from unicode)
fn encode_utf16_units(units: impl Iterator<Item = u16>) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for unit in units {
        match unit {
            // Handle the exception for how `\u{0000}` is represented
            0x0001..=0x007F => buffer.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                buffer.push((unit >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
            }
            _ => {
                buffer.push((unit >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((unit >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_java_string`]
///
/// The bytes are decoded into UTF-16 code units first, so that surrogate pairs recombine into
/// supplementary characters. Unpaired surrogates (which Java strings tolerate) are kept.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<JavaString, Error> {
    let invalid = || Error::InvalidModifiedUtf8(bytes.to_vec());
    let continuation = |idx: usize| -> Result<u16, Error> {
        match bytes.get(idx) {
            Some(byte) if byte & 0b1100_0000 == 0b1000_0000 => Ok((byte & 0x3F) as u16),
            _ => Err(invalid()),
        }
    };

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        match byte >> 4 {
            0..=7 => {
                units.push(byte as u16);
                idx += 1;
            }
            0b1100 | 0b1101 => {
                units.push(((byte & 0x1F) as u16) << 6 | continuation(idx + 1)?);
                idx += 2;
            }
            0b1110 => {
                units.push(
                    ((byte & 0x0F) as u16) << 12
                        | continuation(idx + 1)? << 6
                        | continuation(idx + 2)?,
                );
                idx += 3;
            }
            _ => return Err(invalid()),
        }
    }

    Ok(JavaString::from_utf16(units))
}

#[cfg(test)]
mod modified_utf8_tests {
    use super::*;

    #[test]
    fn containing_null_byte() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
        assert_eq!(decode_modified_utf8(&[97, 192, 128, 97]).unwrap(), "a\x00a");
    }

    #[test]
    fn simple_ascii() {
        assert_eq!(encode_modified_utf8("foo"), vec![102, 111, 111]);
        assert_eq!(decode_modified_utf8(b"java/lang/Object").unwrap(), "java/lang/Object");
    }

    #[test]
    fn two_and_three_byte_encodings() {
        let bytes = vec![
            196, 132, 199, 141, 199, 158, 199, 160, 199, 186, 200, 128, 200, 130, 200, 166, 200,
            186, 211, 144, 211, 146,
        ];
        assert_eq!(encode_modified_utf8("ĄǍǞǠǺȀȂȦȺӐӒ"), bytes);
        assert_eq!(decode_modified_utf8(&bytes).unwrap(), "ĄǍǞǠǺȀȂȦȺӐӒ");

        let text = "ऄअॲঅਅઅଅஅఅಅഅะະ༁ཨ";
        assert_eq!(decode_modified_utf8(&encode_modified_utf8(text)).unwrap(), text);
    }

    #[test]
    fn supplementary_characters() {
        let bytes = vec![
            237, 160, 128, 237, 176, 128, 237, 172, 191, 237, 191, 191, 237, 175, 191, 237, 191,
            191,
        ];
        assert_eq!(encode_modified_utf8("\u{10000}\u{dffff}\u{10FFFF}"), bytes);
        assert_eq!(
            decode_modified_utf8(&bytes).unwrap(),
            "\u{10000}\u{dffff}\u{10FFFF}"
        );
    }

    #[test]
    fn malformed() {
        // Truncated two byte sequence
        assert!(decode_modified_utf8(&[0xC3]).is_err());

        // Four byte sequences are not part of the format
        assert!(decode_modified_utf8(&[0xF0, 0x9F, 0x98, 0x80]).is_err());
    }

    #[test]
    fn unpaired_surrogates() {
        // Lone high surrogate, then a low surrogate followed by a regular character
        for bytes in [vec![0xED, 0xA0, 0x80], vec![0x61, 0xED, 0xB0, 0x80, 0x62]] {
            let string = decode_modified_utf8(&bytes).unwrap();
            assert_eq!(string.as_str(), None);
            assert_eq!(encode_java_string(&string), bytes);
        }
        assert_eq!(
            decode_modified_utf8(&[0xED, 0xA0, 0x80]).unwrap().to_utf16().as_ref(),
            &[0xD800]
        );
    }

    #[test]
    fn unpaired_surrogate_constant() {
        let mut pool = ConstantsPool::new();
        let lone = JavaString::from_utf16(vec![0xD800]);
        let string = pool.get_java_string(&lone).unwrap();
        assert_eq!(pool.get_java_string(&lone).unwrap(), string);
        let name = pool.get_utf8("name").unwrap();

        let mut bytes = vec![];
        pool.into_offset_vec().serialize(&mut bytes).unwrap();
        assert_eq!(&bytes[..8], &[0x00, 0x04, 0x01, 0x00, 0x03, 0xED, 0xA0, 0x80]);

        let read = OffsetVec::<Constant>::deserialize(&mut bytes.as_slice()).unwrap();
        let mut written = vec![];
        read.serialize(&mut written).unwrap();
        assert_eq!(written, bytes);

        // Fine as a string, but not as a name
        let utf8 = match read.get_constant(string.into()) {
            Ok(Constant::String(utf8)) => *utf8,
            other => panic!("unexpected constant {:?}", other),
        };
        assert_eq!(read.get_java_utf8(utf8).unwrap(), &lone);
        assert!(matches!(
            read.get_utf8(utf8),
            Err(Error::InvalidModifiedUtf8(bytes)) if bytes == [0xED, 0xA0, 0x80]
        ));
        assert_eq!(read.get_utf8(name).unwrap(), "name");
    }
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. Quoting
/// the JVM specification:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
/// >
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

impl ConstantIndex {
    /// Placeholder index for optional constants (eg. the catch-all exception handler)
    pub const ZERO: ConstantIndex = ConstantIndex(0);
}

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ConstantIndex(u16::deserialize(reader)?))
    }
}

/// Index of a constant which is statically known to be of a certain type
macro_rules! typed_constant_index {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
            pub struct $name(pub ConstantIndex);

            impl $name {
                pub const ZERO: $name = $name(ConstantIndex::ZERO);
            }

            impl From<$name> for ConstantIndex {
                fn from(index: $name) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $name {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }

            impl Deserialize for $name {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                    Ok($name(ConstantIndex::deserialize(reader)?))
                }
            }
        )*
    };
}

typed_constant_index!(
    Utf8ConstantIndex,
    StringConstantIndex,
    NameAndTypeConstantIndex,
    ClassConstantIndex,
    FieldRefConstantIndex,
    MethodRefConstantIndex,
    InvokeDynamicConstantIndex,
);

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl HandleKind {
    /// Does the handle point to a field (as opposed to a method)?
    pub fn is_field(&self) -> bool {
        matches!(
            self,
            HandleKind::GetField | HandleKind::GetStatic | HandleKind::PutField | HandleKind::PutStatic
        )
    }
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let byte: u8 = match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        };
        byte.serialize(writer)
    }
}

impl Deserialize for HandleKind {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(match u8::deserialize(reader)? {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            other => return Err(Error::UnknownHandleKind(other)),
        })
    }
}

pub trait ConstantsWriter<Index = ConstantIndex> {
    /// Get or insert a constant into the constant pool and return the associated index
    fn constant_index(&self, constants_pool: &mut ConstantsPool)
        -> Result<Index, ConstantPoolOverflow>;
}

/// Write a `CONSTANT_Fieldref_info`
impl ConstantsWriter<FieldRefConstantIndex> for FieldRef {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<FieldRefConstantIndex, ConstantPoolOverflow> {
        let class_idx = constants.get_class(&self.owner)?;
        let name_and_type_idx = constants.get_name_and_type(&self.name, &self.descriptor)?;
        let key = (class_idx, name_and_type_idx);
        if let Some(idx) = constants.fieldrefs.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::FieldRef(class_idx, name_and_type_idx);
            let idx = FieldRefConstantIndex(constants.push_constant(constant)?);
            constants.fieldrefs.insert(key, idx);
            Ok(idx)
        }
    }
}

/// Write a `CONSTANT_Methodref_info` or `CONSTANT_InterfaceMethodref_info`
impl ConstantsWriter<MethodRefConstantIndex> for MethodRef {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        let class_idx = constants.get_class(&self.owner)?;
        let name_and_type_idx = constants.get_name_and_type(&self.name, &self.descriptor)?;
        let key = (class_idx, name_and_type_idx, self.is_interface);
        if let Some(idx) = constants.methodrefs.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodRef {
                class: class_idx,
                name_and_type: name_and_type_idx,
                is_interface: self.is_interface,
            };
            let idx = MethodRefConstantIndex(constants.push_constant(constant)?);
            constants.methodrefs.insert(key, idx);
            Ok(idx)
        }
    }
}

/// Write a `CONSTANT_MethodHandle_info`
impl ConstantsWriter<ConstantIndex> for Handle {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let member: ConstantIndex = if self.kind.is_field() {
            FieldRef {
                owner: self.owner.clone(),
                name: self.name.clone(),
                descriptor: self.descriptor.clone(),
            }
            .constant_index(constants)?
            .into()
        } else {
            MethodRef {
                owner: self.owner.clone(),
                name: self.name.clone(),
                descriptor: self.descriptor.clone(),
                is_interface: self.is_interface,
            }
            .constant_index(constants)?
            .into()
        };
        constants.get_method_handle(self.kind, member)
    }
}

/// Write a `CONSTANT_Dynamic_info` (and the bootstrap method it uses)
impl ConstantsWriter<ConstantIndex> for ConstantDynamic {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let bootstrap_method =
            constants.get_bootstrap_method(&self.bootstrap_method, &self.bootstrap_arguments)?;
        let name_and_type = constants.get_name_and_type(&self.name, &self.descriptor)?;
        constants.get_dynamic(bootstrap_method, name_and_type)
    }
}

/// Write a constant which can be loaded up using `ldc`, `ldc_w`, or `ldc2_w`
impl ConstantsWriter<ConstantIndex> for ConstantData {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        match self {
            ConstantData::String(string) => Ok(constants.get_java_string(string)?.into()),
            ConstantData::Class(class) => Ok(constants.get_class(class)?.into()),
            ConstantData::Integer(integer) => constants.get_integer(*integer),
            ConstantData::Long(long) => constants.get_long(*long),
            ConstantData::Float(float) => constants.get_float(*float),
            ConstantData::Double(double) => constants.get_double(*double),
            ConstantData::MethodType(descriptor) => constants.get_method_type(descriptor),
            ConstantData::MethodHandle(handle) => handle.constant_index(constants),
            ConstantData::Dynamic(dynamic) => dynamic.constant_index(constants),
        }
    }
}

#[cfg(test)]
mod pool_tests {
    use super::*;

    #[test]
    fn deduplicates_constants() {
        let mut pool = ConstantsPool::new();
        let object = pool.get_class("java/lang/Object").unwrap();
        let string = pool.get_string("java/lang/Object").unwrap();
        assert_eq!(pool.get_class("java/lang/Object").unwrap(), object);
        assert_eq!(pool.get_string("java/lang/Object").unwrap(), string);

        // The UTF-8 entry is shared between the class and the string
        let constants = pool.into_offset_vec();
        assert_eq!(constants.len(), 3);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantsPool::new();
        assert_eq!(pool.get_long(7).unwrap(), ConstantIndex(1));
        assert_eq!(pool.get_integer(7).unwrap(), ConstantIndex(3));
        assert_eq!(pool.get_double(-0.0).unwrap(), ConstantIndex(4));
        assert_eq!(pool.get_double(0.0).unwrap(), ConstantIndex(6));
    }

    #[test]
    fn read_back_written_pool() {
        let mut pool = ConstantsPool::new();
        let class = pool.get_class("me/Example").unwrap();
        let long = pool.get_long(1 << 40).unwrap();
        let name_and_type = pool.get_name_and_type("run", "()V").unwrap();
        let constants = pool.into_offset_vec();

        let mut bytes = vec![];
        constants.serialize(&mut bytes).unwrap();
        let read = OffsetVec::<Constant>::deserialize(&mut bytes.as_slice()).unwrap();

        assert_eq!(read.get_class_name(class).unwrap(), "me/Example");
        assert!(matches!(read.get_constant(long), Ok(Constant::Long(1099511627776))));
        assert_eq!(read.get_name_and_type(name_and_type).unwrap(), ("run", "()V"));

        // Unusable slot after the long, and out of bounds index
        assert!(read.get_constant(ConstantIndex(long.0 + 1)).is_err());
        assert!(read.get_constant(ConstantIndex(100)).is_err());
        assert!(read
            .get_class_name(ClassConstantIndex(ConstantIndex::ZERO))
            .is_err());
        assert_eq!(
            read.get_optional_class_name(ClassConstantIndex::ZERO).unwrap(),
            None
        );
    }
}
