use crate::delta::{AddedClass, ClassMap, ClassMetadataChange, Difference, Error};
use crate::jvm::class_file::Version;
use crate::jvm::model::{Class, ConstantData, ElementValue, Field, Method, ReaderFlags};
use crate::jvm::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Named, ordered list of differences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub name: String,

    /// Version of the document format the patch was read from or will be written as
    pub format_version: u32,
    pub differences: Vec<Difference>,
}

impl Patch {
    pub fn new(name: impl Into<String>, differences: Vec<Difference>) -> Patch {
        Patch {
            name: name.into(),
            format_version: PatchCodec::FORMAT_VERSION,
            differences,
        }
    }

    /// Apply every difference in order
    pub fn apply(&self, classes: &mut ClassMap) -> Result<(), Error> {
        for difference in &self.differences {
            difference.apply(classes)?;
        }
        Ok(())
    }

    /// Differences which cannot be applied to already loaded classes
    pub fn not_runtime_appliable(&self) -> impl Iterator<Item = &Difference> {
        self.differences
            .iter()
            .filter(|difference| !difference.is_runtime_appliable())
    }

    /// Remove the added classes from the patch, returning them
    ///
    /// A patch applied at runtime leaves added classes to be defined through a side channel.
    pub fn take_added_classes(&mut self) -> Vec<AddedClass> {
        let (added, kept): (Vec<Difference>, Vec<Difference>) = self
            .differences
            .drain(..)
            .partition(Difference::requires_side_channel);
        self.differences = kept;
        added
            .into_iter()
            .filter_map(|difference| match difference {
                Difference::ClassAdded(added) => Some(*added),
                _ => None,
            })
            .collect()
    }

    /// Write the patch as a gzipped JSON document
    pub fn write_to<W: Write>(&self, codec: &PatchCodec, writer: W) -> Result<(), Error> {
        let document = Document {
            patch_name: self.name.clone(),
            format_version: self.format_version,
            differences: self
                .differences
                .iter()
                .map(|difference| WireDifference::encode(codec, difference))
                .collect::<Result<_, _>>()?,
        };

        let mut encoder = GzEncoder::new(writer, codec.compression);
        serde_json::to_writer(&mut encoder, &document)?;
        encoder.finish()?.flush()?;

        log::info!(
            "Wrote patch {:?} (format version {}) with {} differences",
            self.name,
            self.format_version,
            self.differences.len()
        );
        Ok(())
    }

    /// Read a patch written by [`Patch::write_to`]
    pub fn read_from<R: Read>(codec: &PatchCodec, reader: R) -> Result<Patch, Error> {
        let document: Document = serde_json::from_reader(GzDecoder::new(reader))?;
        if document.format_version > PatchCodec::FORMAT_VERSION {
            log::warn!(
                "Patch {:?} has format version {}, newer than {}",
                document.patch_name,
                document.format_version,
                PatchCodec::FORMAT_VERSION
            );
        }

        let differences = document
            .differences
            .into_iter()
            .map(|difference| difference.decode(codec))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Read patch {:?} (format version {}) with {} differences",
            document.patch_name,
            document.format_version,
            differences.len()
        );
        Ok(Patch {
            name: document.patch_name,
            format_version: document.format_version,
            differences,
        })
    }
}

/// Settings for encoding and decoding patches
///
/// Classes and methods do not fit in the JSON document directly, so they are embedded as
/// lower-case hex strings of class file bytes. A method is wrapped in a minimal class holding
/// only that method.
#[derive(Debug, Copy, Clone)]
pub struct PatchCodec {
    /// Compression level of the gzip envelope
    pub compression: Compression,

    /// Flags for reading embedded class and method payloads
    pub reader_flags: ReaderFlags,
}

impl Default for PatchCodec {
    fn default() -> PatchCodec {
        PatchCodec {
            compression: Compression::default(),
            reader_flags: ReaderFlags::empty(),
        }
    }
}

impl PatchCodec {
    /// Version of the document format written
    pub const FORMAT_VERSION: u32 = 1;

    /// Name of the class wrapping method payloads
    pub const METHOD_CONTAINER: &'static str = "jardelta/MethodContainer";

    pub fn encode_class(&self, class: &Class) -> Result<String, Error> {
        Ok(hex::encode(class.to_bytes()?))
    }

    pub fn decode_class(&self, payload: &str) -> Result<Class, Error> {
        let bytes = hex::decode(payload)?;
        Ok(Class::parse(&bytes, self.reader_flags)?)
    }

    pub fn encode_method(&self, method: &Method) -> Result<String, Error> {
        let container = Class {
            name: String::from(PatchCodec::METHOD_CONTAINER),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            version: Version::JAVA8,
            super_name: Some(String::from("java/lang/Object")),
            interfaces: vec![],
            signature: None,
            source_file: None,
            source_debug: None,
            outer_class: None,
            outer_method: None,
            outer_method_descriptor: None,
            nest_host: None,
            nest_members: vec![],
            inner_classes: vec![],
            fields: vec![],
            methods: vec![method.clone()],
        };
        self.encode_class(&container)
    }

    /// Decode a method payload, which must hold exactly one method
    pub fn decode_method(&self, payload: &str) -> Result<Method, Error> {
        let mut container = self.decode_class(payload)?;
        if container.methods.len() != 1 {
            return Err(Error::BadMethodContainer(container.methods.len()));
        }
        Ok(container.methods.remove(0))
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Document {
    patch_name: String,
    format_version: u32,
    differences: Vec<WireDifference>,
}

/// Form of [`Difference`] in the patch document
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireDifference {
    ClassAdded {
        class: String,
    },
    ClassRemoved {
        class: String,
    },
    ClassAccessChanged {
        class: String,
        old: ClassAccessFlags,
        new: ClassAccessFlags,
    },
    ClassMetadataChanged(ClassMetadataChange),
    ClassVersionChanged {
        class: String,
        version: Version,
    },
    FieldAdded {
        class: String,
        field: Field,
    },
    FieldRemoved {
        class: String,
        name: String,
    },
    FieldAccessChanged {
        class: String,
        name: String,
        old: FieldAccessFlags,
        new: FieldAccessFlags,
    },
    FieldDescriptorChanged {
        class: String,
        name: String,
        descriptor: String,
    },
    FieldSignatureChanged {
        class: String,
        name: String,
        signature: Option<String>,
    },
    FieldValueChanged {
        class: String,
        name: String,
        value: Option<ConstantData>,
    },

    /// `method` is the hex encoded method container
    MethodAdded {
        class: String,
        method: String,
    },
    MethodRemoved {
        class: String,
        name: String,
        descriptor: String,
    },
    MethodAccessChanged {
        class: String,
        name: String,
        descriptor: String,
        old: MethodAccessFlags,
        new: MethodAccessFlags,
    },
    MethodSignatureChanged {
        class: String,
        name: String,
        descriptor: String,
        signature: Option<String>,
    },
    MethodExceptionsChanged {
        class: String,
        name: String,
        descriptor: String,
        exceptions: Vec<String>,
    },
    MethodAnnotationDefaultChanged {
        class: String,
        name: String,
        descriptor: String,
        value: Option<ElementValue>,
    },
    MethodMaxsChanged {
        class: String,
        name: String,
        descriptor: String,
        max_stack: u16,
        max_locals: u16,
    },

    /// `method` is the hex encoded method container
    MethodInstructionsChanged {
        class: String,
        method: String,
    },
}

impl WireDifference {
    fn encode(codec: &PatchCodec, difference: &Difference) -> Result<WireDifference, Error> {
        let wire = match difference.clone() {
            Difference::ClassAdded(added) => WireDifference::ClassAdded {
                class: hex::encode(added.to_bytes()?),
            },
            Difference::ClassRemoved { class } => WireDifference::ClassRemoved { class },
            Difference::ClassAccessChanged { class, old, new } => {
                WireDifference::ClassAccessChanged { class, old, new }
            }
            Difference::ClassMetadataChanged(change) => {
                WireDifference::ClassMetadataChanged(change)
            }
            Difference::ClassVersionChanged { class, version } => {
                WireDifference::ClassVersionChanged { class, version }
            }
            Difference::FieldAdded { class, field } => WireDifference::FieldAdded { class, field },
            Difference::FieldRemoved { class, name } => WireDifference::FieldRemoved { class, name },
            Difference::FieldAccessChanged {
                class,
                name,
                old,
                new,
            } => WireDifference::FieldAccessChanged {
                class,
                name,
                old,
                new,
            },
            Difference::FieldDescriptorChanged {
                class,
                name,
                descriptor,
            } => WireDifference::FieldDescriptorChanged {
                class,
                name,
                descriptor,
            },
            Difference::FieldSignatureChanged {
                class,
                name,
                signature,
            } => WireDifference::FieldSignatureChanged {
                class,
                name,
                signature,
            },
            Difference::FieldValueChanged { class, name, value } => {
                WireDifference::FieldValueChanged { class, name, value }
            }
            Difference::MethodAdded { class, method } => WireDifference::MethodAdded {
                class,
                method: codec.encode_method(&method)?,
            },
            Difference::MethodRemoved {
                class,
                name,
                descriptor,
            } => WireDifference::MethodRemoved {
                class,
                name,
                descriptor,
            },
            Difference::MethodAccessChanged {
                class,
                name,
                descriptor,
                old,
                new,
            } => WireDifference::MethodAccessChanged {
                class,
                name,
                descriptor,
                old,
                new,
            },
            Difference::MethodSignatureChanged {
                class,
                name,
                descriptor,
                signature,
            } => WireDifference::MethodSignatureChanged {
                class,
                name,
                descriptor,
                signature,
            },
            Difference::MethodExceptionsChanged {
                class,
                name,
                descriptor,
                exceptions,
            } => WireDifference::MethodExceptionsChanged {
                class,
                name,
                descriptor,
                exceptions,
            },
            Difference::MethodAnnotationDefaultChanged {
                class,
                name,
                descriptor,
                value,
            } => WireDifference::MethodAnnotationDefaultChanged {
                class,
                name,
                descriptor,
                value,
            },
            Difference::MethodMaxsChanged {
                class,
                name,
                descriptor,
                max_stack,
                max_locals,
            } => WireDifference::MethodMaxsChanged {
                class,
                name,
                descriptor,
                max_stack,
                max_locals,
            },
            Difference::MethodInstructionsChanged { class, method } => {
                WireDifference::MethodInstructionsChanged {
                    class,
                    method: codec.encode_method(&method)?,
                }
            }
        };
        Ok(wire)
    }

    fn decode(self, codec: &PatchCodec) -> Result<Difference, Error> {
        let difference = match self {
            WireDifference::ClassAdded { class } => {
                let bytes = hex::decode(class)?;
                let class = Class::parse(&bytes, codec.reader_flags)?;
                Difference::ClassAdded(Box::new(AddedClass::with_class_file(class, bytes)))
            }
            WireDifference::ClassRemoved { class } => Difference::ClassRemoved { class },
            WireDifference::ClassAccessChanged { class, old, new } => {
                Difference::ClassAccessChanged { class, old, new }
            }
            WireDifference::ClassMetadataChanged(change) => {
                Difference::ClassMetadataChanged(change)
            }
            WireDifference::ClassVersionChanged { class, version } => {
                Difference::ClassVersionChanged { class, version }
            }
            WireDifference::FieldAdded { class, field } => Difference::FieldAdded { class, field },
            WireDifference::FieldRemoved { class, name } => Difference::FieldRemoved { class, name },
            WireDifference::FieldAccessChanged {
                class,
                name,
                old,
                new,
            } => Difference::FieldAccessChanged {
                class,
                name,
                old,
                new,
            },
            WireDifference::FieldDescriptorChanged {
                class,
                name,
                descriptor,
            } => Difference::FieldDescriptorChanged {
                class,
                name,
                descriptor,
            },
            WireDifference::FieldSignatureChanged {
                class,
                name,
                signature,
            } => Difference::FieldSignatureChanged {
                class,
                name,
                signature,
            },
            WireDifference::FieldValueChanged { class, name, value } => {
                Difference::FieldValueChanged { class, name, value }
            }
            WireDifference::MethodAdded { class, method } => Difference::MethodAdded {
                class,
                method: codec.decode_method(&method)?,
            },
            WireDifference::MethodRemoved {
                class,
                name,
                descriptor,
            } => Difference::MethodRemoved {
                class,
                name,
                descriptor,
            },
            WireDifference::MethodAccessChanged {
                class,
                name,
                descriptor,
                old,
                new,
            } => Difference::MethodAccessChanged {
                class,
                name,
                descriptor,
                old,
                new,
            },
            WireDifference::MethodSignatureChanged {
                class,
                name,
                descriptor,
                signature,
            } => Difference::MethodSignatureChanged {
                class,
                name,
                descriptor,
                signature,
            },
            WireDifference::MethodExceptionsChanged {
                class,
                name,
                descriptor,
                exceptions,
            } => Difference::MethodExceptionsChanged {
                class,
                name,
                descriptor,
                exceptions,
            },
            WireDifference::MethodAnnotationDefaultChanged {
                class,
                name,
                descriptor,
                value,
            } => Difference::MethodAnnotationDefaultChanged {
                class,
                name,
                descriptor,
                value,
            },
            WireDifference::MethodMaxsChanged {
                class,
                name,
                descriptor,
                max_stack,
                max_locals,
            } => Difference::MethodMaxsChanged {
                class,
                name,
                descriptor,
                max_stack,
                max_locals,
            },
            WireDifference::MethodInstructionsChanged { class, method } => {
                Difference::MethodInstructionsChanged {
                    class,
                    method: codec.decode_method(&method)?,
                }
            }
        };
        Ok(difference)
    }
}
