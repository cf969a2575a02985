use crate::jvm::class_file;
use crate::jvm::class_file::{
    decode_modified_utf8, encode_modified_utf8, BootstrapMethods, ClassConstantIndex, ClassFile,
    ConstantsPool, ConstantsReader, Deserialize, EnclosingMethod, InnerClasses, NestHost,
    NestMembers, NameAndTypeConstantIndex, Serialize, Signature, SourceDebugExtension, SourceFile,
    Utf8ConstantIndex, Version,
};
use crate::jvm::model::{Field, Method};
use crate::jvm::{ClassAccessFlags, Error, InnerClassAccessFlags};
use bitflags::bitflags;

bitflags! {
    /// What the class reader leaves out of the model
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ReaderFlags: u8 {
        /// Drop `LineNumberTable` entries (local variable tables are always dropped)
        const SKIP_DEBUG = 0x01;

        /// Drop `StackMapTable` entries
        const SKIP_FRAMES = 0x02;
    }
}

/// Semantic representation of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    /// Internal name (eg. `java/util/Map$Entry`)
    pub name: String,
    pub access_flags: ClassAccessFlags,
    pub version: Version,

    /// Super class (only `java/lang/Object` and `module-info` have none)
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,

    /// Generic class signature
    ///
    /// [Format](https://docs.oracle.com/javase/specs/jvms/se11/html/jvms-4.html#jvms-4.7.9.1)
    pub signature: Option<String>,
    pub source_file: Option<String>,
    pub source_debug: Option<String>,

    /// Class enclosing a local or anonymous class
    pub outer_class: Option<String>,

    /// Method enclosing a local or anonymous class
    pub outer_method: Option<String>,
    pub outer_method_descriptor: Option<String>,

    pub nest_host: Option<String>,
    pub nest_members: Vec<String>,
    pub inner_classes: Vec<InnerClass>,

    /// Fields, with unique names
    pub fields: Vec<Field>,

    /// Methods, with unique name and descriptor pairs
    pub methods: Vec<Method>,
}

/// Entry of the `InnerClasses` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClass {
    pub name: String,

    /// `None` for local and anonymous classes
    pub outer_name: Option<String>,

    /// `None` for anonymous classes
    pub inner_name: Option<String>,
    pub access_flags: InnerClassAccessFlags,
}

impl Class {
    /// Parse a class from the bytes of a class file
    pub fn parse(bytes: &[u8], flags: ReaderFlags) -> Result<Class, Error> {
        let class_file = ClassFile::deserialize(&mut &bytes[..])?;
        Class::from_class_file(&class_file, flags)
    }

    /// Serialize the class into the bytes of a class file
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let class_file = self.to_class_file()?;
        let mut bytes = vec![];
        class_file.serialize(&mut bytes)?;
        Ok(bytes)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|field| field.name == name)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| method.key() == (name, descriptor))
    }

    pub fn method_mut(&mut self, name: &str, descriptor: &str) -> Option<&mut Method> {
        self.methods
            .iter_mut()
            .find(|method| method.key() == (name, descriptor))
    }

    pub fn from_class_file(class_file: &ClassFile, flags: ReaderFlags) -> Result<Class, Error> {
        // Bootstrap methods are needed to resolve `invokedynamic` and dynamic constants, so they
        // get read before anything else.
        let mut bootstrap_methods = vec![];
        for attribute in &class_file.attributes {
            if class_file.constants.get_utf8(attribute.name_index)? == "BootstrapMethods" {
                bootstrap_methods = attribute.decode::<BootstrapMethods>()?.0;
            }
        }
        let constants = ConstantsReader::new(&class_file.constants, &bootstrap_methods);

        let mut class = Class {
            name: constants.class_name(class_file.this_class)?,
            access_flags: class_file.access_flags,
            version: class_file.version,
            super_name: constants.optional_class_name(class_file.super_class)?,
            interfaces: class_file
                .interfaces
                .iter()
                .map(|interface| constants.class_name(*interface))
                .collect::<Result<_, _>>()?,
            signature: None,
            source_file: None,
            source_debug: None,
            outer_class: None,
            outer_method: None,
            outer_method_descriptor: None,
            nest_host: None,
            nest_members: vec![],
            inner_classes: vec![],
            fields: class_file
                .fields
                .iter()
                .map(|field| Field::read(field, &constants))
                .collect::<Result<_, _>>()?,
            methods: class_file
                .methods
                .iter()
                .map(|method| Method::read(method, &constants, flags))
                .collect::<Result<_, _>>()?,
        };

        for attribute in &class_file.attributes {
            match constants.utf8(attribute.name_index)?.as_str() {
                "Signature" => {
                    let Signature(index) = attribute.decode::<Signature>()?;
                    class.signature = Some(constants.utf8(index)?);
                }
                "SourceFile" => {
                    let SourceFile(index) = attribute.decode::<SourceFile>()?;
                    class.source_file = Some(constants.utf8(index)?);
                }
                "SourceDebugExtension" => {
                    let SourceDebugExtension(bytes) = attribute.decode::<SourceDebugExtension>()?;
                    let source_debug = decode_modified_utf8(&bytes)?
                        .into_string()
                        .map_err(|_| Error::InvalidModifiedUtf8(bytes.clone()))?;
                    class.source_debug = Some(source_debug);
                }
                "EnclosingMethod" => {
                    let enclosing = attribute.decode::<EnclosingMethod>()?;
                    class.outer_class = Some(constants.class_name(enclosing.class)?);
                    if enclosing.method != NameAndTypeConstantIndex::ZERO {
                        let (name, descriptor) = constants.name_and_type(enclosing.method)?;
                        class.outer_method = Some(name);
                        class.outer_method_descriptor = Some(descriptor);
                    }
                }
                "NestHost" => {
                    let NestHost(index) = attribute.decode::<NestHost>()?;
                    class.nest_host = Some(constants.class_name(index)?);
                }
                "NestMembers" => {
                    let NestMembers(members) = attribute.decode::<NestMembers>()?;
                    class.nest_members = members
                        .into_iter()
                        .map(|member| constants.class_name(member))
                        .collect::<Result<_, _>>()?;
                }
                "InnerClasses" => {
                    let InnerClasses(inner_classes) = attribute.decode::<InnerClasses>()?;
                    class.inner_classes = inner_classes
                        .into_iter()
                        .map(|inner_class| -> Result<InnerClass, Error> {
                            Ok(InnerClass {
                                name: constants.class_name(inner_class.inner_class)?,
                                outer_name: constants
                                    .optional_class_name(inner_class.outer_class)?,
                                inner_name: constants.optional_utf8(inner_class.inner_name)?,
                                access_flags: inner_class.access_flags,
                            })
                        })
                        .collect::<Result<_, _>>()?;
                }
                _ => (),
            }
        }

        Ok(class)
    }

    /// Build up a fresh constant pool and the class file referring to it
    pub fn to_class_file(&self) -> Result<ClassFile, Error> {
        let mut constants = ConstantsPool::new();

        let this_class = constants.get_class(&self.name)?;
        let super_class = match &self.super_name {
            Some(super_name) => constants.get_class(super_name)?,
            None => ClassConstantIndex::ZERO,
        };
        let interfaces = self
            .interfaces
            .iter()
            .map(|interface| constants.get_class(interface))
            .collect::<Result<Vec<_>, _>>()?;
        let fields = self
            .fields
            .iter()
            .map(|field| field.write(&mut constants))
            .collect::<Result<Vec<_>, Error>>()?;
        let methods = self
            .methods
            .iter()
            .map(|method| method.write(&mut constants))
            .collect::<Result<Vec<_>, Error>>()?;

        let mut attributes = vec![];
        if let Some(source_file) = &self.source_file {
            let index = constants.get_utf8(source_file.as_str())?;
            attributes.push(constants.get_attribute(SourceFile(index))?);
        }
        if let Some(source_debug) = &self.source_debug {
            let bytes = encode_modified_utf8(source_debug);
            attributes.push(constants.get_attribute(SourceDebugExtension(bytes))?);
        }
        if let Some(signature) = &self.signature {
            let index = constants.get_utf8(signature.as_str())?;
            attributes.push(constants.get_attribute(Signature(index))?);
        }
        if let Some(outer_class) = &self.outer_class {
            let class = constants.get_class(outer_class)?;
            let method = match (&self.outer_method, &self.outer_method_descriptor) {
                (Some(name), Some(descriptor)) => constants.get_name_and_type(name, descriptor)?,
                _ => NameAndTypeConstantIndex::ZERO,
            };
            attributes.push(constants.get_attribute(EnclosingMethod { class, method })?);
        }
        if let Some(nest_host) = &self.nest_host {
            let index = constants.get_class(nest_host)?;
            attributes.push(constants.get_attribute(NestHost(index))?);
        }
        if !self.nest_members.is_empty() {
            let members = self
                .nest_members
                .iter()
                .map(|member| constants.get_class(member))
                .collect::<Result<Vec<_>, _>>()?;
            attributes.push(constants.get_attribute(NestMembers(members))?);
        }
        if !self.inner_classes.is_empty() {
            let inner_classes = self
                .inner_classes
                .iter()
                .map(|inner_class| -> Result<class_file::InnerClass, Error> {
                    Ok(class_file::InnerClass {
                        inner_class: constants.get_class(&inner_class.name)?,
                        outer_class: match &inner_class.outer_name {
                            Some(outer) => constants.get_class(outer)?,
                            None => ClassConstantIndex::ZERO,
                        },
                        inner_name: match &inner_class.inner_name {
                            Some(inner) => constants.get_utf8(inner.as_str())?,
                            None => Utf8ConstantIndex::ZERO,
                        },
                        access_flags: inner_class.access_flags,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            attributes.push(constants.get_attribute(InnerClasses(inner_classes))?);
        }

        // Last, since nothing may add bootstrap methods after the table is taken
        let bootstrap_methods = constants.take_bootstrap_methods();
        if !bootstrap_methods.is_empty() {
            attributes.push(constants.get_attribute(BootstrapMethods(bootstrap_methods))?);
        }

        Ok(ClassFile {
            version: self.version,
            constants: constants.into_offset_vec(),
            access_flags: self.access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::class_file::HandleKind;
    use crate::jvm::code::{
        ExceptionHandler, Frame, InvokeDynamic, Label, LabelGenerator, MethodRef, Opcode,
        SequentialLabels, VerificationType,
    };
    use crate::jvm::code::Instruction as Insn;
    use crate::jvm::model::{ConstantData, ElementValue, Handle};
    use crate::jvm::{FieldAccessFlags, MethodAccessFlags};

    fn empty_method(name: &str, descriptor: &str) -> Method {
        Method {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            access_flags: MethodAccessFlags::PUBLIC,
            signature: None,
            exceptions: vec![],
            annotation_default: None,
            max_stack: 0,
            max_locals: 0,
            instructions: vec![],
            exception_handlers: vec![],
        }
    }

    fn sample_class() -> Class {
        let mut labels = SequentialLabels::default();
        let start: Label = labels.fresh_label();
        let end = labels.fresh_label();
        let handler = labels.fresh_label();
        let else_branch = labels.fresh_label();

        let lambda = Handle {
            kind: HandleKind::InvokeStatic,
            owner: "java/lang/invoke/LambdaMetafactory".to_owned(),
            name: "metafactory".to_owned(),
            descriptor: "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;".to_owned(),
            is_interface: false,
        };

        let run = Method {
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            exceptions: vec!["java/io/IOException".to_owned()],
            max_stack: 2,
            max_locals: 1,
            instructions: vec![
                Insn::Label(start),
                Insn::LineNumber { line: 7, start },
                Insn::Var(Opcode::ILOAD, 0),
                Insn::Jump(Opcode::IFEQ, else_branch),
                Insn::InvokeDynamic(InvokeDynamic {
                    name: "run".to_owned(),
                    descriptor: "()Ljava/lang/Runnable;".to_owned(),
                    bootstrap_method: lambda,
                    bootstrap_arguments: vec![ConstantData::MethodType("()V".to_owned())],
                }),
                Insn::Simple(Opcode::POP),
                Insn::Label(end),
                Insn::Simple(Opcode::RETURN),
                Insn::Label(handler),
                Insn::Frame(Frame::SameLocalsOneStack(VerificationType::Object(
                    "java/lang/Throwable".to_owned(),
                ))),
                Insn::Simple(Opcode::ATHROW),
                Insn::Label(else_branch),
                Insn::LineNumber {
                    line: 9,
                    start: else_branch,
                },
                Insn::Frame(Frame::Same),
                Insn::Ldc(ConstantData::Long(1 << 33)),
                Insn::Simple(Opcode::POP2),
                Insn::Method(
                    Opcode::INVOKESTATIC,
                    MethodRef {
                        owner: "me/Sample".to_owned(),
                        name: "tick".to_owned(),
                        descriptor: "()V".to_owned(),
                        is_interface: false,
                    },
                ),
                Insn::Simple(Opcode::RETURN),
            ],
            exception_handlers: vec![ExceptionHandler {
                start,
                end,
                handler,
                catch_type: Some("java/lang/Throwable".to_owned()),
            }],
            ..empty_method("run", "(Z)V")
        };

        Class {
            name: "me/Sample".to_owned(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            version: Version::JAVA11,
            super_name: Some("java/lang/Object".to_owned()),
            interfaces: vec!["java/io/Serializable".to_owned()],
            signature: None,
            source_file: Some("Sample.java".to_owned()),
            source_debug: Some("SMAP\n\u{0}".to_owned()),
            outer_class: None,
            outer_method: None,
            outer_method_descriptor: None,
            nest_host: None,
            nest_members: vec!["me/Sample$Inner".to_owned()],
            inner_classes: vec![InnerClass {
                name: "me/Sample$Inner".to_owned(),
                outer_name: Some("me/Sample".to_owned()),
                inner_name: Some("Inner".to_owned()),
                access_flags: InnerClassAccessFlags::STATIC,
            }],
            fields: vec![Field {
                name: "LIMIT".to_owned(),
                descriptor: "F".to_owned(),
                access_flags: FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
                signature: None,
                value: Some(ConstantData::Float(-0.0)),
            }],
            methods: vec![
                run,
                Method {
                    access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
                    annotation_default: Some(ElementValue::Array(vec![ElementValue::Int(3)])),
                    ..empty_method("limits", "()[I")
                },
            ],
        }
    }

    #[test]
    fn parse_what_was_written() {
        let class = sample_class();
        let bytes = class.to_bytes().unwrap();
        let read = Class::parse(&bytes, ReaderFlags::empty()).unwrap();
        assert_eq!(read.to_bytes().unwrap(), bytes);

        assert_eq!(read.name, "me/Sample");
        assert_eq!(read.source_debug, class.source_debug);
        assert_eq!(read.inner_classes, class.inner_classes);
        assert_eq!(read.fields, class.fields);
        assert_eq!(read.method("limits", "()[I"), class.method("limits", "()[I"));

        let run = read.method("run", "(Z)V").unwrap();
        assert_eq!(run.exceptions, vec!["java/io/IOException".to_owned()]);
        assert_eq!(run.exception_handlers.len(), 1);
        assert_eq!(
            run.instructions.len(),
            class.method("run", "(Z)V").unwrap().instructions.len()
        );
    }

    #[test]
    fn reader_flags_drop_markers() {
        let bytes = sample_class().to_bytes().unwrap();
        let read = Class::parse(&bytes, ReaderFlags::SKIP_DEBUG | ReaderFlags::SKIP_FRAMES).unwrap();
        let run = read.method("run", "(Z)V").unwrap();
        assert!(!run
            .instructions
            .iter()
            .any(|insn| matches!(insn, Insn::LineNumber { .. } | Insn::Frame(_))));
    }

    #[test]
    fn bootstrap_methods_are_shared() {
        let mut class = sample_class();
        let run = class.methods[0].clone();
        class.methods.push(Method {
            name: "again".to_owned(),
            ..run
        });

        let class_file = class.to_class_file().unwrap();
        let reader = ConstantsReader::new(&class_file.constants, &[]);
        let bootstrap_methods = class_file
            .attributes
            .iter()
            .find(|attribute| reader.utf8(attribute.name_index).unwrap() == "BootstrapMethods")
            .unwrap()
            .decode::<BootstrapMethods>()
            .unwrap();
        assert_eq!(bootstrap_methods.0.len(), 1);
    }
}
