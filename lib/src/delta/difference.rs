use crate::delta::Error;
use crate::jvm;
use crate::jvm::class_file::Version;
use crate::jvm::model::{Class, ConstantData, ElementValue, Field, Method};
use crate::jvm::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
use std::collections::HashMap;
use std::fmt;

/// Classes keyed by their internal name
pub type ClassMap = HashMap<String, Class>;

/// Class only present in the new set of classes
///
/// The class model leaves out attributes it does not interpret (annotations, records, permitted
/// subclasses, ...), so the class file the class was read from is kept alongside it and is what
/// gets written out. Equality only looks at the model.
#[derive(Debug, Clone)]
pub struct AddedClass {
    pub class: Class,

    /// Bytes of the class file `class` was parsed from, if any
    pub class_file: Option<Vec<u8>>,
}

impl AddedClass {
    pub fn new(class: Class) -> AddedClass {
        AddedClass {
            class,
            class_file: None,
        }
    }

    pub fn with_class_file(class: Class, class_file: Vec<u8>) -> AddedClass {
        AddedClass {
            class,
            class_file: Some(class_file),
        }
    }

    /// Bytes of the class, falling back to serializing the model
    pub fn to_bytes(&self) -> Result<Vec<u8>, jvm::Error> {
        match &self.class_file {
            Some(bytes) => Ok(bytes.clone()),
            None => self.class.to_bytes(),
        }
    }
}

impl PartialEq for AddedClass {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class
    }
}

impl Eq for AddedClass {}

/// One structural change between an old and a new version of a class
///
/// Every variant carries just enough to re-apply the change onto the old class. Fields are
/// identified by name and methods by name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difference {
    ClassAdded(Box<AddedClass>),
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

    MethodAdded {
        class: String,
        method: Method,
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

    /// Body of the method changed, so the whole new method is carried
    MethodInstructionsChanged {
        class: String,
        method: Method,
    },
}

/// Changed subset of the class attributes that are compared one by one
///
/// `None` means the attribute did not change. `Some(None)` means the attribute was removed.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ClassMetadataChange {
    pub class: String,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "attribute_change")]
    pub outer_class: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "attribute_change")]
    pub nest_host: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "attribute_change")]
    pub outer_method: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "attribute_change")]
    pub outer_method_descriptor: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "attribute_change")]
    pub signature: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "attribute_change")]
    pub source_debug: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "attribute_change")]
    pub source_file: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "attribute_change")]
    pub super_name: Option<Option<String>>,
}

/// Present attributes are changes, even when the new value is `null`
mod attribute_change {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Option<String>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(new_value) => new_value.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<String>>, D::Error> {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

fn changed(old: &Option<String>, new: &Option<String>) -> Option<Option<String>> {
    if old == new {
        None
    } else {
        Some(new.clone())
    }
}

fn overwrite(target: &mut Option<String>, change: &Option<Option<String>>) {
    if let Some(new_value) = change {
        *target = new_value.clone();
    }
}

impl ClassMetadataChange {
    /// Collect the attributes that differ, or `None` if they are all the same
    pub fn between(old: &Class, new: &Class) -> Option<ClassMetadataChange> {
        let change = ClassMetadataChange {
            class: old.name.clone(),
            outer_class: changed(&old.outer_class, &new.outer_class),
            nest_host: changed(&old.nest_host, &new.nest_host),
            outer_method: changed(&old.outer_method, &new.outer_method),
            outer_method_descriptor: changed(
                &old.outer_method_descriptor,
                &new.outer_method_descriptor,
            ),
            signature: changed(&old.signature, &new.signature),
            source_debug: changed(&old.source_debug, &new.source_debug),
            source_file: changed(&old.source_file, &new.source_file),
            super_name: changed(&old.super_name, &new.super_name),
        };
        if change.is_empty() {
            None
        } else {
            Some(change)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outer_class.is_none()
            && self.nest_host.is_none()
            && self.outer_method.is_none()
            && self.outer_method_descriptor.is_none()
            && self.signature.is_none()
            && self.source_debug.is_none()
            && self.source_file.is_none()
            && self.super_name.is_none()
    }

    pub fn changes_super_class(&self) -> bool {
        self.super_name.is_some()
    }

    /// Overwrite the changed attributes, leaving the others untouched
    pub fn apply_to(&self, class: &mut Class) {
        overwrite(&mut class.outer_class, &self.outer_class);
        overwrite(&mut class.nest_host, &self.nest_host);
        overwrite(&mut class.outer_method, &self.outer_method);
        overwrite(
            &mut class.outer_method_descriptor,
            &self.outer_method_descriptor,
        );
        overwrite(&mut class.signature, &self.signature);
        overwrite(&mut class.source_debug, &self.source_debug);
        overwrite(&mut class.source_file, &self.source_file);
        overwrite(&mut class.super_name, &self.super_name);
    }
}

impl Difference {
    /// Internal name of the class the difference is about
    pub fn class_name(&self) -> &str {
        match self {
            Difference::ClassAdded(added) => &added.class.name,
            Difference::ClassMetadataChanged(change) => &change.class,
            Difference::ClassRemoved { class }
            | Difference::ClassAccessChanged { class, .. }
            | Difference::ClassVersionChanged { class, .. }
            | Difference::FieldAdded { class, .. }
            | Difference::FieldRemoved { class, .. }
            | Difference::FieldAccessChanged { class, .. }
            | Difference::FieldDescriptorChanged { class, .. }
            | Difference::FieldSignatureChanged { class, .. }
            | Difference::FieldValueChanged { class, .. }
            | Difference::MethodAdded { class, .. }
            | Difference::MethodRemoved { class, .. }
            | Difference::MethodAccessChanged { class, .. }
            | Difference::MethodSignatureChanged { class, .. }
            | Difference::MethodExceptionsChanged { class, .. }
            | Difference::MethodAnnotationDefaultChanged { class, .. }
            | Difference::MethodMaxsChanged { class, .. }
            | Difference::MethodInstructionsChanged { class, .. } => class,
        }
    }

    /// Can the difference be applied to a class that is already loaded in a running JVM?
    ///
    /// A class cannot switch between being an interface, an enum, or a plain class, nor change
    /// its super class, once it is loaded.
    pub fn is_runtime_appliable(&self) -> bool {
        match self {
            Difference::ClassAccessChanged { old, new, .. } => {
                let kind = ClassAccessFlags::INTERFACE | ClassAccessFlags::ENUM;
                old.intersection(kind) == new.intersection(kind)
            }
            Difference::ClassMetadataChanged(change) => !change.changes_super_class(),
            _ => true,
        }
    }

    /// Does applying the difference at runtime need the class bytes to be shipped separately?
    ///
    /// This is the case for new classes, which must be defined rather than redefined.
    pub fn requires_side_channel(&self) -> bool {
        matches!(self, Difference::ClassAdded(_))
    }

    /// Apply the difference to the classes
    ///
    /// Every class targeted by a difference other than [`Difference::ClassAdded`] must already
    /// be in the map.
    pub fn apply(&self, classes: &mut ClassMap) -> Result<(), Error> {
        match self {
            Difference::ClassAdded(added) => {
                classes.insert(added.class.name.clone(), added.class.clone());
            }
            Difference::ClassRemoved { class } => {
                classes
                    .remove(class)
                    .ok_or_else(|| Error::MissingClass(class.clone()))?;
            }
            Difference::ClassAccessChanged { class, new, .. } => {
                target_class(classes, class)?.access_flags = *new;
            }
            Difference::ClassMetadataChanged(change) => {
                change.apply_to(target_class(classes, &change.class)?);
            }
            Difference::ClassVersionChanged { class, version } => {
                target_class(classes, class)?.version = *version;
            }

            Difference::FieldAdded { class, field } => {
                let target = target_class(classes, class)?;
                match target.field_mut(&field.name) {
                    Some(existing) => *existing = field.clone(),
                    None => target.fields.push(field.clone()),
                }
            }
            Difference::FieldRemoved { class, name } => {
                let target = target_class(classes, class)?;
                let position = target
                    .fields
                    .iter()
                    .position(|field| &field.name == name)
                    .ok_or_else(|| missing_field(class, name))?;
                target.fields.remove(position);
            }
            Difference::FieldAccessChanged {
                class, name, new, ..
            } => {
                target_field(classes, class, name)?.access_flags = *new;
            }
            Difference::FieldDescriptorChanged {
                class,
                name,
                descriptor,
            } => {
                target_field(classes, class, name)?.descriptor = descriptor.clone();
            }
            Difference::FieldSignatureChanged {
                class,
                name,
                signature,
            } => {
                target_field(classes, class, name)?.signature = signature.clone();
            }
            Difference::FieldValueChanged { class, name, value } => {
                target_field(classes, class, name)?.value = value.clone();
            }

            Difference::MethodAdded { class, method } => {
                let target = target_class(classes, class)?;
                match target.method_mut(&method.name, &method.descriptor) {
                    Some(existing) => *existing = method.clone(),
                    None => target.methods.push(method.clone()),
                }
            }
            Difference::MethodRemoved {
                class,
                name,
                descriptor,
            } => {
                let target = target_class(classes, class)?;
                let position = target
                    .methods
                    .iter()
                    .position(|method| method.key() == (name.as_str(), descriptor.as_str()))
                    .ok_or_else(|| missing_method(class, name, descriptor))?;
                target.methods.remove(position);
            }
            Difference::MethodAccessChanged {
                class,
                name,
                descriptor,
                new,
                ..
            } => {
                target_method(classes, class, name, descriptor)?.access_flags = *new;
            }
            Difference::MethodSignatureChanged {
                class,
                name,
                descriptor,
                signature,
            } => {
                target_method(classes, class, name, descriptor)?.signature = signature.clone();
            }
            Difference::MethodExceptionsChanged {
                class,
                name,
                descriptor,
                exceptions,
            } => {
                target_method(classes, class, name, descriptor)?.exceptions = exceptions.clone();
            }
            Difference::MethodAnnotationDefaultChanged {
                class,
                name,
                descriptor,
                value,
            } => {
                target_method(classes, class, name, descriptor)?.annotation_default =
                    value.clone();
            }
            Difference::MethodMaxsChanged {
                class,
                name,
                descriptor,
                max_stack,
                max_locals,
            } => {
                let target = target_method(classes, class, name, descriptor)?;
                target.max_stack = *max_stack;
                target.max_locals = *max_locals;
            }
            Difference::MethodInstructionsChanged { class, method } => {
                let target = target_method(classes, class, &method.name, &method.descriptor)?;
                target.instructions = method.instructions.clone();
                target.exception_handlers = method.exception_handlers.clone();
            }
        }
        Ok(())
    }
}

fn target_class<'a>(classes: &'a mut ClassMap, class: &str) -> Result<&'a mut Class, Error> {
    classes
        .get_mut(class)
        .ok_or_else(|| Error::MissingClass(String::from(class)))
}

fn target_field<'a>(
    classes: &'a mut ClassMap,
    class: &str,
    name: &str,
) -> Result<&'a mut Field, Error> {
    target_class(classes, class)?
        .field_mut(name)
        .ok_or_else(|| missing_field(class, name))
}

fn target_method<'a>(
    classes: &'a mut ClassMap,
    class: &str,
    name: &str,
    descriptor: &str,
) -> Result<&'a mut Method, Error> {
    target_class(classes, class)?
        .method_mut(name, descriptor)
        .ok_or_else(|| missing_method(class, name, descriptor))
}

fn missing_field(class: &str, name: &str) -> Error {
    Error::MissingMember {
        class: String::from(class),
        member: format!("field {}", name),
    }
}

fn missing_method(class: &str, name: &str, descriptor: &str) -> Error {
    Error::MissingMember {
        class: String::from(class),
        member: format!("method {}{}", name, descriptor),
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difference::ClassAdded(added) => write!(f, "added class {}", added.class.name),
            Difference::ClassRemoved { class } => write!(f, "removed class {}", class),
            Difference::ClassAccessChanged { class, old, new } => write!(
                f,
                "access of class {} changed from 0x{:04x} to 0x{:04x}",
                class,
                old.bits(),
                new.bits()
            ),
            Difference::ClassMetadataChanged(change) if change.changes_super_class() => write!(
                f,
                "metadata of class {} changed (including its super class)",
                change.class
            ),
            Difference::ClassMetadataChanged(change) => {
                write!(f, "metadata of class {} changed", change.class)
            }
            Difference::ClassVersionChanged { class, version } => {
                write!(f, "version of class {} changed to {}", class, version)
            }
            Difference::FieldAdded { class, field } => {
                write!(f, "added field {}.{}", class, field.name)
            }
            Difference::FieldRemoved { class, name } => {
                write!(f, "removed field {}.{}", class, name)
            }
            Difference::FieldAccessChanged {
                class,
                name,
                old,
                new,
            } => write!(
                f,
                "access of field {}.{} changed from 0x{:04x} to 0x{:04x}",
                class,
                name,
                old.bits(),
                new.bits()
            ),
            Difference::FieldDescriptorChanged {
                class,
                name,
                descriptor,
            } => write!(
                f,
                "descriptor of field {}.{} changed to {}",
                class, name, descriptor
            ),
            Difference::FieldSignatureChanged { class, name, .. } => {
                write!(f, "signature of field {}.{} changed", class, name)
            }
            Difference::FieldValueChanged { class, name, .. } => {
                write!(f, "value of field {}.{} changed", class, name)
            }
            Difference::MethodAdded { class, method } => {
                write!(f, "added method {}#{}{}", class, method.name, method.descriptor)
            }
            Difference::MethodRemoved {
                class,
                name,
                descriptor,
            } => write!(f, "removed method {}#{}{}", class, name, descriptor),
            Difference::MethodAccessChanged {
                class,
                name,
                descriptor,
                old,
                new,
            } => write!(
                f,
                "access of method {}#{}{} changed from 0x{:04x} to 0x{:04x}",
                class,
                name,
                descriptor,
                old.bits(),
                new.bits()
            ),
            Difference::MethodSignatureChanged {
                class,
                name,
                descriptor,
                ..
            } => write!(f, "signature of method {}#{}{} changed", class, name, descriptor),
            Difference::MethodExceptionsChanged {
                class,
                name,
                descriptor,
                ..
            } => write!(f, "exceptions of method {}#{}{} changed", class, name, descriptor),
            Difference::MethodAnnotationDefaultChanged {
                class,
                name,
                descriptor,
                ..
            } => write!(
                f,
                "annotation default of method {}#{}{} changed",
                class, name, descriptor
            ),
            Difference::MethodMaxsChanged {
                class,
                name,
                descriptor,
                max_stack,
                max_locals,
            } => write!(
                f,
                "maxs of method {}#{}{} changed to stack {} and locals {}",
                class, name, descriptor, max_stack, max_locals
            ),
            Difference::MethodInstructionsChanged { class, method } => write!(
                f,
                "instructions of method {}#{}{} changed",
                class, method.name, method.descriptor
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::code::{Instruction, Opcode};

    fn class(name: &str) -> Class {
        Class {
            name: String::from(name),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            version: Version::JAVA8,
            super_name: Some(String::from("java/lang/Object")),
            interfaces: vec![],
            signature: None,
            source_file: Some(String::from("A.java")),
            source_debug: None,
            outer_class: None,
            outer_method: None,
            outer_method_descriptor: None,
            nest_host: None,
            nest_members: vec![],
            inner_classes: vec![],
            fields: vec![],
            methods: vec![],
        }
    }

    fn method(name: &str, instructions: Vec<Instruction>) -> Method {
        Method {
            name: String::from(name),
            descriptor: String::from("()V"),
            access_flags: MethodAccessFlags::PUBLIC,
            signature: None,
            exceptions: vec![],
            annotation_default: None,
            max_stack: 0,
            max_locals: 1,
            instructions,
            exception_handlers: vec![],
        }
    }

    fn class_map(classes: Vec<Class>) -> ClassMap {
        classes
            .into_iter()
            .map(|class| (class.name.clone(), class))
            .collect()
    }

    #[test]
    fn access_classification() {
        let public = ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER;
        let access = |old, new| Difference::ClassAccessChanged {
            class: String::from("A"),
            old,
            new,
        };

        assert!(access(public, ClassAccessFlags::SUPER).is_runtime_appliable());
        assert!(access(public, public | ClassAccessFlags::FINAL).is_runtime_appliable());
        assert!(!access(public | ClassAccessFlags::INTERFACE, public).is_runtime_appliable());
        assert!(!access(public, public | ClassAccessFlags::ENUM).is_runtime_appliable());
    }

    #[test]
    fn metadata_classification() {
        let mut old = class("A");
        let mut new = old.clone();
        new.source_file = Some(String::from("B.java"));
        let change = ClassMetadataChange::between(&old, &new).unwrap();
        assert!(Difference::ClassMetadataChanged(change).is_runtime_appliable());

        new.super_name = Some(String::from("java/lang/Thread"));
        let change = ClassMetadataChange::between(&old, &new).unwrap();
        assert!(!Difference::ClassMetadataChanged(change).is_runtime_appliable());

        old.source_file = None;
        new = old.clone();
        assert_eq!(ClassMetadataChange::between(&old, &new), None);
    }

    #[test]
    fn only_added_classes_need_side_channel() {
        let added = Difference::ClassAdded(Box::new(AddedClass::new(class("A"))));
        let removed = Difference::ClassRemoved {
            class: String::from("A"),
        };
        assert!(added.requires_side_channel());
        assert!(added.is_runtime_appliable());
        assert!(!removed.requires_side_channel());
    }

    #[test]
    fn added_class_prefers_its_class_file() {
        let model = class("A");
        let built = AddedClass::new(model.clone());
        assert_eq!(built.to_bytes().unwrap(), model.to_bytes().unwrap());

        let original = vec![0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 52];
        let read = AddedClass::with_class_file(model, original.clone());
        assert_eq!(read.to_bytes().unwrap(), original);
        assert_eq!(read, built);
    }

    #[test]
    fn metadata_only_overwrites_changes() {
        let old = class("A");
        let mut new = class("A");
        new.signature = Some(String::from("Ljava/lang/Object;"));
        new.source_file = None;
        let change = ClassMetadataChange::between(&old, &new).unwrap();
        assert_eq!(change.source_file, Some(None));
        assert_eq!(change.super_name, None);

        let mut live = old.clone();
        live.super_name = Some(String::from("untouched"));
        change.apply_to(&mut live);
        assert_eq!(live.signature, new.signature);
        assert_eq!(live.source_file, None);
        assert_eq!(live.super_name, Some(String::from("untouched")));
    }

    #[test]
    fn apply_to_members() {
        let mut a = class("A");
        a.methods.push(method("f", vec![Instruction::Simple(Opcode::RETURN)]));
        let mut classes = class_map(vec![a]);

        let body = vec![
            Instruction::Simple(Opcode::ICONST_1),
            Instruction::Simple(Opcode::POP),
            Instruction::Simple(Opcode::RETURN),
        ];
        Difference::MethodInstructionsChanged {
            class: String::from("A"),
            method: method("f", body.clone()),
        }
        .apply(&mut classes)
        .unwrap();
        Difference::MethodAdded {
            class: String::from("A"),
            method: method("g", vec![Instruction::Simple(Opcode::RETURN)]),
        }
        .apply(&mut classes)
        .unwrap();
        Difference::MethodRemoved {
            class: String::from("A"),
            name: String::from("f"),
            descriptor: String::from("()V"),
        }
        .apply(&mut classes)
        .unwrap();

        let a = &classes["A"];
        assert!(a.method("f", "()V").is_none());
        assert!(a.method("g", "()V").is_some());
    }

    #[test]
    fn apply_to_missing_targets() {
        let mut classes = class_map(vec![class("A")]);

        let missing_class = Difference::ClassVersionChanged {
            class: String::from("B"),
            version: Version::JAVA11,
        };
        assert!(matches!(
            missing_class.apply(&mut classes),
            Err(Error::MissingClass(name)) if name == "B"
        ));

        let missing_field = Difference::FieldRemoved {
            class: String::from("A"),
            name: String::from("x"),
        };
        let err = missing_field.apply(&mut classes).unwrap_err();
        assert_eq!(err.kind(), crate::delta::ErrorKind::Verification);

        let missing_method = Difference::MethodMaxsChanged {
            class: String::from("A"),
            name: String::from("f"),
            descriptor: String::from("()V"),
            max_stack: 1,
            max_locals: 1,
        };
        assert!(matches!(
            missing_method.apply(&mut classes),
            Err(Error::MissingMember { .. })
        ));
    }
}
