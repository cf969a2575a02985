use crate::archive;
use crate::delta::{AddedClass, ClassMap, ClassMetadataChange, Difference, Error};
use crate::jvm::code::equivalent_code;
use crate::jvm::model::{Class, Field, Method, ReaderFlags};
use crate::scheduler::{self, Tick};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Debug information is irrelevant to equivalence, so it is not even loaded
const LOAD_FLAGS: ReaderFlags = ReaderFlags::SKIP_DEBUG;

/// Workers only ever hold these locks for a push or pop, so a poisoned lock still has
/// consistent contents
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Compute the differences between the classes of two archives
pub fn calculate_difference(
    threads: usize,
    old_archive: impl AsRef<Path>,
    new_archive: impl AsRef<Path>,
) -> Result<Vec<Difference>, Error> {
    let start = Instant::now();
    log::info!(
        "Calculating difference from {} to {}",
        old_archive.as_ref().display(),
        new_archive.as_ref().display()
    );

    let old_snapshot = load_archive(threads, old_archive.as_ref())?;
    let new_snapshot = load_archive(threads, new_archive.as_ref())?;
    let differences = diff_snapshots(threads, &old_snapshot, &new_snapshot);

    log::info!(
        "Found {} differences in {}ms",
        differences.len(),
        start.elapsed().as_millis()
    );
    Ok(differences)
}

fn load_archive(threads: usize, path: &Path) -> Result<Snapshot, Error> {
    let entries = archive::read_class_entries(path)?;
    load_snapshot(threads, entries.into_iter().map(|entry| entry.bytes).collect())
}

/// Classes keyed by name, along with the class files they were parsed from
#[derive(Debug, Default)]
pub struct Snapshot {
    pub classes: ClassMap,
    class_files: HashMap<String, Vec<u8>>,
}

impl Snapshot {
    /// Class file the named class was parsed from
    pub fn class_file(&self, name: &str) -> Option<&[u8]> {
        self.class_files.get(name).map(Vec::as_slice)
    }
}

/// Parse class files in parallel, keying the classes by name
///
/// If two buffers hold classes with the same name, only one of them is kept.
pub fn load_classes(threads: usize, buffers: Vec<Vec<u8>>) -> Result<ClassMap, Error> {
    load_snapshot(threads, buffers).map(|snapshot| snapshot.classes)
}

/// Like [`load_classes`], but the class files are kept too
pub fn load_snapshot(threads: usize, buffers: Vec<Vec<u8>>) -> Result<Snapshot, Error> {
    let start = Instant::now();
    let buffer_count = buffers.len();
    let pending = Mutex::new(buffers);
    let loaded: Mutex<Snapshot> = Mutex::new(Snapshot {
        classes: HashMap::with_capacity(buffer_count),
        class_files: HashMap::with_capacity(buffer_count),
    });
    let failure: Mutex<Option<Error>> = Mutex::new(None);

    scheduler::run(threads, || {
        let mut local = Snapshot::default();
        loop {
            let next = lock(&pending).pop();
            let Some(bytes) = next else { break };

            match Class::parse(&bytes, LOAD_FLAGS) {
                Ok(class) => {
                    local.class_files.insert(class.name.clone(), bytes);
                    local.classes.insert(class.name.clone(), class);
                }
                Err(err) => {
                    // Nothing else is worth loading after a failure
                    lock(&pending).clear();
                    lock(&failure).get_or_insert(Error::from(err));
                    break;
                }
            }
        }
        let mut loaded = lock(&loaded);
        loaded.classes.extend(local.classes);
        loaded.class_files.extend(local.class_files);
        Tick::Done
    });

    if let Some(err) = lock(&failure).take() {
        return Err(err);
    }
    let loaded = loaded.into_inner().unwrap_or_else(PoisonError::into_inner);
    log::debug!(
        "Loaded {} classes from {} buffers in {}ms",
        loaded.classes.len(),
        buffer_count,
        start.elapsed().as_millis()
    );
    Ok(loaded)
}

/// Compute the differences between two snapshots
///
/// Same as [`diff_classes`], except that added classes carry the class file they were read from.
pub fn diff_snapshots(threads: usize, old: &Snapshot, new: &Snapshot) -> Vec<Difference> {
    let mut differences = diff_classes(threads, &old.classes, &new.classes);
    for difference in &mut differences {
        if let Difference::ClassAdded(added) = difference {
            added.class_file = new.class_file(&added.class.name).map(<[u8]>::to_vec);
        }
    }
    differences
}

/// Compute the differences between two sets of classes
///
/// Removed classes come first, then added classes (both sorted by name), then the differences
/// of the classes in both sets, in order of class name.
pub fn diff_classes(threads: usize, old: &ClassMap, new: &ClassMap) -> Vec<Difference> {
    let mut removed: Vec<&String> = old.keys().filter(|name| !new.contains_key(*name)).collect();
    let mut added: Vec<&String> = new.keys().filter(|name| !old.contains_key(*name)).collect();
    let mut common: Vec<&String> = old.keys().filter(|name| new.contains_key(*name)).collect();
    removed.sort();
    added.sort();
    common.sort();
    log::debug!(
        "{} removed, {} added, and {} common classes",
        removed.len(),
        added.len(),
        common.len()
    );

    let mut differences: Vec<Difference> = removed
        .into_iter()
        .map(|name| Difference::ClassRemoved {
            class: name.clone(),
        })
        .collect();
    differences.extend(
        added
            .into_iter()
            .map(|name| Difference::ClassAdded(Box::new(AddedClass::new(new[name].clone())))),
    );

    let pending = Mutex::new(common.iter().enumerate());
    let compared: Mutex<Vec<(usize, Vec<Difference>)>> = Mutex::new(vec![]);

    scheduler::run(threads, || {
        let next = lock(&pending).next();
        let Some((index, name)) = next else {
            return Tick::Done;
        };
        let class_differences = compare_class(&old[*name], &new[*name]);
        if !class_differences.is_empty() {
            lock(&compared).push((index, class_differences));
        }
        Tick::Continue
    });

    let mut compared = compared.into_inner().unwrap_or_else(PoisonError::into_inner);
    compared.sort_by_key(|(index, _)| *index);
    differences.extend(compared.into_iter().flat_map(|(_, found)| found));
    differences
}

/// Compare two versions of the same class
pub fn compare_class(old: &Class, new: &Class) -> Vec<Difference> {
    let class = &old.name;
    let mut differences = vec![];

    if old.access_flags != new.access_flags {
        differences.push(Difference::ClassAccessChanged {
            class: class.clone(),
            old: old.access_flags,
            new: new.access_flags,
        });
    }
    if let Some(change) = ClassMetadataChange::between(old, new) {
        differences.push(Difference::ClassMetadataChanged(change));
    }
    if old.version != new.version {
        differences.push(Difference::ClassVersionChanged {
            class: class.clone(),
            version: new.version,
        });
    }

    let old_fields: HashMap<&str, &Field> = old
        .fields
        .iter()
        .map(|field| (field.name.as_str(), field))
        .collect();
    let new_fields: HashMap<&str, &Field> = new
        .fields
        .iter()
        .map(|field| (field.name.as_str(), field))
        .collect();

    for field in &old.fields {
        if !new_fields.contains_key(field.name.as_str()) {
            differences.push(Difference::FieldRemoved {
                class: class.clone(),
                name: field.name.clone(),
            });
        }
    }
    for field in &new.fields {
        if !old_fields.contains_key(field.name.as_str()) {
            differences.push(Difference::FieldAdded {
                class: class.clone(),
                field: field.clone(),
            });
        }
    }
    for old_field in &old.fields {
        if let Some(new_field) = new_fields.get(old_field.name.as_str()) {
            compare_field(&mut differences, class, old_field, new_field);
        }
    }

    let old_methods: HashMap<(&str, &str), &Method> =
        old.methods.iter().map(|method| (method.key(), method)).collect();
    let new_methods: HashMap<(&str, &str), &Method> =
        new.methods.iter().map(|method| (method.key(), method)).collect();

    for method in &old.methods {
        if !new_methods.contains_key(&method.key()) {
            differences.push(Difference::MethodRemoved {
                class: class.clone(),
                name: method.name.clone(),
                descriptor: method.descriptor.clone(),
            });
        }
    }
    for method in &new.methods {
        if !old_methods.contains_key(&method.key()) {
            differences.push(Difference::MethodAdded {
                class: class.clone(),
                method: method.clone(),
            });
        }
    }
    for old_method in &old.methods {
        if let Some(new_method) = new_methods.get(&old_method.key()) {
            compare_method(&mut differences, class, old_method, new_method);
        }
    }

    if !differences.is_empty() {
        log::trace!("{} differences in class {}", differences.len(), class);
    }
    differences
}

fn compare_field(differences: &mut Vec<Difference>, class: &str, old: &Field, new: &Field) {
    if old.access_flags != new.access_flags {
        differences.push(Difference::FieldAccessChanged {
            class: String::from(class),
            name: old.name.clone(),
            old: old.access_flags,
            new: new.access_flags,
        });
    }
    if old.descriptor != new.descriptor {
        differences.push(Difference::FieldDescriptorChanged {
            class: String::from(class),
            name: old.name.clone(),
            descriptor: new.descriptor.clone(),
        });
    }
    if old.signature != new.signature {
        differences.push(Difference::FieldSignatureChanged {
            class: String::from(class),
            name: old.name.clone(),
            signature: new.signature.clone(),
        });
    }
    if old.value != new.value {
        differences.push(Difference::FieldValueChanged {
            class: String::from(class),
            name: old.name.clone(),
            value: new.value.clone(),
        });
    }
}

fn compare_method(differences: &mut Vec<Difference>, class: &str, old: &Method, new: &Method) {
    let class = String::from(class);
    let name = &old.name;
    let descriptor = &old.descriptor;

    if old.access_flags != new.access_flags {
        differences.push(Difference::MethodAccessChanged {
            class: class.clone(),
            name: name.clone(),
            descriptor: descriptor.clone(),
            old: old.access_flags,
            new: new.access_flags,
        });
    }
    if old.signature != new.signature {
        differences.push(Difference::MethodSignatureChanged {
            class: class.clone(),
            name: name.clone(),
            descriptor: descriptor.clone(),
            signature: new.signature.clone(),
        });
    }
    if old.exceptions != new.exceptions {
        differences.push(Difference::MethodExceptionsChanged {
            class: class.clone(),
            name: name.clone(),
            descriptor: descriptor.clone(),
            exceptions: new.exceptions.clone(),
        });
    }
    if old.annotation_default != new.annotation_default {
        differences.push(Difference::MethodAnnotationDefaultChanged {
            class: class.clone(),
            name: name.clone(),
            descriptor: descriptor.clone(),
            value: new.annotation_default.clone(),
        });
    }
    if old.max_stack != new.max_stack || old.max_locals != new.max_locals {
        differences.push(Difference::MethodMaxsChanged {
            class: class.clone(),
            name: name.clone(),
            descriptor: descriptor.clone(),
            max_stack: new.max_stack,
            max_locals: new.max_locals,
        });
    }
    if !equivalent_code(
        &old.instructions,
        &new.instructions,
        &old.exception_handlers,
        &new.exception_handlers,
    ) {
        differences.push(Difference::MethodInstructionsChanged {
            class,
            method: new.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::class_file::Version;
    use crate::jvm::code::{Instruction, Label, Opcode};
    use crate::jvm::model::{ConstantData, ElementValue};
    use crate::jvm::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};

    fn class(name: &str) -> Class {
        Class {
            name: String::from(name),
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
            methods: vec![],
        }
    }

    fn field(name: &str) -> Field {
        Field {
            name: String::from(name),
            descriptor: String::from("I"),
            access_flags: FieldAccessFlags::PRIVATE,
            signature: None,
            value: None,
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
    fn identical_classes() {
        let mut a = class("A");
        a.fields.push(field("x"));
        a.methods
            .push(method("f", vec![Instruction::Simple(Opcode::RETURN)]));
        assert_eq!(compare_class(&a, &a.clone()), vec![]);
    }

    #[test]
    fn class_level_order() {
        let old = class("A");
        let mut new = class("A");
        new.access_flags |= ClassAccessFlags::FINAL;
        new.version = Version::JAVA11;
        new.signature = Some(String::from("Ljava/lang/Object;"));

        let differences = compare_class(&old, &new);
        assert!(matches!(
            differences.as_slice(),
            [
                Difference::ClassAccessChanged { .. },
                Difference::ClassMetadataChanged(_),
                Difference::ClassVersionChanged { .. },
            ]
        ));
    }

    #[test]
    fn field_level_order() {
        let mut old = class("A");
        old.fields.push(field("x"));
        let mut new = class("A");
        new.fields.push(Field {
            name: String::from("x"),
            descriptor: String::from("J"),
            access_flags: FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC,
            signature: Some(String::from("TT;")),
            value: Some(ConstantData::Long(3)),
        });

        let differences = compare_class(&old, &new);
        assert!(matches!(
            differences.as_slice(),
            [
                Difference::FieldAccessChanged { .. },
                Difference::FieldDescriptorChanged { .. },
                Difference::FieldSignatureChanged { .. },
                Difference::FieldValueChanged { .. },
            ]
        ));
    }

    #[test]
    fn method_level_order() {
        let mut old = class("A");
        old.methods
            .push(method("f", vec![Instruction::Simple(Opcode::RETURN)]));
        let mut new = class("A");
        new.methods.push(Method {
            access_flags: MethodAccessFlags::PRIVATE,
            signature: Some(String::from("()V")),
            exceptions: vec![String::from("java/io/IOException")],
            annotation_default: Some(ElementValue::Int(1)),
            max_stack: 1,
            instructions: vec![
                Instruction::Simple(Opcode::ICONST_1),
                Instruction::Simple(Opcode::POP),
                Instruction::Simple(Opcode::RETURN),
            ],
            ..method("f", vec![])
        });

        let differences = compare_class(&old, &new);
        assert!(matches!(
            differences.as_slice(),
            [
                Difference::MethodAccessChanged { .. },
                Difference::MethodSignatureChanged { .. },
                Difference::MethodExceptionsChanged { .. },
                Difference::MethodAnnotationDefaultChanged { .. },
                Difference::MethodMaxsChanged { .. },
                Difference::MethodInstructionsChanged { .. },
            ]
        ));
    }

    #[test]
    fn relabelled_body_is_unchanged() {
        let body = |first: Label, second: Label| {
            vec![
                Instruction::Label(first),
                Instruction::Jump(Opcode::GOTO, second),
                Instruction::Label(second),
                Instruction::Simple(Opcode::RETURN),
            ]
        };
        let mut old = class("A");
        old.methods
            .push(method("f", body(Label::START, Label::START.next())));
        let mut new = class("A");
        let renumbered = Label::START.next().next();
        new.methods
            .push(method("f", body(renumbered, renumbered.next())));

        assert_eq!(compare_class(&old, &new), vec![]);
    }

    #[test]
    fn overloads_are_separate_methods() {
        let mut old = class("A");
        old.methods
            .push(method("f", vec![Instruction::Simple(Opcode::RETURN)]));
        let mut new = old.clone();
        new.methods.push(Method {
            descriptor: String::from("(I)V"),
            max_locals: 2,
            ..method("f", vec![Instruction::Simple(Opcode::RETURN)])
        });

        let differences = compare_class(&old, &new);
        assert_eq!(differences.len(), 1);
        assert!(matches!(
            &differences[0],
            Difference::MethodAdded { method, .. } if method.descriptor == "(I)V"
        ));
    }

    #[test]
    fn class_set_differences() {
        let old = class_map(vec![class("A"), class("B"), class("C")]);
        let mut changed_c = class("C");
        changed_c.fields.push(field("x"));
        let new = class_map(vec![class("B"), changed_c, class("D"), class("E")]);

        for threads in [1, 4] {
            let differences = diff_classes(threads, &old, &new);
            let summary: Vec<(String, &str)> = differences
                .iter()
                .map(|difference| {
                    let kind = match difference {
                        Difference::ClassRemoved { .. } => "removed",
                        Difference::ClassAdded(_) => "added",
                        Difference::FieldAdded { .. } => "field",
                        _ => "other",
                    };
                    (String::from(difference.class_name()), kind)
                })
                .collect();
            assert_eq!(
                summary,
                vec![
                    (String::from("A"), "removed"),
                    (String::from("D"), "added"),
                    (String::from("E"), "added"),
                    (String::from("C"), "field"),
                ]
            );
        }
    }

    #[test]
    fn load_rejects_garbage() {
        let good = class("A").to_bytes().unwrap();
        let buffers = vec![good, vec![0xCA, 0xFE]];
        let err = load_classes(2, buffers).unwrap_err();
        assert_eq!(err.kind(), crate::delta::ErrorKind::Malformed);
    }

    #[test]
    fn load_keys_by_name() {
        let buffers: Vec<Vec<u8>> = ["A", "B", "c/D"]
            .iter()
            .map(|name| class(name).to_bytes().unwrap())
            .collect();
        for threads in [1, 3] {
            let loaded = load_classes(threads, buffers.clone()).unwrap();
            let mut names: Vec<&str> = loaded.keys().map(String::as_str).collect();
            names.sort();
            assert_eq!(names, vec!["A", "B", "c/D"]);
            assert_eq!(loaded["c/D"], class("c/D"));
        }
    }

    #[test]
    fn added_classes_keep_their_class_file() {
        let old = load_snapshot(2, vec![class("A").to_bytes().unwrap()]).unwrap();
        let new_buffers: Vec<Vec<u8>> = ["A", "B"]
            .iter()
            .map(|name| class(name).to_bytes().unwrap())
            .collect();
        let new = load_snapshot(2, new_buffers.clone()).unwrap();
        assert_eq!(new.class_file("B"), Some(&new_buffers[1][..]));
        assert_eq!(new.class_file("C"), None);

        let differences = diff_snapshots(2, &old, &new);
        assert_eq!(differences.len(), 1);
        match &differences[0] {
            Difference::ClassAdded(added) => {
                assert_eq!(added.class, class("B"));
                assert_eq!(added.class_file.as_deref(), Some(&new_buffers[1][..]));
            }
            other => panic!("unexpected difference: {}", other),
        }
    }
}
