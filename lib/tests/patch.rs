mod common;

use common::*;
use jardelta::archive::{self, ClassEntry};
use jardelta::delta::{calculate_difference, diff_classes, Difference, Patch, PatchCodec};
use jardelta::jvm::code::{Instruction, Opcode};
use jardelta::jvm::model::{Class, ReaderFlags};
use jardelta::jvm::ClassAccessFlags;
use std::fs;
use std::path::Path;

fn entries(classes: &[Class], prefix: &str) -> Vec<ClassEntry> {
    classes
        .iter()
        .map(|class| ClassEntry {
            name: format!("{}{}.class", prefix, class.name),
            bytes: class.to_bytes().unwrap(),
        })
        .collect()
}

fn old_and_new() -> (Vec<Class>, Vec<Class>) {
    let mut a = class("pkg/A");
    a.methods.push(method(
        "f",
        "()V",
        vec![Instruction::Simple(Opcode::RETURN)],
    ));
    a.methods.push(branchy_method("pkg/A"));
    a.fields.push(constant("LIMIT", 3));
    let gone = class("pkg/Gone");

    let mut new_a = a.clone();
    new_a.methods[0].instructions = vec![
        Instruction::Simple(Opcode::ICONST_1),
        Instruction::Simple(Opcode::POP),
        Instruction::Simple(Opcode::RETURN),
    ];
    new_a.methods.push(greeting_method());
    new_a.access_flags |= ClassAccessFlags::INTERFACE;
    let mut added = class("pkg/Added");
    added.methods.push(greeting_method());

    (vec![a, gone], vec![new_a, added])
}

fn write_module(path: &Path, entries: &[ClassEntry]) {
    let mut bytes = b"JM\x01\x00".to_vec();
    bytes.extend(archive::zip_entries(entries).unwrap());
    fs::write(path, bytes).unwrap();
}

#[test]
fn archives_to_patch_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let (old, new) = old_and_new();
    let old_jar = dir.path().join("old.jar");
    let new_jar = dir.path().join("new.jar");
    archive::write_class_entries(&old_jar, &entries(&old, "")).unwrap();
    archive::write_class_entries(&new_jar, &entries(&new, "")).unwrap();

    let differences = calculate_difference(2, &old_jar, &new_jar).unwrap();
    assert_eq!(
        differences,
        diff_classes(1, &class_map(old.clone()), &class_map(new.clone()))
    );
    assert!(differences
        .iter()
        .any(|difference| matches!(difference, Difference::MethodInstructionsChanged { .. })));

    let codec = PatchCodec::default();
    let patch_path = dir.path().join("out").join("update.patch");
    fs::create_dir_all(patch_path.parent().unwrap()).unwrap();
    let patch = Patch::new("update", differences);
    patch
        .write_to(&codec, fs::File::create(&patch_path).unwrap())
        .unwrap();

    let read = Patch::read_from(&codec, fs::File::open(&patch_path).unwrap()).unwrap();
    assert_eq!(read, patch);
    assert_eq!(read.format_version, PatchCodec::FORMAT_VERSION);

    // The read patch still turns the old classes into the new ones
    let mut live = class_map(old);
    read.apply(&mut live).unwrap();
    assert_eq!(diff_classes(1, &live, &class_map(new)), vec![]);
}

#[test]
fn module_archives_only_contribute_classes() {
    let dir = tempfile::tempdir().unwrap();
    let (old, new) = old_and_new();

    let mut old_entries = entries(&old, "classes/");
    old_entries.push(ClassEntry {
        name: String::from("classes/module-info.class"),
        bytes: vec![0, 1, 2],
    });
    old_entries.push(ClassEntry {
        name: String::from("conf/settings.properties"),
        bytes: b"a=b".to_vec(),
    });
    let old_module = dir.path().join("old.jmod");
    let new_module = dir.path().join("new.jmod");
    write_module(&old_module, &old_entries);
    write_module(&new_module, &entries(&new, "classes/"));

    let differences = calculate_difference(3, &old_module, &new_module).unwrap();
    assert_eq!(
        differences,
        diff_classes(1, &class_map(old), &class_map(new))
    );
}

#[test]
fn agent_split() {
    let (old, new) = old_and_new();
    let differences = diff_classes(2, &class_map(old), &class_map(new.clone()));
    let mut patch = Patch::new("agent", differences);

    // pkg/A became an interface
    let illegal: Vec<&Difference> = patch.not_runtime_appliable().collect();
    assert_eq!(illegal.len(), 1);
    assert_eq!(illegal[0].class_name(), "pkg/A");

    let added = patch.take_added_classes();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].class, reparse(&new[1]));
    assert!(patch
        .differences
        .iter()
        .all(|difference| !difference.requires_side_channel()));

    let dir = tempfile::tempdir().unwrap();
    let side = dir.path().join("added.zip");
    let added_entries: Vec<ClassEntry> = added
        .iter()
        .map(|added| ClassEntry {
            name: format!("{}.class", added.class.name),
            bytes: added.to_bytes().unwrap(),
        })
        .collect();
    archive::write_class_entries(&side, &added_entries).unwrap();
    let read = archive::read_class_entries(&side).unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].name, "pkg/Added.class");
    assert_eq!(
        Class::parse(&read[0].bytes, ReaderFlags::empty()).unwrap(),
        added[0].class
    );
}
