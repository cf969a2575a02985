//! Builders for the classes used across the integration tests
#![allow(dead_code)]

use jardelta::delta::ClassMap;
use jardelta::jvm::class_file::Version;
use jardelta::jvm::code::{
    ExceptionHandler, FieldRef, Instruction, Label, LabelGenerator, MethodRef, Opcode,
    SequentialLabels,
};
use jardelta::jvm::model::{Class, ConstantData, Field, Method, ReaderFlags};
use jardelta::jvm::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};

pub fn class(name: &str) -> Class {
    Class {
        name: String::from(name),
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        version: Version::JAVA8,
        super_name: Some(String::from("java/lang/Object")),
        interfaces: vec![],
        signature: None,
        source_file: Some(format!("{}.java", name.rsplit('/').next().unwrap_or(name))),
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

pub fn field(name: &str, descriptor: &str) -> Field {
    Field {
        name: String::from(name),
        descriptor: String::from(descriptor),
        access_flags: FieldAccessFlags::PRIVATE,
        signature: None,
        value: None,
    }
}

pub fn constant(name: &str, value: i32) -> Field {
    Field {
        access_flags: FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
        value: Some(ConstantData::Integer(value)),
        ..field(name, "I")
    }
}

pub fn method(name: &str, descriptor: &str, instructions: Vec<Instruction>) -> Method {
    Method {
        name: String::from(name),
        descriptor: String::from(descriptor),
        access_flags: MethodAccessFlags::PUBLIC,
        signature: None,
        exceptions: vec![],
        annotation_default: None,
        max_stack: 2,
        max_locals: 2,
        instructions,
        exception_handlers: vec![],
    }
}

/// `int choose(int x) { try { if (x == 0) return helper(); return LIMIT; } catch (Exception e) { return -1; } }`
pub fn branchy_method(class: &str) -> Method {
    let mut labels = SequentialLabels::default();
    let start: Label = labels.fresh_label();
    let otherwise = labels.fresh_label();
    let end = labels.fresh_label();

    let instructions = vec![
        Instruction::Label(start),
        Instruction::Var(Opcode::ILOAD, 1),
        Instruction::Jump(Opcode::IFNE, otherwise),
        Instruction::Method(
            Opcode::INVOKESTATIC,
            MethodRef {
                owner: String::from(class),
                name: String::from("helper"),
                descriptor: String::from("()I"),
                is_interface: false,
            },
        ),
        Instruction::Simple(Opcode::IRETURN),
        Instruction::Label(otherwise),
        Instruction::Field(
            Opcode::GETSTATIC,
            FieldRef {
                owner: String::from(class),
                name: String::from("LIMIT"),
                descriptor: String::from("I"),
            },
        ),
        Instruction::Simple(Opcode::IRETURN),
        Instruction::Label(end),
        Instruction::Simple(Opcode::POP),
        Instruction::Int(Opcode::BIPUSH, -1),
        Instruction::Simple(Opcode::IRETURN),
    ];

    Method {
        exception_handlers: vec![ExceptionHandler {
            start,
            end,
            handler: end,
            catch_type: Some(String::from("java/lang/Exception")),
        }],
        ..method("choose", "(I)I", instructions)
    }
}

pub fn greeting_method() -> Method {
    method(
        "greet",
        "()Ljava/lang/String;",
        vec![
            Instruction::Ldc(ConstantData::String("hello".into())),
            Instruction::Simple(Opcode::ARETURN),
        ],
    )
}

/// Round trip the class through class file bytes, as the diff engine would see it
pub fn reparse(class: &Class) -> Class {
    Class::parse(&class.to_bytes().unwrap(), ReaderFlags::SKIP_DEBUG).unwrap()
}

pub fn class_map(classes: Vec<Class>) -> ClassMap {
    classes
        .into_iter()
        .map(|class| {
            let class = reparse(&class);
            (class.name.clone(), class)
        })
        .collect()
}

pub fn class_bytes(classes: &[Class]) -> Vec<Vec<u8>> {
    classes
        .iter()
        .map(|class| class.to_bytes().unwrap())
        .collect()
}

/// Instructions of a body, without labels, line numbers, or frames
pub fn without_markers(instructions: &[Instruction]) -> Vec<Instruction> {
    instructions
        .iter()
        .filter(|instruction| {
            !matches!(
                instruction,
                Instruction::Label(_) | Instruction::LineNumber { .. } | Instruction::Frame(_)
            )
        })
        .cloned()
        .collect()
}
