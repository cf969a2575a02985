use crate::jvm::code::{Frame, Label, Opcode};
use crate::jvm::model::{ConstantData, Handle};

/// Reference to a field, as used by `getfield`, `putfield`, `getstatic`, and `putstatic`
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FieldRef {
    /// Internal name of the class declaring the field
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// Reference to a method, as used by the `invoke*` instructions (except `invokedynamic`)
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct MethodRef {
    /// Internal name of the class or interface declaring the method
    pub owner: String,
    pub name: String,
    pub descriptor: String,

    /// Does the reference go through `CONSTANT_InterfaceMethodref`?
    pub is_interface: bool,
}

/// Dynamically-computed call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeDynamic {
    pub name: String,
    pub descriptor: String,
    pub bootstrap_method: Handle,
    pub bootstrap_arguments: Vec<ConstantData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSwitch {
    pub low: i32,
    pub high: i32,
    pub default: Label,

    /// Targets for `low`, `low + 1`, ... `high`
    pub targets: Vec<Label>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSwitch {
    pub default: Label,

    /// Keys and their targets (sorted by key in valid bytecode)
    pub keys: Vec<i32>,
    pub targets: Vec<Label>,
}

/// Entry of the exception handler table of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of exception handler range (inclusive)
    pub start: Label,

    /// End of exception handler range (exclusive)
    pub end: Label,

    /// Start of the exception handler
    pub handler: Label,

    /// Class of exceptions caught (`None` catches everything, as for `finally`)
    pub catch_type: Option<String>,
}

/// Element of a method's instruction sequence
///
/// Instructions are grouped by the shape of their operands rather than one variant per opcode,
/// so the opcode is carried alongside the payload. On top of real bytecode instructions, the
/// sequence also contains markers that occupy no space in the bytecode:
///
///   - [`Instruction::Label`] marks a position that jumps, switches, and exception handlers can
///     refer to
///   - [`Instruction::LineNumber`] maps the following instructions to a source line
///   - [`Instruction::Frame`] holds the stack map frame for the position
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Instruction without operands (eg. `iadd`, `return`, `athrow`)
    Simple(Opcode),

    /// `bipush`, `sipush`, and `newarray`
    Int(Opcode, i32),

    /// Load, store, and `ret` instructions on a local variable index
    Var(Opcode, u16),

    /// `new`, `anewarray`, `checkcast`, and `instanceof` (operand is an internal name or array
    /// descriptor)
    Type(Opcode, String),

    Field(Opcode, FieldRef),

    Method(Opcode, MethodRef),

    InvokeDynamic(InvokeDynamic),

    /// Conditional and unconditional branches, and `jsr`
    Jump(Opcode, Label),

    TableSwitch(TableSwitch),

    LookupSwitch(LookupSwitch),

    /// Increment a local variable
    Iinc { index: u16, increment: i16 },

    MultiANewArray { descriptor: String, dimensions: u8 },

    /// Any of `ldc`, `ldc_w`, or `ldc2_w`
    Ldc(ConstantData),

    Label(Label),

    LineNumber { line: u16, start: Label },

    Frame(Frame),
}

/// Shape of an instruction (one per variant of [`Instruction`])
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Simple,
    Int,
    Var,
    Type,
    Field,
    Method,
    InvokeDynamic,
    Jump,
    TableSwitch,
    LookupSwitch,
    Iinc,
    MultiANewArray,
    Ldc,
    Label,
    LineNumber,
    Frame,
}

impl Instruction {
    /// Opcode of the instruction, or `None` for markers
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Instruction::Simple(opcode)
            | Instruction::Int(opcode, _)
            | Instruction::Var(opcode, _)
            | Instruction::Type(opcode, _)
            | Instruction::Field(opcode, _)
            | Instruction::Method(opcode, _)
            | Instruction::Jump(opcode, _) => Some(*opcode),
            Instruction::InvokeDynamic(_) => Some(Opcode::INVOKEDYNAMIC),
            Instruction::TableSwitch(_) => Some(Opcode::TABLESWITCH),
            Instruction::LookupSwitch(_) => Some(Opcode::LOOKUPSWITCH),
            Instruction::Iinc { .. } => Some(Opcode::IINC),
            Instruction::MultiANewArray { .. } => Some(Opcode::MULTIANEWARRAY),
            Instruction::Ldc(_) => Some(Opcode::LDC),
            Instruction::Label(_) | Instruction::LineNumber { .. } | Instruction::Frame(_) => None,
        }
    }

    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Simple(_) => InstructionKind::Simple,
            Instruction::Int(_, _) => InstructionKind::Int,
            Instruction::Var(_, _) => InstructionKind::Var,
            Instruction::Type(_, _) => InstructionKind::Type,
            Instruction::Field(_, _) => InstructionKind::Field,
            Instruction::Method(_, _) => InstructionKind::Method,
            Instruction::InvokeDynamic(_) => InstructionKind::InvokeDynamic,
            Instruction::Jump(_, _) => InstructionKind::Jump,
            Instruction::TableSwitch(_) => InstructionKind::TableSwitch,
            Instruction::LookupSwitch(_) => InstructionKind::LookupSwitch,
            Instruction::Iinc { .. } => InstructionKind::Iinc,
            Instruction::MultiANewArray { .. } => InstructionKind::MultiANewArray,
            Instruction::Ldc(_) => InstructionKind::Ldc,
            Instruction::Label(_) => InstructionKind::Label,
            Instruction::LineNumber { .. } => InstructionKind::LineNumber,
            Instruction::Frame(_) => InstructionKind::Frame,
        }
    }

    /// Is this a marker (which takes up no space in the bytecode)?
    pub fn is_marker(&self) -> bool {
        self.opcode().is_none()
    }
}
