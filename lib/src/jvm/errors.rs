use super::class_file::ConstantPoolOverflow;
use super::code::{Label, Opcode};
use std::fmt;

/// Errors from reading or writing the binary class format
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// Input ended in the middle of a structure
    Truncated,

    /// Class file does not start with `0xCAFEBABE`
    BadMagic(u32),

    ConstantPoolOverflow {
        constant: String,
        offset: usize,
    },

    /// Constant pool index is out of bounds, lands in the unusable slot after a `long` or
    /// `double`, or points at a constant of the wrong type
    BadConstantIndex {
        index: u16,
        expected: &'static str,
    },

    UnknownConstantTag(u8),
    UnknownHandleKind(u8),
    InvalidModifiedUtf8(Vec<u8>),

    /// Bootstrap method index out of the range of the `BootstrapMethods` attribute
    BadBootstrapMethod(u16),

    UnknownOpcode {
        opcode: u8,
        offset: usize,
    },

    /// Offset does not fall on the start of an instruction (nor on the end of the code)
    InvalidCodeOffset(i64),

    /// Switch whose bounds or key count do not match its targets
    InvalidSwitch(usize),

    /// Method descriptor could not be parsed
    BadDescriptor(String),

    UnknownFrameType(u8),
    UnknownVerificationType(u8),
    UnknownElementValueTag(u8),

    /// Two stack map frames at the same offset, or a frame placed before a previous one
    FrameOrder(usize),

    /// Frame cannot be stored in a `StackMapTable` (eg. chopping more than 3 locals)
    InvalidFrame(String),

    /// Label is used by an instruction, handler, or frame but never placed
    MissingLabel(Label),

    /// Label placed twice in the same method
    DuplicateLabel(Label),

    /// Jump offset does not fit in the instruction encoding
    JumpOverflow {
        opcode: Opcode,
        offset: usize,
        target: usize,
    },

    /// Method code is larger than the `u16` offsets in the class file allow
    MethodCodeOverflow(usize),

    /// Operand does not fit in the instruction encoding
    OperandOverflow {
        opcode: Opcode,
        operand: i64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::Truncated => write!(f, "class file is truncated"),
            Error::BadMagic(magic) => write!(f, "bad class file magic 0x{:08X}", magic),
            Error::ConstantPoolOverflow { constant, offset } => {
                write!(f, "constant pool overflow at {} inserting {}", offset, constant)
            }
            Error::BadConstantIndex { index, expected } => {
                write!(f, "constant #{} is not a valid {} constant", index, expected)
            }
            Error::UnknownConstantTag(tag) => write!(f, "unknown constant tag {}", tag),
            Error::UnknownHandleKind(kind) => write!(f, "unknown method handle kind {}", kind),
            Error::InvalidModifiedUtf8(bytes) => {
                write!(f, "invalid modified UTF-8 string {:?}", bytes)
            }
            Error::BadBootstrapMethod(idx) => write!(f, "no bootstrap method {}", idx),
            Error::UnknownOpcode { opcode, offset } => {
                write!(f, "unknown opcode 0x{:02x} at offset {}", opcode, offset)
            }
            Error::InvalidCodeOffset(offset) => write!(f, "invalid code offset {}", offset),
            Error::InvalidSwitch(offset) => write!(f, "malformed switch at offset {}", offset),
            Error::BadDescriptor(desc) => write!(f, "bad method descriptor {:?}", desc),
            Error::UnknownFrameType(tag) => write!(f, "unknown stack map frame type {}", tag),
            Error::UnknownVerificationType(tag) => {
                write!(f, "unknown verification type {}", tag)
            }
            Error::UnknownElementValueTag(tag) => {
                write!(f, "unknown element value tag {:?}", *tag as char)
            }
            Error::FrameOrder(offset) => write!(f, "out of order frame at offset {}", offset),
            Error::InvalidFrame(msg) => write!(f, "invalid frame: {}", msg),
            Error::MissingLabel(label) => write!(f, "label {:?} is never placed", label),
            Error::DuplicateLabel(label) => write!(f, "label {:?} is placed twice", label),
            Error::JumpOverflow {
                opcode,
                offset,
                target,
            } => write!(
                f,
                "{} at offset {} cannot reach offset {}",
                opcode, offset, target
            ),
            Error::MethodCodeOverflow(len) => write!(f, "method code is too long ({} bytes)", len),
            Error::OperandOverflow { opcode, operand } => {
                write!(f, "operand {} does not fit in {}", operand, opcode)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::IoError(err)
        }
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow {
            constant: format!("{:?}", overflow.constant),
            offset: overflow.offset as usize,
        }
    }
}
