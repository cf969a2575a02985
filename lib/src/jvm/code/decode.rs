use crate::jvm::class_file;
use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, ConstantsReader, Deserialize, FieldRefConstantIndex,
    InvokeDynamicConstantIndex, LineNumberTable, MethodRefConstantIndex, StackMapTable,
};
use crate::jvm::code::{
    ExceptionHandler, Frame, Instruction, Label, LabelGenerator, LookupSwitch, Opcode,
    SequentialLabels, TableSwitch,
};
use crate::jvm::model::ReaderFlags;
use crate::jvm::Error;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Cursor;

/// Instructions and exception handlers of a decoded `Code` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
    pub exception_handlers: Vec<ExceptionHandler>,
}

/// Decode bytecode into an instruction sequence
///
/// Every offset referred to (by a jump, a switch, an exception handler, a line number, or an
/// uninitialized verification type) gets exactly one label, and labels are handed out in order
/// of increasing offset. Decoding the same bytecode twice therefore produces the same labels.
///
/// Markers at the same offset are always placed in the order label, line numbers, frame, then
/// the instruction itself.
pub fn decode_code(
    code: &class_file::Code,
    constants: &ConstantsReader,
    flags: ReaderFlags,
) -> Result<MethodBody, Error> {
    let bytes: &[u8] = &code.code_array.0;
    let code_len = bytes.len();

    // Side tables, keyed by offset
    let mut line_numbers: BTreeMap<usize, Vec<u16>> = BTreeMap::new();
    let mut frames: BTreeMap<usize, Frame<ClassConstantIndex, u16>> = BTreeMap::new();
    for attribute in &code.attributes {
        match constants.utf8(attribute.name_index)?.as_str() {
            "LineNumberTable" if !flags.contains(ReaderFlags::SKIP_DEBUG) => {
                for entry in attribute.decode::<LineNumberTable>()?.0 {
                    line_numbers
                        .entry(entry.start_pc.0 as usize)
                        .or_default()
                        .push(entry.line_number);
                }
            }
            "StackMapTable" if !flags.contains(ReaderFlags::SKIP_FRAMES) => {
                let mut previous: Option<usize> = None;
                for stack_map_frame in attribute.decode::<StackMapTable>()?.0 {
                    let (offset_delta, frame) = Frame::from_stack_map_frame(stack_map_frame);
                    let offset = match previous {
                        None => offset_delta as usize,
                        Some(previous) => previous + offset_delta as usize + 1,
                    };
                    frames.insert(offset, frame);
                    previous = Some(offset);
                }
            }
            _ => (),
        }
    }

    // First pass: find instruction boundaries and every offset which needs a label
    let mut boundaries: BTreeSet<usize> = BTreeSet::new();
    let mut targets: Vec<i64> = vec![];
    let mut reader = Cursor::new(bytes);
    while (reader.position() as usize) < code_len {
        let offset = reader.position() as usize;
        boundaries.insert(offset);
        decode_instruction(&mut reader, constants, &mut |target| {
            targets.push(target);
            Ok(Label::START)
        })?;
    }
    boundaries.insert(code_len);

    for handler in &code.exception_table {
        targets.push(handler.start_pc.0 as i64);
        targets.push(handler.end_pc.0 as i64);
        targets.push(handler.handler_pc.0 as i64);
    }
    targets.extend(line_numbers.keys().map(|offset| *offset as i64));
    for frame in frames.values() {
        frame.map(&mut |_| Ok::<(), Error>(()), &mut |offset| {
            targets.push(*offset as i64);
            Ok(())
        })?;
    }
    for offset in frames.keys() {
        if !boundaries.contains(offset) {
            return Err(Error::InvalidCodeOffset(*offset as i64));
        }
    }

    let mut sorted_targets: BTreeSet<usize> = BTreeSet::new();
    for target in targets {
        match usize::try_from(target) {
            Ok(offset) if boundaries.contains(&offset) => {
                sorted_targets.insert(offset);
            }
            _ => return Err(Error::InvalidCodeOffset(target)),
        }
    }
    let mut label_generator = SequentialLabels::default();
    let labels: HashMap<usize, Label> = sorted_targets
        .into_iter()
        .map(|offset| (offset, label_generator.fresh_label()))
        .collect();
    let label_at = |offset: i64| -> Result<Label, Error> {
        usize::try_from(offset)
            .ok()
            .and_then(|offset| labels.get(&offset).copied())
            .ok_or(Error::InvalidCodeOffset(offset))
    };

    // Second pass: emit the markers and instructions
    let mut instructions = vec![];
    let mut reader = Cursor::new(bytes);
    for offset in &boundaries {
        if let Some(label) = labels.get(offset) {
            instructions.push(Instruction::Label(*label));
        }
        if let Some(lines) = line_numbers.get(offset) {
            let start = label_at(*offset as i64)?;
            for line in lines {
                instructions.push(Instruction::LineNumber { line: *line, start });
            }
        }
        if let Some(frame) = frames.get(offset) {
            let frame = frame.map(
                &mut |class: &ClassConstantIndex| constants.class_name(*class),
                &mut |new_offset: &u16| label_at(*new_offset as i64),
            )?;
            instructions.push(Instruction::Frame(frame));
        }
        if *offset < code_len {
            instructions.push(decode_instruction(&mut reader, constants, &mut |target| {
                label_at(target)
            })?);
        }
    }

    let exception_handlers = code
        .exception_table
        .iter()
        .map(|handler| -> Result<ExceptionHandler, Error> {
            Ok(ExceptionHandler {
                start: label_at(handler.start_pc.0 as i64)?,
                end: label_at(handler.end_pc.0 as i64)?,
                handler: label_at(handler.handler_pc.0 as i64)?,
                catch_type: constants.optional_class_name(handler.catch_type)?,
            })
        })
        .collect::<Result<_, _>>()?;

    Ok(MethodBody {
        instructions,
        exception_handlers,
    })
}

/// Decode the instruction at the reader's position
///
/// `label_at` receives absolute target offsets. The reader must be over the entire code array,
/// since switch padding depends on the absolute position.
fn decode_instruction<F>(
    reader: &mut Cursor<&[u8]>,
    constants: &ConstantsReader,
    label_at: &mut F,
) -> Result<Instruction, Error>
where
    F: FnMut(i64) -> Result<Label, Error>,
{
    let offset = reader.position() as usize;
    let opcode = u8::deserialize(reader)?;
    let relative = |delta: i64| offset as i64 + delta;

    Ok(match opcode {
        // nop, constants, array loads/stores, stack, arithmetic, conversions, comparisons,
        // returns, arraylength, athrow, monitors
        0x00..=0x0f | 0x2e..=0x35 | 0x4f..=0x83 | 0x85..=0x98 | 0xac..=0xb1 | 0xbe | 0xbf
        | 0xc2 | 0xc3 => Instruction::Simple(Opcode(opcode)),

        0x10 => Instruction::Int(Opcode::BIPUSH, i8::deserialize(reader)? as i32),
        0x11 => Instruction::Int(Opcode::SIPUSH, i16::deserialize(reader)? as i32),
        0xbc => Instruction::Int(Opcode::NEWARRAY, u8::deserialize(reader)? as i32),

        0x12 => Instruction::Ldc(constants.loadable(ConstantIndex(u8::deserialize(reader)? as u16))?),
        0x13 | 0x14 => Instruction::Ldc(constants.loadable(ConstantIndex::deserialize(reader)?)?),

        0x15..=0x19 | 0x36..=0x3a | 0xa9 => {
            Instruction::Var(Opcode(opcode), u8::deserialize(reader)? as u16)
        }

        // iload_0 ... aload_3
        0x1a..=0x2d => {
            let n = opcode - 0x1a;
            Instruction::Var(Opcode(Opcode::ILOAD.0 + n / 4), (n % 4) as u16)
        }

        // istore_0 ... astore_3
        0x3b..=0x4e => {
            let n = opcode - 0x3b;
            Instruction::Var(Opcode(Opcode::ISTORE.0 + n / 4), (n % 4) as u16)
        }

        0x84 => Instruction::Iinc {
            index: u8::deserialize(reader)? as u16,
            increment: i8::deserialize(reader)? as i16,
        },

        // if*, if_icmp*, if_acmp*, goto, jsr, ifnull, ifnonnull
        0x99..=0xa8 | 0xc6 | 0xc7 => {
            let delta = i16::deserialize(reader)? as i64;
            Instruction::Jump(Opcode(opcode), label_at(relative(delta))?)
        }
        0xc8 | 0xc9 => {
            let delta = i32::deserialize(reader)? as i64;
            let opcode = if opcode == 0xc8 { Opcode::GOTO } else { Opcode::JSR };
            Instruction::Jump(opcode, label_at(relative(delta))?)
        }

        0xaa => {
            skip_padding(reader)?;
            let default = label_at(relative(i32::deserialize(reader)? as i64))?;
            let low = i32::deserialize(reader)?;
            let high = i32::deserialize(reader)?;
            if high < low {
                return Err(Error::InvalidSwitch(offset));
            }
            let mut targets = vec![];
            for _ in low..=high {
                targets.push(label_at(relative(i32::deserialize(reader)? as i64))?);
            }
            Instruction::TableSwitch(TableSwitch {
                low,
                high,
                default,
                targets,
            })
        }
        0xab => {
            skip_padding(reader)?;
            let default = label_at(relative(i32::deserialize(reader)? as i64))?;
            let pairs = i32::deserialize(reader)?;
            if pairs < 0 {
                return Err(Error::InvalidSwitch(offset));
            }
            let mut keys = vec![];
            let mut targets = vec![];
            for _ in 0..pairs {
                keys.push(i32::deserialize(reader)?);
                targets.push(label_at(relative(i32::deserialize(reader)? as i64))?);
            }
            Instruction::LookupSwitch(LookupSwitch {
                default,
                keys,
                targets,
            })
        }

        // getstatic, putstatic, getfield, putfield
        0xb2..=0xb5 => {
            let index = FieldRefConstantIndex::deserialize(reader)?;
            Instruction::Field(Opcode(opcode), constants.field_ref(index)?)
        }

        // invokevirtual, invokespecial, invokestatic
        0xb6..=0xb8 => {
            let index = MethodRefConstantIndex::deserialize(reader)?;
            Instruction::Method(Opcode(opcode), constants.method_ref(index)?)
        }
        0xb9 => {
            let index = MethodRefConstantIndex::deserialize(reader)?;
            let _count = u8::deserialize(reader)?;
            let _zero = u8::deserialize(reader)?;
            Instruction::Method(Opcode::INVOKEINTERFACE, constants.method_ref(index)?)
        }
        0xba => {
            let index = InvokeDynamicConstantIndex::deserialize(reader)?;
            let _zero = u16::deserialize(reader)?;
            Instruction::InvokeDynamic(constants.invoke_dynamic(index)?)
        }

        // new, anewarray, checkcast, instanceof
        0xbb | 0xbd | 0xc0 | 0xc1 => {
            let class = ClassConstantIndex::deserialize(reader)?;
            Instruction::Type(Opcode(opcode), constants.class_name(class)?)
        }
        0xc5 => {
            let class = ClassConstantIndex::deserialize(reader)?;
            Instruction::MultiANewArray {
                descriptor: constants.class_name(class)?,
                dimensions: u8::deserialize(reader)?,
            }
        }

        0xc4 => match u8::deserialize(reader)? {
            0x84 => Instruction::Iinc {
                index: u16::deserialize(reader)?,
                increment: i16::deserialize(reader)?,
            },
            modified @ (0x15..=0x19 | 0x36..=0x3a | 0xa9) => {
                Instruction::Var(Opcode(modified), u16::deserialize(reader)?)
            }
            modified => {
                return Err(Error::UnknownOpcode {
                    opcode: modified,
                    offset: offset + 1,
                })
            }
        },

        _ => return Err(Error::UnknownOpcode { opcode, offset }),
    })
}

/// Switch operands start at the next multiple of 4
fn skip_padding(reader: &mut Cursor<&[u8]>) -> Result<(), Error> {
    while reader.position() % 4 != 0 {
        u8::deserialize(reader)?;
    }
    Ok(())
}
