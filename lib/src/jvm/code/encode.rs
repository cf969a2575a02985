use crate::jvm::class_file;
use crate::jvm::class_file::{
    BytecodeArray, BytecodeIndex, ClassConstantIndex, ConstantIndex, ConstantsPool,
    ConstantsWriter, LineNumber, LineNumberTable, Serialize, StackMapTable,
};
use crate::jvm::code::{Instruction, Label, Opcode};
use crate::jvm::model::{ConstantData, Method};
use crate::jvm::Error;
use std::collections::{HashMap, HashSet};

/// Lay out and encode the body of a method into a `Code` attribute
///
/// Labels are resolved to bytecode offsets, `goto` and `jsr` are widened to `goto_w` and `jsr_w`
/// when their target is out of reach, and the line number and frame markers are collected back
/// into `LineNumberTable` and `StackMapTable` attributes.
///
/// A conditional branch whose target is out of reach is inverted to skip over a `goto_w`, as in
/// `ifne next; goto_w target; next:`. When the method has frames, `next` becomes a branch target
/// that needs one, so this only happens if a frame marker already follows the branch.
pub fn encode_code(method: &Method, constants: &mut ConstantsPool) -> Result<class_file::Code, Error> {
    let instructions = &method.instructions;

    let mut label_positions: HashMap<Label, usize> = HashMap::new();
    for (position, insn) in instructions.iter().enumerate() {
        if let Instruction::Label(label) = insn {
            if label_positions.insert(*label, position).is_some() {
                return Err(Error::DuplicateLabel(*label));
            }
        }
    }

    let has_frames = instructions
        .iter()
        .any(|insn| matches!(insn, Instruction::Frame(_)));

    // Widening a jump shifts everything after it, so iterate until no more jumps need widening
    let mut wide_jumps: HashSet<usize> = HashSet::new();
    let layout = loop {
        let layout = Layout::compute(instructions, &label_positions, &wide_jumps, constants)?;
        let mut widened = false;
        for (position, insn) in instructions.iter().enumerate() {
            if let Instruction::Jump(opcode, target) = insn {
                let offset = layout.offsets[position];
                let target = layout.label_offset(*target)?;
                let fits = i16::try_from(target as i64 - offset as i64).is_ok();
                if fits || wide_jumps.contains(&position) || is_wide_jump(*opcode) {
                    continue;
                }
                let invertible = opcode.inverted_branch().is_some()
                    && (!has_frames || frame_follows(instructions, position));
                if *opcode == Opcode::GOTO || *opcode == Opcode::JSR || invertible {
                    wide_jumps.insert(position);
                    widened = true;
                } else {
                    return Err(Error::JumpOverflow {
                        opcode: *opcode,
                        offset,
                        target,
                    });
                }
            }
        }
        if !widened {
            break layout;
        }
    };

    let mut code_array = vec![];
    for (position, insn) in instructions.iter().enumerate() {
        let offset = code_array.len();
        debug_assert_eq!(offset, layout.offsets[position]);
        encode_instruction(
            insn,
            offset,
            wide_jumps.contains(&position),
            constants,
            |label| layout.label_offset(label),
            &mut code_array,
        )?;
    }

    let exception_table = method
        .exception_handlers
        .iter()
        .map(|handler| -> Result<class_file::ExceptionHandler, Error> {
            Ok(class_file::ExceptionHandler {
                start_pc: layout.bytecode_index(handler.start)?,
                end_pc: layout.bytecode_index(handler.end)?,
                handler_pc: layout.bytecode_index(handler.handler)?,
                catch_type: match &handler.catch_type {
                    Some(catch_type) => constants.get_class(catch_type)?,
                    None => ClassConstantIndex::ZERO,
                },
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut line_numbers = vec![];
    let mut stack_map_frames = vec![];
    let mut previous_frame: Option<usize> = None;
    for (position, insn) in instructions.iter().enumerate() {
        match insn {
            Instruction::LineNumber { line, start } => line_numbers.push(LineNumber {
                start_pc: layout.bytecode_index(*start)?,
                line_number: *line,
            }),
            Instruction::Frame(frame) => {
                let offset = layout.offsets[position];
                let offset_delta = match previous_frame {
                    None => offset,
                    Some(previous) if offset > previous => offset - previous - 1,
                    Some(_) => return Err(Error::FrameOrder(offset)),
                };
                previous_frame = Some(offset);

                let frame = frame.map(
                    &mut |class: &String| -> Result<ClassConstantIndex, Error> {
                        Ok(constants.get_class(class)?)
                    },
                    &mut |label: &Label| -> Result<u16, Error> {
                        Ok(layout.bytecode_index(*label)?.0)
                    },
                )?;
                stack_map_frames.push(frame.into_stack_map_frame(offset_delta as u16)?);
            }
            _ => (),
        }
    }

    let mut attributes = vec![];
    if !line_numbers.is_empty() {
        attributes.push(constants.get_attribute(LineNumberTable(line_numbers))?);
    }
    if !stack_map_frames.is_empty() {
        attributes.push(constants.get_attribute(StackMapTable(stack_map_frames))?);
    }

    Ok(class_file::Code {
        max_stack: method.max_stack,
        max_locals: method.max_locals,
        code_array: BytecodeArray(code_array),
        exception_table,
        attributes,
    })
}

/// Offset of every position in the instruction sequence (plus one for the end)
struct Layout<'a> {
    offsets: Vec<usize>,
    label_positions: &'a HashMap<Label, usize>,
}

impl<'a> Layout<'a> {
    fn compute(
        instructions: &[Instruction],
        label_positions: &'a HashMap<Label, usize>,
        wide_jumps: &HashSet<usize>,
        constants: &mut ConstantsPool,
    ) -> Result<Layout<'a>, Error> {
        let mut offsets = Vec::with_capacity(instructions.len() + 1);
        let mut scratch = vec![];
        for (position, insn) in instructions.iter().enumerate() {
            let offset = scratch.len();
            offsets.push(offset);

            // Jump widths don't depend on where the target is, so any label offset will do
            encode_instruction(
                insn,
                offset,
                wide_jumps.contains(&position),
                constants,
                |_| Ok(offset),
                &mut scratch,
            )?;
        }
        if scratch.len() > u16::MAX as usize {
            return Err(Error::MethodCodeOverflow(scratch.len()));
        }
        offsets.push(scratch.len());

        Ok(Layout {
            offsets,
            label_positions,
        })
    }

    fn label_offset(&self, label: Label) -> Result<usize, Error> {
        match self.label_positions.get(&label) {
            Some(position) => Ok(self.offsets[*position]),
            None => Err(Error::MissingLabel(label)),
        }
    }

    fn bytecode_index(&self, label: Label) -> Result<BytecodeIndex, Error> {
        Ok(BytecodeIndex(self.label_offset(label)? as u16))
    }
}

fn is_wide_jump(opcode: Opcode) -> bool {
    opcode == Opcode::GOTO_W || opcode == Opcode::JSR_W
}

/// Is there a frame marker between the instruction at `position` and the next real instruction?
fn frame_follows(instructions: &[Instruction], position: usize) -> bool {
    instructions[position + 1..]
        .iter()
        .take_while(|insn| insn.is_marker())
        .any(|insn| matches!(insn, Instruction::Frame(_)))
}

/// Encode one instruction at `offset` (markers produce no bytes)
///
/// Short forms (`iload_0`), `wide`, and the `ldc` variant are picked based on the operands.
fn encode_instruction<F>(
    insn: &Instruction,
    offset: usize,
    wide_jump: bool,
    constants: &mut ConstantsPool,
    label_offset: F,
    out: &mut Vec<u8>,
) -> Result<(), Error>
where
    F: Fn(Label) -> Result<usize, Error>,
{
    let relative = |label: Label| -> Result<i64, Error> {
        Ok(label_offset(label)? as i64 - offset as i64)
    };
    let overflow = |opcode: Opcode, operand: i64| Error::OperandOverflow { opcode, operand };

    match insn {
        Instruction::Simple(opcode) => opcode.0.serialize(out)?,

        Instruction::Int(opcode, value) => {
            opcode.0.serialize(out)?;
            match *opcode {
                Opcode::BIPUSH => i8::try_from(*value)
                    .map_err(|_| overflow(*opcode, *value as i64))?
                    .serialize(out)?,
                Opcode::SIPUSH => i16::try_from(*value)
                    .map_err(|_| overflow(*opcode, *value as i64))?
                    .serialize(out)?,
                _ => u8::try_from(*value)
                    .map_err(|_| overflow(*opcode, *value as i64))?
                    .serialize(out)?,
            }
        }

        Instruction::Var(opcode, index) => {
            let load_store_base = match opcode.0 {
                0x15..=0x19 => Some((Opcode::ILOAD.0, 0x1a)),
                0x36..=0x3a => Some((Opcode::ISTORE.0, 0x3b)),
                _ => None,
            };
            match (load_store_base, u8::try_from(*index)) {
                (Some((base, short_base)), _) if *index <= 3 => {
                    (short_base + (opcode.0 - base) * 4 + *index as u8).serialize(out)?
                }
                (_, Ok(index)) => {
                    opcode.0.serialize(out)?;
                    index.serialize(out)?;
                }
                (_, Err(_)) => {
                    Opcode::WIDE.0.serialize(out)?;
                    opcode.0.serialize(out)?;
                    index.serialize(out)?;
                }
            }
        }

        Instruction::Type(opcode, class) => {
            opcode.0.serialize(out)?;
            constants.get_class(class)?.serialize(out)?;
        }

        Instruction::Field(opcode, field) => {
            opcode.0.serialize(out)?;
            field.constant_index(constants)?.serialize(out)?;
        }

        Instruction::Method(opcode, method) => {
            opcode.0.serialize(out)?;
            method.constant_index(constants)?.serialize(out)?;
            if *opcode == Opcode::INVOKEINTERFACE {
                argument_slots(&method.descriptor)?.serialize(out)?;
                0u8.serialize(out)?;
            }
        }

        Instruction::InvokeDynamic(indy) => {
            let bootstrap_method =
                constants.get_bootstrap_method(&indy.bootstrap_method, &indy.bootstrap_arguments)?;
            let name_and_type = constants.get_name_and_type(&indy.name, &indy.descriptor)?;
            Opcode::INVOKEDYNAMIC.0.serialize(out)?;
            constants
                .get_invoke_dynamic(bootstrap_method, name_and_type)?
                .serialize(out)?;
            0u16.serialize(out)?;
        }

        Instruction::Jump(opcode, target) => {
            let delta = relative(*target)?;
            if let (true, Some(inverted)) = (wide_jump, opcode.inverted_branch()) {
                // Skip the 3 bytes of this branch and the 5 bytes of the `goto_w`
                inverted.0.serialize(out)?;
                8i16.serialize(out)?;
                Opcode::GOTO_W.0.serialize(out)?;
                ((delta - 3) as i32).serialize(out)?;
            } else if wide_jump || is_wide_jump(*opcode) {
                let wide_opcode = if *opcode == Opcode::JSR || *opcode == Opcode::JSR_W {
                    Opcode::JSR_W
                } else {
                    Opcode::GOTO_W
                };
                wide_opcode.0.serialize(out)?;
                (delta as i32).serialize(out)?;
            } else {
                let target = label_offset(*target)?;
                let delta = i16::try_from(delta).map_err(|_| Error::JumpOverflow {
                    opcode: *opcode,
                    offset,
                    target,
                })?;
                opcode.0.serialize(out)?;
                delta.serialize(out)?;
            }
        }

        Instruction::TableSwitch(switch) => {
            let expected = switch.high as i64 - switch.low as i64 + 1;
            if expected != switch.targets.len() as i64 {
                return Err(Error::InvalidSwitch(offset));
            }
            Opcode::TABLESWITCH.0.serialize(out)?;
            pad_to_alignment(out);
            (relative(switch.default)? as i32).serialize(out)?;
            switch.low.serialize(out)?;
            switch.high.serialize(out)?;
            for target in &switch.targets {
                (relative(*target)? as i32).serialize(out)?;
            }
        }

        Instruction::LookupSwitch(switch) => {
            if switch.keys.len() != switch.targets.len() {
                return Err(Error::InvalidSwitch(offset));
            }
            Opcode::LOOKUPSWITCH.0.serialize(out)?;
            pad_to_alignment(out);
            (relative(switch.default)? as i32).serialize(out)?;
            (switch.keys.len() as i32).serialize(out)?;
            for (key, target) in switch.keys.iter().zip(&switch.targets) {
                key.serialize(out)?;
                (relative(*target)? as i32).serialize(out)?;
            }
        }

        Instruction::Iinc { index, increment } => {
            match (u8::try_from(*index), i8::try_from(*increment)) {
                (Ok(index), Ok(increment)) => {
                    Opcode::IINC.0.serialize(out)?;
                    index.serialize(out)?;
                    increment.serialize(out)?;
                }
                _ => {
                    Opcode::WIDE.0.serialize(out)?;
                    Opcode::IINC.0.serialize(out)?;
                    index.serialize(out)?;
                    increment.serialize(out)?;
                }
            }
        }

        Instruction::MultiANewArray {
            descriptor,
            dimensions,
        } => {
            Opcode::MULTIANEWARRAY.0.serialize(out)?;
            constants.get_class(descriptor)?.serialize(out)?;
            dimensions.serialize(out)?;
        }

        Instruction::Ldc(constant) => {
            let index: ConstantIndex = constant.constant_index(constants)?;
            if is_two_slots(constant) {
                Opcode::LDC2_W.0.serialize(out)?;
                index.serialize(out)?;
            } else if let Ok(short_index) = u8::try_from(index.0) {
                Opcode::LDC.0.serialize(out)?;
                short_index.serialize(out)?;
            } else {
                Opcode::LDC_W.0.serialize(out)?;
                index.serialize(out)?;
            }
        }

        Instruction::Label(_) | Instruction::LineNumber { .. } | Instruction::Frame(_) => (),
    }

    Ok(())
}

/// Is the constant a `long` or `double` (which must be loaded with `ldc2_w`)?
fn is_two_slots(constant: &ConstantData) -> bool {
    match constant {
        ConstantData::Long(_) | ConstantData::Double(_) => true,
        ConstantData::Dynamic(dynamic) => dynamic.descriptor == "J" || dynamic.descriptor == "D",
        _ => false,
    }
}

/// Switch operands start at the next multiple of 4 from the start of the code
fn pad_to_alignment(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// Count for `invokeinterface`: one for the receiver plus the size of the arguments
fn argument_slots(descriptor: &str) -> Result<u8, Error> {
    let bad_descriptor = || Error::BadDescriptor(descriptor.to_owned());
    let arguments = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .map(|(arguments, _)| arguments)
        .ok_or_else(bad_descriptor)?;

    let mut slots: usize = 1;
    let mut chars = arguments.chars();
    while let Some(c) = chars.next() {
        match c {
            'J' | 'D' => slots += 2,
            'B' | 'C' | 'F' | 'I' | 'S' | 'Z' => slots += 1,
            'L' => {
                chars.by_ref().find(|c| *c == ';').ok_or_else(bad_descriptor)?;
                slots += 1;
            }
            '[' => {
                let mut element = chars.next();
                while element == Some('[') {
                    element = chars.next();
                }
                match element {
                    Some('L') => {
                        chars.by_ref().find(|c| *c == ';').ok_or_else(bad_descriptor)?;
                    }
                    Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => (),
                    _ => return Err(bad_descriptor()),
                }
                slots += 1;
            }
            _ => return Err(bad_descriptor()),
        }
    }
    u8::try_from(slots).map_err(|_| bad_descriptor())
}
