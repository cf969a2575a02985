//! Structural equivalence of method bodies
//!
//! Two method bodies decoded from different class files will almost never share labels, even
//! when the bytecode is identical. Instead of comparing labels, every label is replaced by the
//! position of its marker in its own instruction sequence. Jumps, switches, and exception
//! handler ranges are then equivalent if they point to the same positions.
//!
//! The comparison is strictly positional: there is no attempt to align sequences of different
//! lengths. Any insertion or removal means the bodies are different.

use crate::jvm::code::{ExceptionHandler, Instruction, Label};
use std::collections::HashMap;

/// Position of every label marker within one instruction sequence
struct LabelPositions(HashMap<Label, usize>);

impl LabelPositions {
    fn new(instructions: &[Instruction]) -> LabelPositions {
        let positions = instructions
            .iter()
            .enumerate()
            .filter_map(|(position, instruction)| match instruction {
                Instruction::Label(label) => Some((*label, position)),
                _ => None,
            })
            .collect();
        LabelPositions(positions)
    }

    fn get(&self, label: &Label) -> Option<usize> {
        self.0.get(label).copied()
    }
}

/// Label positions of the two sides being compared
struct Correspondence {
    left: LabelPositions,
    right: LabelPositions,
}

impl Correspondence {
    /// Labels correspond if they are placed at the same position
    ///
    /// A label that is never placed does not correspond to anything (not even another unplaced
    /// label).
    fn same_target(&self, left: &Label, right: &Label) -> bool {
        match (self.left.get(left), self.right.get(right)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    fn same_targets(&self, left: &[Label], right: &[Label]) -> bool {
        left.len() == right.len()
            && left
                .iter()
                .zip(right)
                .all(|(left, right)| self.same_target(left, right))
    }

    fn same_instruction(&self, left: &Instruction, right: &Instruction) -> bool {
        use Instruction::*;

        if left.opcode() != right.opcode() || left.kind() != right.kind() {
            return false;
        }

        match (left, right) {
            (Simple(_), Simple(_)) => true,
            (Int(_, l), Int(_, r)) => l == r,
            (Var(_, l), Var(_, r)) => l == r,
            (Type(_, l), Type(_, r)) => l == r,
            (Field(_, l), Field(_, r)) => l == r,
            (Method(_, l), Method(_, r)) => l == r,
            (InvokeDynamic(l), InvokeDynamic(r)) => l == r,
            (Jump(_, l), Jump(_, r)) => self.same_target(l, r),
            (TableSwitch(l), TableSwitch(r)) => {
                l.low == r.low
                    && l.high == r.high
                    && self.same_target(&l.default, &r.default)
                    && self.same_targets(&l.targets, &r.targets)
            }
            (LookupSwitch(l), LookupSwitch(r)) => {
                l.keys == r.keys
                    && self.same_target(&l.default, &r.default)
                    && self.same_targets(&l.targets, &r.targets)
            }
            (
                Iinc {
                    index: l_index,
                    increment: l_increment,
                },
                Iinc {
                    index: r_index,
                    increment: r_increment,
                },
            ) => l_index == r_index && l_increment == r_increment,
            (
                MultiANewArray {
                    descriptor: l_descriptor,
                    dimensions: l_dimensions,
                },
                MultiANewArray {
                    descriptor: r_descriptor,
                    dimensions: r_dimensions,
                },
            ) => l_descriptor == r_descriptor && l_dimensions == r_dimensions,
            (Ldc(l), Ldc(r)) => l == r,

            // Markers carry no semantics of their own. Frames are determined by the surrounding
            // instructions, so if those all match, the frames are assumed to match too.
            (Label(_), Label(_)) | (LineNumber { .. }, LineNumber { .. }) | (Frame(_), Frame(_)) => {
                true
            }

            _ => false,
        }
    }

    fn same_handler(&self, left: &ExceptionHandler, right: &ExceptionHandler) -> bool {
        left.catch_type == right.catch_type
            && self.same_target(&left.start, &right.start)
            && self.same_target(&left.end, &right.end)
            && self.same_target(&left.handler, &right.handler)
    }
}

/// Decide whether two method bodies are structurally equivalent
///
/// Bodies are equivalent when they have the same number of instructions and handlers, every pair
/// of instructions at the same position is equivalent, and every pair of handlers at the same
/// position covers the same positions and catches the same type.
pub fn equivalent_code(
    left_instructions: &[Instruction],
    right_instructions: &[Instruction],
    left_handlers: &[ExceptionHandler],
    right_handlers: &[ExceptionHandler],
) -> bool {
    if left_instructions.len() != right_instructions.len()
        || left_handlers.len() != right_handlers.len()
    {
        return false;
    }

    let correspondence = Correspondence {
        left: LabelPositions::new(left_instructions),
        right: LabelPositions::new(right_instructions),
    };

    left_instructions
        .iter()
        .zip(right_instructions)
        .all(|(left, right)| correspondence.same_instruction(left, right))
        && left_handlers
            .iter()
            .zip(right_handlers)
            .all(|(left, right)| correspondence.same_handler(left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::code::{
        Frame, LabelGenerator, LookupSwitch, MethodRef, Opcode, SequentialLabels, TableSwitch,
        VerificationType,
    };
    use crate::jvm::model::ConstantData;
    use Instruction::*;

    /// `if (x != 0) { return 1 } else { return 0 }` with the given labels
    fn branchy(else_label: super::Label) -> Vec<Instruction> {
        vec![
            Var(Opcode::ILOAD, 0),
            Jump(Opcode::IFEQ, else_label),
            Simple(Opcode::ICONST_1),
            Simple(Opcode::IRETURN),
            Label(else_label),
            Frame(Frame::Same),
            Simple(Opcode::ICONST_0),
            Simple(Opcode::IRETURN),
        ]
    }

    #[test]
    fn reflexive() {
        let body = branchy(super::Label::START);
        assert!(equivalent_code(&body, &body, &[], &[]));
    }

    #[test]
    fn renumbered_labels() {
        let mut labels = SequentialLabels::default();
        let first = labels.fresh_label();
        let second = labels.fresh_label();
        assert!(equivalent_code(&branchy(first), &branchy(second), &[], &[]));
    }

    #[test]
    fn jump_to_different_position() {
        let mut labels = SequentialLabels::default();
        let target = labels.fresh_label();
        let left = branchy(target);
        let mut right = branchy(target);

        // Move the label one slot down: same instructions, different jump target position
        right.swap(4, 5);
        assert!(!equivalent_code(&left, &right, &[], &[]));
    }

    #[test]
    fn different_counts() {
        let left = vec![Simple(Opcode::RETURN)];
        let right = vec![Simple(Opcode::NOP), Simple(Opcode::RETURN)];
        assert!(!equivalent_code(&left, &right, &[], &[]));
    }

    #[test]
    fn different_operands() {
        let left = vec![Var(Opcode::ILOAD, 1)];
        let right = vec![Var(Opcode::ILOAD, 2)];
        assert!(!equivalent_code(&left, &right, &[], &[]));

        let left = vec![Var(Opcode::ILOAD, 1)];
        let right = vec![Var(Opcode::FLOAD, 1)];
        assert!(!equivalent_code(&left, &right, &[], &[]));

        let left = vec![Ldc(ConstantData::String("a".into()))];
        let right = vec![Ldc(ConstantData::String("b".into()))];
        assert!(!equivalent_code(&left, &right, &[], &[]));

        let method = |is_interface| MethodRef {
            owner: String::from("java/util/List"),
            name: String::from("size"),
            descriptor: String::from("()I"),
            is_interface,
        };
        let left = vec![Method(Opcode::INVOKEINTERFACE, method(true))];
        let right = vec![Method(Opcode::INVOKEINTERFACE, method(false))];
        assert!(!equivalent_code(&left, &right, &[], &[]));
    }

    #[test]
    fn markers_ignore_their_payload() {
        let mut labels = SequentialLabels::default();
        let start = labels.fresh_label();
        let left = vec![
            Label(start),
            LineNumber { line: 3, start },
            Frame(Frame::Same),
            Simple(Opcode::RETURN),
        ];
        let right = vec![
            Label(start),
            LineNumber { line: 42, start },
            Frame(Frame::Full {
                locals: vec![VerificationType::Integer],
                stack: vec![],
            }),
            Simple(Opcode::RETURN),
        ];
        assert!(equivalent_code(&left, &right, &[], &[]));
    }

    #[test]
    fn markers_are_not_interchangeable() {
        let left = vec![Label(super::Label::START), Simple(Opcode::RETURN)];
        let right = vec![Frame(Frame::Same), Simple(Opcode::RETURN)];
        assert!(!equivalent_code(&left, &right, &[], &[]));
    }

    #[test]
    fn switches() {
        let mut labels = SequentialLabels::default();
        let (a, b, c) = (
            labels.fresh_label(),
            labels.fresh_label(),
            labels.fresh_label(),
        );
        let body = |switch: Instruction| {
            vec![
                Var(Opcode::ILOAD, 0),
                switch,
                Label(a),
                Simple(Opcode::RETURN),
                Label(b),
                Simple(Opcode::RETURN),
                Label(c),
                Simple(Opcode::RETURN),
            ]
        };
        let table = |targets: Vec<super::Label>| {
            TableSwitch(TableSwitch {
                low: 0,
                high: 1,
                default: c,
                targets,
            })
        };
        assert!(equivalent_code(
            &body(table(vec![a, b])),
            &body(table(vec![a, b])),
            &[],
            &[]
        ));
        assert!(!equivalent_code(
            &body(table(vec![a, b])),
            &body(table(vec![b, a])),
            &[],
            &[]
        ));

        let lookup = |keys: Vec<i32>| {
            LookupSwitch(LookupSwitch {
                default: c,
                keys,
                targets: vec![a, b],
            })
        };
        assert!(equivalent_code(
            &body(lookup(vec![1, 10])),
            &body(lookup(vec![1, 10])),
            &[],
            &[]
        ));
        assert!(!equivalent_code(
            &body(lookup(vec![1, 10])),
            &body(lookup(vec![1, 11])),
            &[],
            &[]
        ));
    }

    #[test]
    fn exception_handlers() {
        let mut labels = SequentialLabels::default();
        let (start, end, handler) = (
            labels.fresh_label(),
            labels.fresh_label(),
            labels.fresh_label(),
        );
        let body = vec![
            Label(start),
            Simple(Opcode::NOP),
            Label(end),
            Simple(Opcode::RETURN),
            Label(handler),
            Simple(Opcode::ATHROW),
        ];
        let catching = |catch_type: Option<&str>, handler| ExceptionHandler {
            start,
            end,
            handler,
            catch_type: catch_type.map(String::from),
        };

        let left = [catching(Some("java/lang/Exception"), handler)];
        assert!(equivalent_code(&body, &body, &left, &left));

        let right = [catching(None, handler)];
        assert!(!equivalent_code(&body, &body, &left, &right));

        let right = [catching(Some("java/lang/Exception"), end)];
        assert!(!equivalent_code(&body, &body, &left, &right));

        assert!(!equivalent_code(&body, &body, &left, &[]));
    }

    #[test]
    fn unplaced_labels_never_match() {
        let mut labels = SequentialLabels::default();
        let placed = labels.fresh_label();
        let unplaced = labels.fresh_label();
        let body = vec![
            Label(placed),
            Jump(Opcode::GOTO, unplaced),
            Simple(Opcode::RETURN),
        ];
        assert!(!equivalent_code(&body, &body, &[], &[]));
    }
}
