use jardelta::jvm::code::{
    equivalent_code, ExceptionHandler, Instruction, Label, LabelGenerator, Opcode,
    SequentialLabels,
};
use proptest::prelude::*;

/// Shape of an instruction, before labels are chosen
#[derive(Debug, Clone)]
enum Step {
    Plain(usize),
    Push(i32),
    Load(u16),
    Goto(usize),
    Mark,
}

const PLAIN: [Opcode; 7] = [
    Opcode::NOP,
    Opcode::POP,
    Opcode::DUP,
    Opcode::IADD,
    Opcode::ICONST_0,
    Opcode::ICONST_1,
    Opcode::RETURN,
];

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..PLAIN.len()).prop_map(Step::Plain),
        (-128..128i32).prop_map(Step::Push),
        (0..8u16).prop_map(Step::Load),
        any::<usize>().prop_map(Step::Goto),
        Just(Step::Mark),
    ]
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(step(), 1..40)
}

fn mark_count(steps: &[Step]) -> usize {
    steps
        .iter()
        .filter(|step| matches!(step, Step::Mark))
        .count()
}

/// `count` distinct labels, starting after skipping `skip` labels, optionally reversed
fn labels(count: usize, skip: usize, reversed: bool) -> Vec<Label> {
    let mut generator = SequentialLabels::default();
    for _ in 0..skip {
        generator.fresh_label();
    }
    let mut labels: Vec<Label> = (0..count).map(|_| generator.fresh_label()).collect();
    if reversed {
        labels.reverse();
    }
    labels
}

/// Build a body, placing `labels` in order at the marks
fn body(steps: &[Step], labels: &[Label]) -> (Vec<Instruction>, Vec<ExceptionHandler>) {
    let mut next_mark = 0;
    let instructions = steps
        .iter()
        .map(|step| match step {
            Step::Plain(index) => Instruction::Simple(PLAIN[*index]),
            Step::Push(value) => Instruction::Int(Opcode::BIPUSH, *value),
            Step::Load(index) => Instruction::Var(Opcode::ILOAD, *index),
            Step::Goto(_) if labels.is_empty() => Instruction::Simple(Opcode::NOP),
            Step::Goto(target) => Instruction::Jump(Opcode::GOTO, labels[target % labels.len()]),
            Step::Mark => {
                let label = labels[next_mark];
                next_mark += 1;
                Instruction::Label(label)
            }
        })
        .collect();

    let handlers = if labels.len() >= 2 {
        vec![ExceptionHandler {
            start: labels[0],
            end: labels[labels.len() - 1],
            handler: labels[labels.len() - 1],
            catch_type: Some(String::from("java/lang/Throwable")),
        }]
    } else {
        vec![]
    };
    (instructions, handlers)
}

fn canonical(steps: &[Step]) -> (Vec<Instruction>, Vec<ExceptionHandler>) {
    body(steps, &labels(mark_count(steps), 0, false))
}

proptest! {
    #[test]
    fn reflexive(steps in steps()) {
        let (instructions, handlers) = canonical(&steps);
        prop_assert!(equivalent_code(&instructions, &instructions, &handlers, &handlers));
    }

    #[test]
    fn label_numbering_is_irrelevant(steps in steps(), skip in 0..50usize) {
        let (left, left_handlers) = canonical(&steps);
        let (right, right_handlers) = body(&steps, &labels(mark_count(&steps), skip, true));
        prop_assert!(equivalent_code(&left, &right, &left_handlers, &right_handlers));
        prop_assert!(equivalent_code(&right, &left, &right_handlers, &left_handlers));
    }

    #[test]
    fn insertion_is_detected(
        steps in steps(),
        position in any::<prop::sample::Index>(),
        inserted in step(),
    ) {
        let (left, handlers) = canonical(&steps);
        let mut right = left.clone();
        let (extra, _) = body(&[inserted], &labels(1, 1000, false));
        right.insert(position.index(right.len() + 1), extra[0].clone());
        prop_assert!(!equivalent_code(&left, &right, &handlers, &handlers));
        prop_assert!(!equivalent_code(&right, &left, &handlers, &handlers));
    }

    #[test]
    fn removal_is_detected(steps in steps(), position in any::<prop::sample::Index>()) {
        let (left, handlers) = canonical(&steps);
        let mut right = left.clone();
        right.remove(position.index(right.len()));
        prop_assert!(!equivalent_code(&left, &right, &handlers, &handlers));
    }

    #[test]
    fn swap_is_detected(
        steps in steps(),
        first in any::<prop::sample::Index>(),
        second in any::<prop::sample::Index>(),
    ) {
        let (left, handlers) = canonical(&steps);
        let real: Vec<usize> = (0..left.len())
            .filter(|i| !matches!(left[*i], Instruction::Label(_)))
            .collect();
        prop_assume!(real.len() >= 2);

        let (i, j) = (real[first.index(real.len())], real[second.index(real.len())]);
        prop_assume!(left[i] != left[j]);

        let mut right = left.clone();
        right.swap(i, j);
        prop_assert!(!equivalent_code(&left, &right, &handlers, &handlers));
    }
}

#[test]
fn jump_to_a_different_position() {
    let mut generator = SequentialLabels::default();
    let (first, second) = (generator.fresh_label(), generator.fresh_label());
    let layout = |target: Label| {
        vec![
            Instruction::Label(first),
            Instruction::Simple(Opcode::NOP),
            Instruction::Label(second),
            Instruction::Jump(Opcode::GOTO, target),
        ]
    };
    assert!(!equivalent_code(&layout(first), &layout(second), &[], &[]));
    assert!(equivalent_code(&layout(second), &layout(second), &[], &[]));
}
