use std::fmt;

/// Opaque label
///
/// Labels only mean something within the method body that declares them: two independently
/// decoded methods can (and usually do) reuse the same labels for different positions.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(u32);

impl Label {
    /// First label handed out by a fresh generator
    pub const START: Label = Label(0);

    /// Get the next fresh label
    pub fn next(&self) -> Label {
        Label(self.0 + 1)
    }
}

/// Generates new labels
pub trait LabelGenerator {
    /// Generate a fresh label
    fn fresh_label(&mut self) -> Label;
}

/// Label generator producing labels in increasing order
///
/// Cloning does not split the generator source - the cloned generator will produce the same
/// sequence of labels as the original.
#[derive(Clone)]
pub struct SequentialLabels(Label);

impl SequentialLabels {
    pub fn new(start: Label) -> SequentialLabels {
        SequentialLabels(start)
    }
}

impl Default for SequentialLabels {
    fn default() -> Self {
        SequentialLabels::new(Label::START)
    }
}

impl LabelGenerator for SequentialLabels {
    fn fresh_label(&mut self) -> Label {
        let to_return = self.0;
        self.0 = self.0.next();
        to_return
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("L{}", self.0))
    }
}
