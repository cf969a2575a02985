use crate::jvm::class_file::{ClassConstantIndex, Deserialize, Serialize, StackMapFrame};
use crate::jvm::code::Label;
use crate::jvm::Error;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// These types are from [this hierarchy][0]
///
/// In the class model, `Cls` is the internal name of the class and `U` is the label placed at
/// the `new` instruction of an uninitialized object. In a class file, they are respectively a
/// class constant and a bytecode offset.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls = String, U = Label> {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),

    /// State of an object after `new` has been called but `<init>` has not been called
    Uninitialized(U),
}

impl<Cls, U> VerificationType<Cls, U> {
    /// Change the representation of classes and uninitialized offsets
    pub fn map<Cls2, U2, E, F, G>(
        &self,
        map_class: &mut F,
        map_uninitialized: &mut G,
    ) -> Result<VerificationType<Cls2, U2>, E>
    where
        F: FnMut(&Cls) -> Result<Cls2, E>,
        G: FnMut(&U) -> Result<U2, E>,
    {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)?),
            VerificationType::Uninitialized(u) => {
                VerificationType::Uninitialized(map_uninitialized(u)?)
            }
        })
    }
}

impl Serialize for VerificationType<ClassConstantIndex, u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationType::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for VerificationType<ClassConstantIndex, u16> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(match u8::deserialize(reader)? {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(ClassConstantIndex::deserialize(reader)?),
            8 => VerificationType::Uninitialized(u16::deserialize(reader)?),
            other => return Err(Error::UnknownVerificationType(other)),
        })
    }
}

/// Stack map frame, as it appears inline in an instruction sequence
///
/// Unlike [`StackMapFrame`], this does not store the offset delta: that is implied by where the
/// frame marker is placed. The compressed frame kind is preserved as-is from the class file.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Frame<Cls = String, U = Label> {
    /// Same locals as the previous frame and an empty stack
    Same,

    /// Same locals as the previous frame and exactly one stack entry
    SameLocalsOneStack(VerificationType<Cls, U>),

    /// Previous frame without the last `1` to `3` locals and an empty stack
    Chop(u8),

    /// Previous frame with `1` to `3` extra locals and an empty stack
    Append(Vec<VerificationType<Cls, U>>),

    /// Frame has exactly the locals and stack specified
    Full {
        locals: Vec<VerificationType<Cls, U>>,
        stack: Vec<VerificationType<Cls, U>>,
    },
}

impl<Cls, U> Frame<Cls, U> {
    /// Change the representation of classes and uninitialized offsets
    pub fn map<Cls2, U2, E, F, G>(
        &self,
        map_class: &mut F,
        map_uninitialized: &mut G,
    ) -> Result<Frame<Cls2, U2>, E>
    where
        F: FnMut(&Cls) -> Result<Cls2, E>,
        G: FnMut(&U) -> Result<U2, E>,
    {
        Ok(match self {
            Frame::Same => Frame::Same,
            Frame::SameLocalsOneStack(stack) => {
                Frame::SameLocalsOneStack(stack.map(map_class, map_uninitialized)?)
            }
            Frame::Chop(chopped_k) => Frame::Chop(*chopped_k),
            Frame::Append(locals) => Frame::Append(map_all(locals, map_class, map_uninitialized)?),
            Frame::Full { locals, stack } => Frame::Full {
                locals: map_all(locals, map_class, map_uninitialized)?,
                stack: map_all(stack, map_class, map_uninitialized)?,
            },
        })
    }
}

fn map_all<Cls, U, Cls2, U2, E, F, G>(
    types: &[VerificationType<Cls, U>],
    map_class: &mut F,
    map_uninitialized: &mut G,
) -> Result<Vec<VerificationType<Cls2, U2>>, E>
where
    F: FnMut(&Cls) -> Result<Cls2, E>,
    G: FnMut(&U) -> Result<U2, E>,
{
    types
        .iter()
        .map(|typ| typ.map(map_class, map_uninitialized))
        .collect()
}

impl Frame<ClassConstantIndex, u16> {
    /// Split a class file frame into its offset delta and its contents
    pub fn from_stack_map_frame(frame: StackMapFrame) -> (u16, Self) {
        match frame {
            StackMapFrame::SameLocalsNoStack { offset_delta } => (offset_delta, Frame::Same),
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => (offset_delta, Frame::SameLocalsOneStack(stack)),
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => (offset_delta, Frame::Chop(chopped_k)),
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => (offset_delta, Frame::Append(locals)),
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => (offset_delta, Frame::Full { locals, stack }),
        }
    }

    /// Turn the frame back into a class file frame
    ///
    /// Chop and append frames can only express 1 to 3 locals.
    pub fn into_stack_map_frame(self, offset_delta: u16) -> Result<StackMapFrame, Error> {
        Ok(match self {
            Frame::Same => StackMapFrame::SameLocalsNoStack { offset_delta },
            Frame::SameLocalsOneStack(stack) => StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            },
            Frame::Chop(chopped_k) if (1..=3).contains(&chopped_k) => {
                StackMapFrame::ChopLocalsNoStack {
                    offset_delta,
                    chopped_k,
                }
            }
            Frame::Chop(chopped_k) => {
                return Err(Error::InvalidFrame(format!("chop of {} locals", chopped_k)))
            }
            Frame::Append(locals) if (1..=3).contains(&locals.len()) => {
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals,
                }
            }
            Frame::Append(locals) => {
                return Err(Error::InvalidFrame(format!(
                    "append of {} locals",
                    locals.len()
                )))
            }
            Frame::Full { locals, stack } => StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            },
        })
    }
}
