use crate::jvm::class_file;
use crate::jvm::class_file::{ConstantIndex, ConstantsPool, ConstantsReader};
use crate::jvm::model::constant::{f32_bits, f64_bits};
use crate::jvm::{Error, JavaString};

/// Value of an annotation element, as in an `AnnotationDefault` attribute
///
/// The sub-int primitives keep the full `int` stored in the constant pool, so that reading then
/// writing an element does not change its bytes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ElementValue {
    Byte(i32),
    Char(i32),
    Short(i32),
    Boolean(i32),
    Int(i32),
    Long(i64),
    #[serde(with = "f32_bits")]
    Float(f32),
    #[serde(with = "f64_bits")]
    Double(f64),
    String(JavaString),

    /// Enum constant, given by the enum type descriptor and the constant name
    Enum {
        descriptor: String,
        name: String,
    },

    /// Class literal, given as a return descriptor (eg. `V` or `Ljava/lang/String;`)
    Class(String),

    Annotation(Annotation),

    Array(Vec<ElementValue>),
}

impl PartialEq for ElementValue {
    fn eq(&self, other: &ElementValue) -> bool {
        use ElementValue::*;
        match (self, other) {
            (Byte(v1), Byte(v2))
            | (Char(v1), Char(v2))
            | (Short(v1), Short(v2))
            | (Boolean(v1), Boolean(v2))
            | (Int(v1), Int(v2)) => v1 == v2,
            (Long(v1), Long(v2)) => v1 == v2,
            (Float(v1), Float(v2)) => v1.to_bits() == v2.to_bits(),
            (Double(v1), Double(v2)) => v1.to_bits() == v2.to_bits(),
            (String(s1), String(s2)) => s1 == s2,
            (
                Enum {
                    descriptor: d1,
                    name: n1,
                },
                Enum {
                    descriptor: d2,
                    name: n2,
                },
            ) => d1 == d2 && n1 == n2,
            (Class(c1), Class(c2)) => c1 == c2,
            (Annotation(a1), Annotation(a2)) => a1 == a2,
            (Array(e1), Array(e2)) => e1 == e2,
            _ => false,
        }
    }
}

impl Eq for ElementValue {}

/// Annotation, as nested inside an element value
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    /// Field descriptor of the annotation type
    pub descriptor: String,

    /// Element names and values, in class file order
    pub elements: Vec<(String, ElementValue)>,
}

impl ElementValue {
    /// Resolve a class file element value against its constant pool
    pub fn read(
        value: &class_file::ElementValue,
        constants: &ConstantsReader,
    ) -> Result<ElementValue, Error> {
        Ok(match value {
            class_file::ElementValue::Constant { tag, value } => {
                read_constant(*tag, *value, constants)?
            }
            class_file::ElementValue::Enum {
                type_name,
                const_name,
            } => ElementValue::Enum {
                descriptor: constants.utf8(*type_name)?,
                name: constants.utf8(*const_name)?,
            },
            class_file::ElementValue::Class(descriptor) => {
                ElementValue::Class(constants.utf8(*descriptor)?)
            }
            class_file::ElementValue::Annotation(annotation) => {
                ElementValue::Annotation(Annotation::read(annotation, constants)?)
            }
            class_file::ElementValue::Array(values) => ElementValue::Array(
                values
                    .iter()
                    .map(|value| ElementValue::read(value, constants))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Add the constants used by the value to the pool and build the class file element value
    pub fn write(&self, constants: &mut ConstantsPool) -> Result<class_file::ElementValue, Error> {
        let constant = |tag: u8, value: ConstantIndex| class_file::ElementValue::Constant { tag, value };
        Ok(match self {
            ElementValue::Byte(v) => constant(b'B', constants.get_integer(*v)?),
            ElementValue::Char(v) => constant(b'C', constants.get_integer(*v)?),
            ElementValue::Short(v) => constant(b'S', constants.get_integer(*v)?),
            ElementValue::Boolean(v) => constant(b'Z', constants.get_integer(*v)?),
            ElementValue::Int(v) => constant(b'I', constants.get_integer(*v)?),
            ElementValue::Long(v) => constant(b'J', constants.get_long(*v)?),
            ElementValue::Float(v) => constant(b'F', constants.get_float(*v)?),
            ElementValue::Double(v) => constant(b'D', constants.get_double(*v)?),
            ElementValue::String(string) => constant(b's', constants.get_java_utf8(string)?.0),
            ElementValue::Enum { descriptor, name } => class_file::ElementValue::Enum {
                type_name: constants.get_utf8(descriptor.as_str())?,
                const_name: constants.get_utf8(name.as_str())?,
            },
            ElementValue::Class(descriptor) => {
                class_file::ElementValue::Class(constants.get_utf8(descriptor.as_str())?)
            }
            ElementValue::Annotation(annotation) => {
                class_file::ElementValue::Annotation(annotation.write(constants)?)
            }
            ElementValue::Array(values) => class_file::ElementValue::Array(
                values
                    .iter()
                    .map(|value| value.write(constants))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

fn read_constant(
    tag: u8,
    index: ConstantIndex,
    constants: &ConstantsReader,
) -> Result<ElementValue, Error> {
    use class_file::Constant;

    let bad_index = |expected| Error::BadConstantIndex {
        index: index.0,
        expected,
    };
    let constant = constants.constant(index)?;
    let int = || match constant {
        Constant::Integer(int) => Ok(*int),
        _ => Err(bad_index("Integer")),
    };
    Ok(match tag {
        b'B' => ElementValue::Byte(int()?),
        b'C' => ElementValue::Char(int()?),
        b'S' => ElementValue::Short(int()?),
        b'Z' => ElementValue::Boolean(int()?),
        b'I' => ElementValue::Int(int()?),
        b'J' => match constant {
            Constant::Long(long) => ElementValue::Long(*long),
            _ => return Err(bad_index("Long")),
        },
        b'F' => match constant {
            Constant::Float(float) => ElementValue::Float(*float),
            _ => return Err(bad_index("Float")),
        },
        b'D' => match constant {
            Constant::Double(double) => ElementValue::Double(*double),
            _ => return Err(bad_index("Double")),
        },
        b's' => match constant {
            Constant::Utf8(string) => ElementValue::String(string.clone()),
            _ => return Err(bad_index("Utf8")),
        },
        other => return Err(Error::UnknownElementValueTag(other)),
    })
}

impl Annotation {
    pub fn read(
        annotation: &class_file::Annotation,
        constants: &ConstantsReader,
    ) -> Result<Annotation, Error> {
        Ok(Annotation {
            descriptor: constants.utf8(annotation.type_index)?,
            elements: annotation
                .element_value_pairs
                .iter()
                .map(|(name, value)| Ok((constants.utf8(*name)?, ElementValue::read(value, constants)?)))
                .collect::<Result<_, Error>>()?,
        })
    }

    pub fn write(&self, constants: &mut ConstantsPool) -> Result<class_file::Annotation, Error> {
        Ok(class_file::Annotation {
            type_index: constants.get_utf8(self.descriptor.as_str())?,
            element_value_pairs: self
                .elements
                .iter()
                .map(|(name, value)| Ok((constants.get_utf8(name.as_str())?, value.write(constants)?)))
                .collect::<Result<_, Error>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_values_resolve_through_the_pool() {
        let value = ElementValue::Array(vec![
            ElementValue::Char('x' as i32),
            ElementValue::String("retention".into()),
            ElementValue::String(JavaString::from_utf16(vec![0x61, 0xDFFF])),
            ElementValue::Enum {
                descriptor: "Ljava/lang/annotation/RetentionPolicy;".to_owned(),
                name: "RUNTIME".to_owned(),
            },
            ElementValue::Annotation(Annotation {
                descriptor: "Lme/Tag;".to_owned(),
                elements: vec![("weight".to_owned(), ElementValue::Double(0.5))],
            }),
        ]);

        let mut pool = ConstantsPool::new();
        let raw = value.write(&mut pool).unwrap();
        let constants = pool.into_offset_vec();
        let reader = ConstantsReader::new(&constants, &[]);
        assert_eq!(ElementValue::read(&raw, &reader).unwrap(), value);
    }

    #[test]
    fn tag_must_match_constant() {
        let mut pool = ConstantsPool::new();
        let long = pool.get_long(3).unwrap();
        let constants = pool.into_offset_vec();
        let reader = ConstantsReader::new(&constants, &[]);

        let raw = class_file::ElementValue::Constant {
            tag: b'I',
            value: long,
        };
        assert!(ElementValue::read(&raw, &reader).is_err());
    }

    #[test]
    fn deep_equality() {
        let nested = |name: &str| {
            ElementValue::Array(vec![ElementValue::Enum {
                descriptor: "Lme/Color;".to_owned(),
                name: name.to_owned(),
            }])
        };
        assert_eq!(nested("RED"), nested("RED"));
        assert_ne!(nested("RED"), nested("BLUE"));
        assert_ne!(ElementValue::Byte(1), ElementValue::Int(1));
    }
}
