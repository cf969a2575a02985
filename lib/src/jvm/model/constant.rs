use crate::jvm::class_file::HandleKind;
use crate::jvm::JavaString;

/// Constant which can be loaded with `ldc`, used as a bootstrap argument, or used as the initial
/// value of a static field
///
/// Floating point constants compare by their bits: `0.0` and `-0.0` are different constants, and
/// a `NaN` constant is equal to itself.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConstantData {
    Integer(i32),
    #[serde(with = "f32_bits")]
    Float(f32),
    Long(i64),
    #[serde(with = "f64_bits")]
    Double(f64),
    String(JavaString),

    /// Internal name of a class or array descriptor
    Class(String),

    /// Method descriptor
    MethodType(String),

    MethodHandle(Handle),

    Dynamic(ConstantDynamic),
}

impl PartialEq for ConstantData {
    fn eq(&self, other: &ConstantData) -> bool {
        match (self, other) {
            (ConstantData::Integer(i1), ConstantData::Integer(i2)) => i1 == i2,
            (ConstantData::Float(f1), ConstantData::Float(f2)) => f1.to_bits() == f2.to_bits(),
            (ConstantData::Long(l1), ConstantData::Long(l2)) => l1 == l2,
            (ConstantData::Double(d1), ConstantData::Double(d2)) => d1.to_bits() == d2.to_bits(),
            (ConstantData::String(s1), ConstantData::String(s2)) => s1 == s2,
            (ConstantData::Class(c1), ConstantData::Class(c2)) => c1 == c2,
            (ConstantData::MethodType(m1), ConstantData::MethodType(m2)) => m1 == m2,
            (ConstantData::MethodHandle(h1), ConstantData::MethodHandle(h2)) => h1 == h2,
            (ConstantData::Dynamic(d1), ConstantData::Dynamic(d2)) => d1 == d2,
            _ => false,
        }
    }
}

impl Eq for ConstantData {}

/// Dynamically-computed constant (`CONSTANT_Dynamic`)
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConstantDynamic {
    pub name: String,
    pub descriptor: String,
    pub bootstrap_method: Handle,
    pub bootstrap_arguments: Vec<ConstantData>,
}

/// Method handle constant
///
/// For the field kinds, `descriptor` is a field descriptor and `is_interface` is `false`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Handle {
    pub kind: HandleKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub is_interface: bool,
}

/// Serialize floats through their bits so that `NaN` payloads and `-0.0` survive JSON
pub(crate) mod f32_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(value.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        Ok(f32::from_bits(u32::deserialize(deserializer)?))
    }
}

pub(crate) mod f64_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(f64::from_bits(u64::deserialize(deserializer)?))
    }
}
