use crate::jvm::class_file;
use crate::jvm::class_file::{
    ConstantValue, ConstantsPool, ConstantsReader, ConstantsWriter, Signature,
};
use crate::jvm::model::ConstantData;
use crate::jvm::{Error, FieldAccessFlags};

/// Semantic representation of a field
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Field {
    pub name: String,
    pub descriptor: String,
    pub access_flags: FieldAccessFlags,

    /// Generic field signature
    ///
    /// [Format](https://docs.oracle.com/javase/specs/jvms/se11/html/jvms-4.html#jvms-4.7.9.1)
    pub signature: Option<String>,

    /// Constant value (only meaningful on `static final` primitive or string fields)
    pub value: Option<ConstantData>,
}

impl Field {
    pub(crate) fn read(field: &class_file::Field, constants: &ConstantsReader) -> Result<Field, Error> {
        let mut signature = None;
        let mut value = None;

        for attribute in &field.attributes {
            match constants.utf8(attribute.name_index)?.as_str() {
                "Signature" => {
                    let Signature(index) = attribute.decode::<Signature>()?;
                    signature = Some(constants.utf8(index)?);
                }
                "ConstantValue" => {
                    let ConstantValue(index) = attribute.decode::<ConstantValue>()?;
                    value = Some(constants.loadable(index)?);
                }
                _ => (),
            }
        }

        Ok(Field {
            name: constants.utf8(field.name_index)?,
            descriptor: constants.utf8(field.descriptor_index)?,
            access_flags: field.access_flags,
            signature,
            value,
        })
    }

    pub(crate) fn write(&self, constants: &mut ConstantsPool) -> Result<class_file::Field, Error> {
        let name_index = constants.get_utf8(self.name.as_str())?;
        let descriptor_index = constants.get_utf8(self.descriptor.as_str())?;
        let mut attributes = vec![];

        if let Some(value) = &self.value {
            let index = value.constant_index(constants)?;
            attributes.push(constants.get_attribute(ConstantValue(index))?);
        }

        if let Some(signature) = &self.signature {
            let index = constants.get_utf8(signature.as_str())?;
            attributes.push(constants.get_attribute(Signature(index))?);
        }

        Ok(class_file::Field {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}
