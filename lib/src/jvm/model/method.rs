use crate::jvm::class_file;
use crate::jvm::class_file::{
    AnnotationDefault, Code, ConstantsPool, ConstantsReader, Exceptions, Signature,
};
use crate::jvm::code::{decode_code, encode_code, ExceptionHandler, Instruction};
use crate::jvm::model::{ElementValue, ReaderFlags};
use crate::jvm::{Error, MethodAccessFlags};

/// Semantic representation of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    pub access_flags: MethodAccessFlags,

    /// Generic method signature
    ///
    /// [Format](https://docs.oracle.com/javase/specs/jvms/se11/html/jvms-4.html#jvms-4.7.9.1)
    pub signature: Option<String>,

    /// Which exceptions can this method throw?
    ///
    /// Note: this does not need to include `RuntimeException`, `Error`, or subclasses
    pub exceptions: Vec<String>,

    /// Default value of an annotation interface element
    pub annotation_default: Option<ElementValue>,

    pub max_stack: u16,
    pub max_locals: u16,

    /// Method body (empty for `abstract` and `native` methods)
    pub instructions: Vec<Instruction>,
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl Method {
    /// Name and descriptor, which together identify the method within its class
    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.descriptor)
    }

    pub(crate) fn read(
        method: &class_file::Method,
        constants: &ConstantsReader,
        flags: ReaderFlags,
    ) -> Result<Method, Error> {
        let mut signature = None;
        let mut exceptions = vec![];
        let mut annotation_default = None;
        let mut max_stack = 0;
        let mut max_locals = 0;
        let mut instructions = vec![];
        let mut exception_handlers = vec![];

        for attribute in &method.attributes {
            match constants.utf8(attribute.name_index)?.as_str() {
                "Code" => {
                    let code = attribute.decode::<Code>()?;
                    max_stack = code.max_stack;
                    max_locals = code.max_locals;
                    let body = decode_code(&code, constants, flags)?;
                    instructions = body.instructions;
                    exception_handlers = body.exception_handlers;
                }
                "Signature" => {
                    let Signature(index) = attribute.decode::<Signature>()?;
                    signature = Some(constants.utf8(index)?);
                }
                "Exceptions" => {
                    let Exceptions(classes) = attribute.decode::<Exceptions>()?;
                    exceptions = classes
                        .into_iter()
                        .map(|class| constants.class_name(class))
                        .collect::<Result<_, _>>()?;
                }
                "AnnotationDefault" => {
                    let AnnotationDefault(value) = attribute.decode::<AnnotationDefault>()?;
                    annotation_default = Some(ElementValue::read(&value, constants)?);
                }
                _ => (),
            }
        }

        Ok(Method {
            name: constants.utf8(method.name_index)?,
            descriptor: constants.utf8(method.descriptor_index)?,
            access_flags: method.access_flags,
            signature,
            exceptions,
            annotation_default,
            max_stack,
            max_locals,
            instructions,
            exception_handlers,
        })
    }

    pub(crate) fn write(&self, constants: &mut ConstantsPool) -> Result<class_file::Method, Error> {
        let name_index = constants.get_utf8(self.name.as_str())?;
        let descriptor_index = constants.get_utf8(self.descriptor.as_str())?;
        let mut attributes = vec![];

        if !self.instructions.is_empty() {
            let code = encode_code(self, constants)?;
            attributes.push(constants.get_attribute(code)?);
        }

        if !self.exceptions.is_empty() {
            let exceptions = self
                .exceptions
                .iter()
                .map(|exception| constants.get_class(exception))
                .collect::<Result<Vec<_>, _>>()?;
            attributes.push(constants.get_attribute(Exceptions(exceptions))?);
        }

        if let Some(signature) = &self.signature {
            let index = constants.get_utf8(signature.as_str())?;
            attributes.push(constants.get_attribute(Signature(index))?);
        }

        if let Some(value) = &self.annotation_default {
            let value = value.write(constants)?;
            attributes.push(constants.get_attribute(AnnotationDefault(value))?);
        }

        Ok(class_file::Method {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}
