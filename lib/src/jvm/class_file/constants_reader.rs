use crate::jvm::class_file::{
    BootstrapMethod, ClassConstantIndex, Constant, ConstantIndex, FieldRefConstantIndex,
    InvokeDynamicConstantIndex, MethodRefConstantIndex, NameAndTypeConstantIndex,
    Utf8ConstantIndex,
};
use crate::jvm::code::{FieldRef, InvokeDynamic, MethodRef};
use crate::jvm::model::{ConstantData, ConstantDynamic, Handle};
use crate::jvm::Error;
use crate::util::OffsetVec;

/// Dynamic constants can take other dynamic constants as bootstrap arguments. Valid classes
/// cannot have cycles, but a malformed one could, so resolution gives up past this depth.
const MAX_DYNAMIC_DEPTH: usize = 64;

/// Resolves constant pool indices of a parsed class file into model values
///
/// This is the reading counterpart of [`super::ConstantsWriter`].
pub struct ConstantsReader<'a> {
    constants: &'a OffsetVec<Constant>,
    bootstrap_methods: &'a [BootstrapMethod],
}

impl<'a> ConstantsReader<'a> {
    pub fn new(
        constants: &'a OffsetVec<Constant>,
        bootstrap_methods: &'a [BootstrapMethod],
    ) -> ConstantsReader<'a> {
        ConstantsReader {
            constants,
            bootstrap_methods,
        }
    }

    pub fn constant(&self, index: ConstantIndex) -> Result<&'a Constant, Error> {
        self.constants.get_constant(index)
    }

    pub fn utf8(&self, index: Utf8ConstantIndex) -> Result<String, Error> {
        self.constants.get_utf8(index).map(str::to_owned)
    }

    pub fn optional_utf8(&self, index: Utf8ConstantIndex) -> Result<Option<String>, Error> {
        Ok(self.constants.get_optional_utf8(index)?.map(str::to_owned))
    }

    pub fn class_name(&self, index: ClassConstantIndex) -> Result<String, Error> {
        self.constants.get_class_name(index).map(str::to_owned)
    }

    pub fn optional_class_name(&self, index: ClassConstantIndex) -> Result<Option<String>, Error> {
        Ok(self
            .constants
            .get_optional_class_name(index)?
            .map(str::to_owned))
    }

    pub fn name_and_type(&self, index: NameAndTypeConstantIndex) -> Result<(String, String), Error> {
        let (name, descriptor) = self.constants.get_name_and_type(index)?;
        Ok((name.to_owned(), descriptor.to_owned()))
    }

    pub fn field_ref(&self, index: FieldRefConstantIndex) -> Result<FieldRef, Error> {
        self.field_ref_at(index.0)
    }

    fn field_ref_at(&self, index: ConstantIndex) -> Result<FieldRef, Error> {
        match self.constant(index)? {
            Constant::FieldRef(class, name_and_type) => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok(FieldRef {
                    owner: self.class_name(*class)?,
                    name,
                    descriptor,
                })
            }
            _ => Err(Error::BadConstantIndex {
                index: index.0,
                expected: "Fieldref",
            }),
        }
    }

    pub fn method_ref(&self, index: MethodRefConstantIndex) -> Result<MethodRef, Error> {
        self.method_ref_at(index.0)
    }

    fn method_ref_at(&self, index: ConstantIndex) -> Result<MethodRef, Error> {
        match self.constant(index)? {
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok(MethodRef {
                    owner: self.class_name(*class)?,
                    name,
                    descriptor,
                    is_interface: *is_interface,
                })
            }
            _ => Err(Error::BadConstantIndex {
                index: index.0,
                expected: "Methodref",
            }),
        }
    }

    /// Resolve a `CONSTANT_MethodHandle_info`
    pub fn handle(&self, index: ConstantIndex) -> Result<Handle, Error> {
        match self.constant(index)? {
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                if handle_kind.is_field() {
                    let field = self.field_ref_at(*member)?;
                    Ok(Handle {
                        kind: *handle_kind,
                        owner: field.owner,
                        name: field.name,
                        descriptor: field.descriptor,
                        is_interface: false,
                    })
                } else {
                    let method = self.method_ref_at(*member)?;
                    Ok(Handle {
                        kind: *handle_kind,
                        owner: method.owner,
                        name: method.name,
                        descriptor: method.descriptor,
                        is_interface: method.is_interface,
                    })
                }
            }
            _ => Err(Error::BadConstantIndex {
                index: index.0,
                expected: "MethodHandle",
            }),
        }
    }

    /// Resolve a constant which can be loaded with `ldc` or used as a bootstrap argument
    pub fn loadable(&self, index: ConstantIndex) -> Result<ConstantData, Error> {
        self.loadable_at_depth(index, 0)
    }

    fn loadable_at_depth(&self, index: ConstantIndex, depth: usize) -> Result<ConstantData, Error> {
        Ok(match self.constant(index)? {
            Constant::Integer(integer) => ConstantData::Integer(*integer),
            Constant::Float(float) => ConstantData::Float(*float),
            Constant::Long(long) => ConstantData::Long(*long),
            Constant::Double(double) => ConstantData::Double(*double),
            Constant::String(utf8) => {
                ConstantData::String(self.constants.get_java_utf8(*utf8)?.clone())
            }
            Constant::Class(utf8) => ConstantData::Class(self.utf8(*utf8)?),
            Constant::MethodType { descriptor } => ConstantData::MethodType(self.utf8(*descriptor)?),
            Constant::MethodHandle { .. } => ConstantData::MethodHandle(self.handle(index)?),
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                if depth >= MAX_DYNAMIC_DEPTH {
                    return Err(Error::BadBootstrapMethod(*bootstrap_method));
                }
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                let (bootstrap_method, bootstrap_arguments) =
                    self.bootstrap_method(*bootstrap_method, depth + 1)?;
                ConstantData::Dynamic(ConstantDynamic {
                    name,
                    descriptor,
                    bootstrap_method,
                    bootstrap_arguments,
                })
            }
            _ => {
                return Err(Error::BadConstantIndex {
                    index: index.0,
                    expected: "loadable",
                })
            }
        })
    }

    pub fn invoke_dynamic(&self, index: InvokeDynamicConstantIndex) -> Result<InvokeDynamic, Error> {
        match self.constant(index.0)? {
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                let (name, descriptor) = self.name_and_type(*method_descriptor)?;
                let (bootstrap_method, bootstrap_arguments) =
                    self.bootstrap_method(*bootstrap_method, 0)?;
                Ok(InvokeDynamic {
                    name,
                    descriptor,
                    bootstrap_method,
                    bootstrap_arguments,
                })
            }
            _ => Err(Error::BadConstantIndex {
                index: (index.0).0,
                expected: "InvokeDynamic",
            }),
        }
    }

    fn bootstrap_method(
        &self,
        index: u16,
        depth: usize,
    ) -> Result<(Handle, Vec<ConstantData>), Error> {
        let entry = self
            .bootstrap_methods
            .get(index as usize)
            .ok_or(Error::BadBootstrapMethod(index))?;
        let handle = self.handle(entry.bootstrap_method)?;
        let arguments = entry
            .bootstrap_arguments
            .iter()
            .map(|argument| self.loadable_at_depth(*argument, depth))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((handle, arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::class_file::{ConstantsPool, ConstantsWriter, HandleKind};

    fn string_concat_factory() -> Handle {
        Handle {
            kind: HandleKind::InvokeStatic,
            owner: "java/lang/invoke/StringConcatFactory".to_owned(),
            name: "makeConcatWithConstants".to_owned(),
            descriptor: "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;".to_owned(),
            is_interface: false,
        }
    }

    #[test]
    fn resolves_what_was_written() {
        let mut pool = ConstantsPool::new();
        let field = FieldRef {
            owner: "me/Point".to_owned(),
            name: "x".to_owned(),
            descriptor: "I".to_owned(),
        };
        let method = MethodRef {
            owner: "java/util/List".to_owned(),
            name: "size".to_owned(),
            descriptor: "()I".to_owned(),
            is_interface: true,
        };
        let dynamic = ConstantData::Dynamic(ConstantDynamic {
            name: "_".to_owned(),
            descriptor: "I".to_owned(),
            bootstrap_method: string_concat_factory(),
            bootstrap_arguments: vec![ConstantData::String("\u{1}!".into())],
        });

        let field_idx = field.constant_index(&mut pool).unwrap();
        let method_idx = method.constant_index(&mut pool).unwrap();
        let dynamic_idx = dynamic.constant_index(&mut pool).unwrap();
        let float_idx = ConstantData::Float(-0.0).constant_index(&mut pool).unwrap();
        let bootstrap_methods = pool.take_bootstrap_methods();
        let constants = pool.into_offset_vec();

        let reader = ConstantsReader::new(&constants, &bootstrap_methods);
        assert_eq!(reader.field_ref(field_idx).unwrap(), field);
        assert_eq!(reader.method_ref(method_idx).unwrap(), method);
        assert_eq!(reader.loadable(dynamic_idx).unwrap(), dynamic);
        assert_eq!(reader.loadable(float_idx).unwrap(), ConstantData::Float(-0.0));
    }

    #[test]
    fn wrong_constant_type() {
        let mut pool = ConstantsPool::new();
        let utf8 = pool.get_utf8("hello").unwrap();
        let constants = pool.into_offset_vec();
        let reader = ConstantsReader::new(&constants, &[]);

        assert!(matches!(
            reader.loadable(utf8.0),
            Err(Error::BadConstantIndex { .. })
        ));
        assert!(reader.handle(utf8.0).is_err());
    }

    #[test]
    fn missing_bootstrap_method() {
        let mut pool = ConstantsPool::new();
        let name_and_type = pool.get_name_and_type("run", "()Ljava/lang/Runnable;").unwrap();
        let indy = pool.get_invoke_dynamic(3, name_and_type).unwrap();
        let constants = pool.into_offset_vec();
        let reader = ConstantsReader::new(&constants, &[]);

        assert!(matches!(
            reader.invoke_dynamic(indy),
            Err(Error::BadBootstrapMethod(3))
        ));
    }
}
