use super::class_graph::{ClassRef, FieldId, MethodId};
use super::{FieldType, MethodDescriptor, RefType, UnqualifiedName};
use std::borrow::Cow;

/// Constant pool of the class declaring the method being analysed
///
/// Indexing starts at 1, and `long`/`double` constants take up two indices (the second of which
/// is unusable), exactly as in the class file format.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool<'g> {
    constants: Vec<Option<ConstantData<'g>>>,
}

impl<'g> ConstantPool<'g> {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantPool<'g> {
        ConstantPool {
            constants: vec![None],
        }
    }

    /// Push a constant into the pool, returning its index
    ///
    /// Note: the pool is not deduplicated, so pushing the same constant twice yields two indices.
    pub fn push(&mut self, constant: ConstantData<'g>) -> u16 {
        let index = self.constants.len() as u16;
        let takes_two = matches!(constant, ConstantData::Long(_) | ConstantData::Double(_));
        self.constants.push(Some(constant));
        if takes_two {
            self.constants.push(None);
        }
        index
    }

    /// Look up a constant by its index
    pub fn get(&self, index: u16) -> Option<&ConstantData<'g>> {
        self.constants.get(index as usize).and_then(Option::as_ref)
    }

    /// Number of indices used (including the unusable 0 index)
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.len() <= 1
    }
}

/// Resolved view of a constant pool entry
///
/// Only the entries which instructions can refer to are modelled. Symbolic references keep their
/// names and descriptors even when they resolve into the class graph, since library members are
/// often not there.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantData<'g> {
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Cow<'static, str>),
    Class(RefType<ClassRef<'g>>),
    Field(FieldRef<'g>),
    Method(MethodRef<'g>),
    InvokeDynamic(InvokeDynamicRef<'g>),
    MethodHandle(MethodRef<'g>),
    MethodType(MethodDescriptor<ClassRef<'g>>),
}

/// Symbolic reference to a field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef<'g> {
    pub class: ClassRef<'g>,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<ClassRef<'g>>,

    /// Field in the class graph, if the reference resolves
    pub field: Option<FieldId<'g>>,
}

impl<'g> FieldRef<'g> {
    /// Reference to a field that is in the class graph
    pub fn resolved(field: FieldId<'g>) -> FieldRef<'g> {
        FieldRef {
            class: ClassRef::resolved(field.class),
            name: field.name.clone(),
            descriptor: field.descriptor.clone(),
            field: Some(field),
        }
    }

    /// Can code outside of what is being optimized observe this field?
    ///
    /// Unresolved fields count as retained.
    pub fn is_retained(&self) -> bool {
        self.field.map_or(true, |field| field.retained)
    }
}

/// Symbolic reference to a method (or interface method)
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef<'g> {
    pub class: ClassRef<'g>,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<ClassRef<'g>>,

    /// Method in the class graph, if the reference resolves
    pub method: Option<MethodId<'g>>,

    /// Is this an `InterfaceMethodref`?
    pub is_interface: bool,
}

impl<'g> MethodRef<'g> {
    /// Reference to a method that is in the class graph
    pub fn resolved(method: MethodId<'g>) -> MethodRef<'g> {
        MethodRef {
            class: ClassRef::resolved(method.class),
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            method: Some(method),
            is_interface: method.class.is_interface(),
        }
    }

    /// Can code outside of what is being optimized call this method (or be called by it)?
    ///
    /// Unresolved methods count as retained.
    pub fn is_retained(&self) -> bool {
        self.method.map_or(true, |method| method.retained)
    }
}

/// Call site of an `invokedynamic`
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeDynamicRef<'g> {
    /// Index into the bootstrap methods attribute
    pub bootstrap_method: u16,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<ClassRef<'g>>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wide_constants_take_two_indices() {
        let mut pool = ConstantPool::new();
        assert!(pool.is_empty());

        let int = pool.push(ConstantData::Integer(7));
        let long = pool.push(ConstantData::Long(1 << 40));
        let string = pool.push(ConstantData::String(Cow::Borrowed("hello")));

        assert_eq!((int, long, string), (1, 2, 4));
        assert_eq!(pool.get(int), Some(&ConstantData::Integer(7)));
        assert_eq!(pool.get(3), None, "second half of a long is unusable");
        assert_eq!(pool.get(0), None);
        assert_eq!(pool.get(9), None);
        assert_eq!(pool.len(), 5);
    }
}
