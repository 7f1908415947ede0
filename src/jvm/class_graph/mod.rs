use super::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldType, MethodAccessFlags,
    MethodDescriptor, Name, ParseDescriptor, RefType, RenderDescriptor, UnqualifiedName,
};
use crate::util::RefId;
use elsa::map::FrozenMap;
use std::cmp::Ordering;
use std::fmt;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use typed_arena::Arena;

mod assignable;
mod java_classes;

pub use assignable::*;
pub use java_classes::*;

pub type ClassId<'g> = RefId<'g, ClassData<'g>>;
pub type MethodId<'g> = RefId<'g, MethodData<'g>>;
pub type FieldId<'g> = RefId<'g, FieldData<'g>>;

pub struct ClassGraphArenas<'g> {
    class_arena: Arena<ClassData<'g>>,
    method_arena: Arena<MethodData<'g>>,
    field_arena: Arena<FieldData<'g>>,
}

impl<'g> ClassGraphArenas<'g> {
    pub fn new() -> Self {
        ClassGraphArenas {
            class_arena: Arena::new(),
            method_arena: Arena::new(),
            field_arena: Arena::new(),
        }
    }
}

impl<'g> Default for ClassGraphArenas<'g> {
    fn default() -> Self {
        ClassGraphArenas::new()
    }
}

/// Tracks the classes/interfaces that are known to the optimizer, along with the members that
/// analyses may want to identify
///
/// Classes which aren't in the graph (typically library classes for which no model was loaded)
/// can still be referred to through an unresolved [`ClassRef`]. Analyses must stay sound when
/// they run into those.
pub struct ClassGraph<'g> {
    arenas: &'g ClassGraphArenas<'g>,
    classes: FrozenMap<&'g BinaryName, Box<ClassId<'g>>>,
}

impl<'g> ClassGraph<'g> {
    /// New empty graph
    pub fn new(arenas: &'g ClassGraphArenas<'g>) -> Self {
        ClassGraph {
            arenas,
            classes: FrozenMap::new(),
        }
    }

    /// Find a class by name
    pub fn lookup_class(&self, name: &BinaryName) -> Option<ClassId<'g>> {
        self.classes.get(name).copied()
    }

    /// Reference to a class by name, resolved if the class is in the graph
    pub fn class_ref(&self, name: BinaryName) -> ClassRef<'g> {
        let class = self.lookup_class(&name);
        ClassRef { name, class }
    }

    /// Resolve all of the classes in a field type
    pub fn resolve_field_type(&self, field_type: &FieldType<BinaryName>) -> FieldType<ClassRef<'g>> {
        field_type.map(|name| self.class_ref(name.clone()))
    }

    /// Resolve all of the classes in a reference type
    pub fn resolve_ref_type(&self, ref_type: &RefType<BinaryName>) -> RefType<ClassRef<'g>> {
        ref_type.map(|name| self.class_ref(name.clone()))
    }

    /// Resolve all of the classes in a method descriptor
    pub fn resolve_method_descriptor(
        &self,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> MethodDescriptor<ClassRef<'g>> {
        descriptor.map(|name| self.class_ref(name.clone()))
    }

    /// Parse a field descriptor (eg. `[Ljava/lang/String;`) and resolve its classes
    pub fn parse_field_type(&self, descriptor: &str) -> Result<FieldType<ClassRef<'g>>, Error> {
        let field_type = FieldType::<BinaryName>::parse(descriptor)?;
        Ok(self.resolve_field_type(&field_type))
    }

    /// Parse a method descriptor (eg. `(II)I`) and resolve its classes
    pub fn parse_method_descriptor(
        &self,
        descriptor: &str,
    ) -> Result<MethodDescriptor<ClassRef<'g>>, Error> {
        let descriptor = MethodDescriptor::<BinaryName>::parse(descriptor)?;
        Ok(self.resolve_method_descriptor(&descriptor))
    }

    /// Add a new class to the class graph
    pub fn add_class(&self, data: ClassData<'g>) -> ClassId<'g> {
        let data: &'g ClassData<'g> = self.arenas.class_arena.alloc(data);
        self.classes.insert(&data.name, Box::new(RefId(data)));
        RefId(data)
    }

    /// Add a method to the class graph
    pub fn add_method(&self, method: MethodData<'g>) -> MethodId<'g> {
        RefId(self.arenas.method_arena.alloc(method))
    }

    /// Add a field to the class graph
    pub fn add_field(&self, field: FieldData<'g>) -> FieldId<'g> {
        RefId(self.arenas.field_arena.alloc(field))
    }

    /// Add standard types to the class graph
    pub fn insert_java_library_types(&self) -> JavaClasses<'g> {
        JavaClasses::add_to_graph(self)
    }
}

pub struct ClassData<'g> {
    /// Name of the class
    pub name: BinaryName,

    /// Superclass is only ever missing for `java/lang/Object` itself
    pub superclass: Option<ClassId<'g>>,

    /// Interfaces implemented (or super-interfaces)
    pub interfaces: Vec<ClassId<'g>>,

    pub access_flags: ClassAccessFlags,
}

impl<'g> ClassData<'g> {
    pub fn new(
        name: BinaryName,
        superclass: ClassId<'g>,
        access_flags: ClassAccessFlags,
    ) -> ClassData<'g> {
        ClassData {
            name,
            superclass: Some(superclass),
            interfaces: vec![],
            access_flags,
        }
    }

    pub fn with_interfaces(mut self, interfaces: Vec<ClassId<'g>>) -> ClassData<'g> {
        self.interfaces = interfaces;
        self
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::FINAL)
    }
}

impl<'g> PartialEq for ClassData<'g> {
    fn eq(&self, other: &ClassData<'g>) -> bool {
        self.name == other.name
    }
}

impl<'g> Eq for ClassData<'g> {}

impl<'g> Debug for ClassData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

/// Reference to a class that may or may not be in the class graph
///
/// Identity is the class name, so a resolved and an unresolved reference to the same name are
/// considered the same class.
#[derive(Clone)]
pub struct ClassRef<'g> {
    pub name: BinaryName,

    /// Class in the graph, if there is one
    pub class: Option<ClassId<'g>>,
}

impl<'g> ClassRef<'g> {
    pub fn resolved(class: ClassId<'g>) -> ClassRef<'g> {
        ClassRef {
            name: class.name.clone(),
            class: Some(class),
        }
    }

    pub fn unresolved(name: BinaryName) -> ClassRef<'g> {
        ClassRef { name, class: None }
    }

    pub fn is_resolved(&self) -> bool {
        self.class.is_some()
    }

    /// Known to be an interface (unresolved classes are assumed not to be)
    pub fn is_interface(&self) -> bool {
        self.class.map_or(false, |class| class.is_interface())
    }

    /// Known to have no subclasses
    pub fn is_final(&self) -> bool {
        self.class.map_or(false, |class| class.is_final())
    }
}

impl<'g> PartialEq for ClassRef<'g> {
    fn eq(&self, other: &ClassRef<'g>) -> bool {
        self.name == other.name
    }
}

impl<'g> Eq for ClassRef<'g> {}

impl<'g> PartialOrd for ClassRef<'g> {
    fn partial_cmp(&self, other: &ClassRef<'g>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'g> Ord for ClassRef<'g> {
    fn cmp(&self, other: &ClassRef<'g>) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl<'g> Hash for ClassRef<'g> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl<'g> Debug for ClassRef<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())?;
        if self.class.is_none() {
            f.write_str("?")?;
        }
        Ok(())
    }
}

impl<'g> RenderDescriptor for ClassRef<'g> {
    fn render_to(&self, write_to: &mut String) {
        self.name.render_to(write_to)
    }
}

pub struct MethodData<'g> {
    /// Class
    pub class: ClassId<'g>,

    /// Name of the method
    pub name: UnqualifiedName,

    /// Type of the method
    pub descriptor: MethodDescriptor<ClassRef<'g>>,

    pub access_flags: MethodAccessFlags,

    /// Is this method reachable from outside of the code being optimized (eg. an entry point or
    /// a method kept by configuration)? Values observed at call sites are then incomplete.
    pub retained: bool,
}

impl<'g> MethodData<'g> {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Could a virtual call to this method dispatch to some other method?
    pub fn is_overridable(&self) -> bool {
        !(self.access_flags.intersects(
            MethodAccessFlags::STATIC | MethodAccessFlags::PRIVATE | MethodAccessFlags::FINAL,
        ) || self.name.is_init()
            || self.name == UnqualifiedName::CLINIT
            || self.class.is_final())
    }

    /// Type of a parameter, where `this` (if any) is parameter 0
    pub fn parameter_type(&self, index: usize) -> Option<FieldType<ClassRef<'g>>> {
        if self.is_static() {
            self.descriptor.parameters.get(index).cloned()
        } else if index == 0 {
            Some(FieldType::object(ClassRef::resolved(self.class)))
        } else {
            self.descriptor.parameters.get(index - 1).cloned()
        }
    }
}

impl<'g> Debug for MethodData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "{}.{}:{}",
            self.class.name.as_str(),
            self.name.as_str(),
            self.descriptor.render(),
        ))
    }
}

pub struct FieldData<'g> {
    /// Class
    pub class: ClassId<'g>,

    /// Name of the field
    pub name: UnqualifiedName,

    /// Type of the field
    pub descriptor: FieldType<ClassRef<'g>>,

    pub access_flags: FieldAccessFlags,

    /// Can code outside of what is being optimized read or write this field?
    pub retained: bool,
}

impl<'g> FieldData<'g> {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}

impl<'g> Debug for FieldData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "{}.{}:{}",
            self.class.name.as_str(),
            self.name.as_str(),
            self.descriptor.render(),
        ))
    }
}
