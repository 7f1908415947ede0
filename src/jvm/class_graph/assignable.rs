use crate::jvm::class_graph::{ClassId, ClassRef};
use crate::jvm::{ArrayType, BinaryName, RefType};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Subtyping relationship between types
///
/// For types involving classes that aren't in the class graph, this answers whether the first
/// type is _known_ to be assignable to the second.
pub trait Assignable {
    /// Is the first type assignable to the second?
    fn is_assignable(&self, super_type: &Self) -> bool;
}

/// This does a traversal of super types in the class graph to determine assignability
impl<'g> Assignable for ClassId<'g> {
    fn is_assignable(&self, super_type: &ClassId<'g>) -> bool {
        let mut supertypes_to_visit: Vec<ClassId<'g>> = vec![*self];
        let mut dont_revisit: HashSet<ClassId<'g>> = HashSet::new();
        dont_revisit.insert(*self);

        // If the super type is a class, interfaces can be skipped
        let super_is_class: bool = !super_type.is_interface();

        while let Some(class_data) = supertypes_to_visit.pop() {
            if class_data == *super_type {
                return true;
            }

            if let Some(superclass) = class_data.superclass {
                if dont_revisit.insert(superclass) {
                    supertypes_to_visit.push(superclass);
                }
            }
            if !super_is_class {
                for interface in &class_data.interfaces {
                    if dont_revisit.insert(*interface) {
                        supertypes_to_visit.push(*interface);
                    }
                }
            }
        }

        false
    }
}

/// Unresolved classes are only known to be assignable to themselves and to `java/lang/Object`
impl<'g> Assignable for ClassRef<'g> {
    fn is_assignable(&self, super_type: &ClassRef<'g>) -> bool {
        if self.name == super_type.name || super_type.name == BinaryName::OBJECT {
            return true;
        }
        match (self.class, super_type.class) {
            (Some(sub_class), Some(super_class)) => sub_class.is_assignable(&super_class),
            _ => false,
        }
    }
}

/// This matches the semantics of the prolog predicate `isJavaAssignable(sub_type, super_type)` in
/// the JVM verification rules.
impl<'g> Assignable for RefType<ClassRef<'g>> {
    fn is_assignable(&self, super_type: &RefType<ClassRef<'g>>) -> bool {
        match (self, super_type) {
            // Special superclass and interfaces of all arrays
            (
                RefType::PrimitiveArray(_) | RefType::ObjectArray(_),
                RefType::Object(object_type),
            ) => is_array_type_assignable(&object_type.name),

            // Primitive arrays must match in dimension and type
            (RefType::PrimitiveArray(arr1), RefType::PrimitiveArray(arr2)) => arr1 == arr2,

            // Higher dimensional primitive arrays can be subtypes of object arrays
            (RefType::PrimitiveArray(arr1), RefType::ObjectArray(arr2)) => {
                arr1.additional_dimensions > arr2.additional_dimensions
                    && is_array_type_assignable(&arr2.element_type.name)
            }

            // Arrays are covariant
            (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2)) => {
                match arr1.additional_dimensions.cmp(&arr2.additional_dimensions) {
                    Ordering::Less => false,
                    Ordering::Equal => arr1.element_type.is_assignable(&arr2.element_type),
                    Ordering::Greater => is_array_type_assignable(&arr2.element_type.name),
                }
            }

            (RefType::Object(cls1), RefType::Object(cls2)) => cls1.is_assignable(cls2),

            _ => false,
        }
    }
}

/// Check if arrays can be assigned to a super type
///
/// This bakes in knowledge of the small, finite set of super types arrays have.
fn is_array_type_assignable(super_type: &BinaryName) -> bool {
    super_type == &BinaryName::OBJECT
        || super_type == &BinaryName::CLONEABLE
        || super_type == &BinaryName::SERIALIZABLE
}

/// Most specific type which both types are assignable to, following only superclass edges
///
/// Interfaces only share `java/lang/Object` as a superclass, so two unrelated interfaces meet at
/// `java/lang/Object` even if they have a common super-interface. Classes that aren't in the class
/// graph are only known to extend `java/lang/Object`.
pub fn common_superclass<'g>(
    left: &RefType<ClassRef<'g>>,
    right: &RefType<ClassRef<'g>>,
) -> Option<RefType<ClassRef<'g>>> {
    if left.is_assignable(right) {
        return Some(right.clone());
    } else if right.is_assignable(left) {
        return Some(left.clone());
    }

    match (left, right) {
        (RefType::Object(cls1), RefType::Object(cls2)) => {
            let (class1, class2) = match (cls1.class, cls2.class) {
                (Some(class1), Some(class2)) => (class1, class2),
                _ => return Some(RefType::Object(ClassRef::unresolved(BinaryName::OBJECT))),
            };
            let mut ancestors: HashSet<ClassId<'g>> = HashSet::new();
            let mut next_class = Some(class1);
            while let Some(class) = next_class {
                ancestors.insert(class);
                next_class = class.superclass;
            }
            let mut next_class = Some(class2);
            while let Some(class) = next_class {
                if ancestors.contains(&class) {
                    return Some(RefType::Object(ClassRef::resolved(class)));
                }
                next_class = class.superclass;
            }
            None
        }

        // Same dimension object arrays are covariant in their elements, and every element is at
        // least an object
        (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2))
            if arr1.additional_dimensions == arr2.additional_dimensions =>
        {
            let element1 = RefType::Object(arr1.element_type.clone());
            let element2 = RefType::Object(arr2.element_type.clone());
            let element_type = match common_superclass(&element1, &element2) {
                Some(RefType::Object(element_type)) => element_type,
                _ => ClassRef::unresolved(BinaryName::OBJECT),
            };
            Some(RefType::ObjectArray(ArrayType {
                additional_dimensions: arr1.additional_dimensions,
                element_type,
            }))
        }

        // Any other mix involving arrays only has `java/lang/Object` in common
        (RefType::ObjectArray(_) | RefType::PrimitiveArray(_), _)
        | (_, RefType::ObjectArray(_) | RefType::PrimitiveArray(_)) => {
            Some(RefType::Object(ClassRef::unresolved(BinaryName::OBJECT)))
        }
    }
}

#[cfg(test)]
mod test {
    use crate::jvm::class_graph::{
        common_superclass, Assignable, ClassData, ClassGraph, ClassGraphArenas, ClassRef,
    };
    use crate::jvm::{BinaryName, ClassAccessFlags, FieldType, Name, RefType};

    #[test]
    fn classes_and_interfaces() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        let object_cls = &java.lang.object;
        let number_cls = &java.lang.number;
        let integer_cls = &java.lang.integer;
        let charsequence_cls = &java.lang.char_sequence;
        let string_cls = &java.lang.string;

        assert!(
            integer_cls.is_assignable(object_cls),
            "java.lang.Integer <: java.lang.Object"
        );
        assert!(
            integer_cls.is_assignable(number_cls),
            "java.lang.Integer <: java.lang.Number"
        );
        assert!(
            !number_cls.is_assignable(integer_cls),
            "java.lang.Number </: java.lang.Integer"
        );
        assert!(
            string_cls.is_assignable(charsequence_cls),
            "java.lang.String <: java.lang.CharSequence"
        );
        assert!(
            !charsequence_cls.is_assignable(string_cls),
            "java.lang.CharSequence </: java.lang.String"
        );
    }

    #[test]
    fn unresolved_classes() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        let object = ClassRef::resolved(java.lang.object);
        let number = ClassRef::resolved(java.lang.number);
        let missing = class_graph.class_ref(BinaryName::from_str("org/lib/Missing").unwrap());

        assert!(missing.is_assignable(&missing), "org.lib.Missing <: org.lib.Missing");
        assert!(missing.is_assignable(&object), "org.lib.Missing <: java.lang.Object");
        assert!(!missing.is_assignable(&number), "org.lib.Missing <?: java.lang.Number");
        assert!(!number.is_assignable(&missing), "java.lang.Number <?: org.lib.Missing");
    }

    #[test]
    fn arrays() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        let object = &RefType::Object(ClassRef::resolved(java.lang.object));
        let cloneable = &RefType::Object(ClassRef::resolved(java.lang.cloneable));
        let int_array = &RefType::array(FieldType::int());
        let long_array = &RefType::array(FieldType::long());
        let integer_array =
            &RefType::array(FieldType::object(ClassRef::resolved(java.lang.integer)));
        let number_array = &RefType::array(FieldType::object(ClassRef::resolved(java.lang.number)));
        let nested_int_array = &RefType::array(FieldType::array(FieldType::int()));
        let object_array = &RefType::array(FieldType::object(ClassRef::resolved(java.lang.object)));

        assert!(int_array.is_assignable(object), "[]int <: java.lang.Object");
        assert!(int_array.is_assignable(cloneable), "[]int <: java.lang.Cloneable");
        assert!(!int_array.is_assignable(long_array), "[]int </: []long");
        assert!(
            integer_array.is_assignable(number_array),
            "[]java.lang.Integer <: []java.lang.Number"
        );
        assert!(
            !number_array.is_assignable(integer_array),
            "[]java.lang.Number </: []java.lang.Integer"
        );
        assert!(
            nested_int_array.is_assignable(object_array),
            "[][]int <: []java.lang.Object"
        );
        assert!(
            !object.is_assignable(int_array),
            "java.lang.Object </: []int"
        );
    }

    #[test]
    fn common_superclasses() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        let typ = |class| RefType::Object(ClassRef::resolved(class));
        let object = typ(java.lang.object);
        let number = typ(java.lang.number);
        let integer = typ(java.lang.integer);
        let long = typ(java.lang.long);
        let string = typ(java.lang.string);
        let npe = typ(java.lang.null_pointer_exception);
        let arithmetic = typ(java.lang.arithmetic_exception);
        let runtime = typ(java.lang.runtime_exception);

        assert_eq!(common_superclass(&integer, &long), Some(number.clone()));
        assert_eq!(common_superclass(&integer, &number), Some(number.clone()));
        assert_eq!(common_superclass(&string, &integer), Some(object.clone()));
        assert_eq!(common_superclass(&npe, &arithmetic), Some(runtime));

        let integer_array = RefType::array(FieldType::object(ClassRef::resolved(java.lang.integer)));
        let long_array = RefType::array(FieldType::object(ClassRef::resolved(java.lang.long)));
        assert_eq!(
            common_superclass(&integer_array, &long_array),
            Some(RefType::array(FieldType::object(ClassRef::resolved(java.lang.number))))
        );
        assert_eq!(
            common_superclass(&integer_array, &RefType::array(FieldType::int())),
            Some(object.clone())
        );

        let custom = class_graph.add_class(ClassData::new(
            BinaryName::from_str("me/alec/Resolved").unwrap(),
            java.lang.number,
            ClassAccessFlags::PUBLIC,
        ));
        assert_eq!(common_superclass(&typ(custom), &long), Some(number));

        let unresolved = RefType::Object(ClassRef::unresolved(
            BinaryName::from_str("org/lib/Missing").unwrap(),
        ));
        assert_eq!(common_superclass(&unresolved, &integer), Some(object.clone()));
        assert_eq!(common_superclass(&unresolved, &object), Some(object));
    }
}
