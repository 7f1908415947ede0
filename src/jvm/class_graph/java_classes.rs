use super::{BinaryName, ClassAccessFlags, ClassData, ClassGraph, ClassId};

/// Classes inside `java.*` that analyses need to know about
pub struct JavaClasses<'g> {
    pub lang: LangClasses<'g>,
    pub io: IoClasses<'g>,
}

/// Classes inside `java.lang.*`
pub struct LangClasses<'g> {
    pub object: ClassId<'g>,
    pub cloneable: ClassId<'g>,
    pub comparable: ClassId<'g>,
    pub char_sequence: ClassId<'g>,
    pub string: ClassId<'g>,
    pub class: ClassId<'g>,
    pub number: ClassId<'g>,
    pub integer: ClassId<'g>,
    pub long: ClassId<'g>,
    pub float: ClassId<'g>,
    pub double: ClassId<'g>,
    pub throwable: ClassId<'g>,
    pub error: ClassId<'g>,
    pub exception: ClassId<'g>,
    pub runtime_exception: ClassId<'g>,
    pub arithmetic_exception: ClassId<'g>,
    pub array_index_out_of_bounds_exception: ClassId<'g>,
    pub array_store_exception: ClassId<'g>,
    pub class_cast_exception: ClassId<'g>,
    pub illegal_monitor_state_exception: ClassId<'g>,
    pub negative_array_size_exception: ClassId<'g>,
    pub null_pointer_exception: ClassId<'g>,
    pub method_handle: ClassId<'g>,
    pub method_type: ClassId<'g>,
}

/// Classes inside `java.io.*`
pub struct IoClasses<'g> {
    pub serializable: ClassId<'g>,
}

impl<'g> JavaClasses<'g> {
    pub fn add_to_graph(class_graph: &ClassGraph<'g>) -> JavaClasses<'g> {
        let object = class_graph.add_class(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            interfaces: vec![],
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        });
        let io = IoClasses::add_to_graph(class_graph, object);
        let lang = LangClasses::add_to_graph(class_graph, object, &io);
        JavaClasses { lang, io }
    }
}

impl<'g> IoClasses<'g> {
    fn add_to_graph(class_graph: &ClassGraph<'g>, object: ClassId<'g>) -> IoClasses<'g> {
        let serializable = class_graph.add_class(ClassData::new(
            BinaryName::SERIALIZABLE,
            object,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        ));
        IoClasses { serializable }
    }
}

impl<'g> LangClasses<'g> {
    fn add_to_graph(
        class_graph: &ClassGraph<'g>,
        object: ClassId<'g>,
        io: &IoClasses<'g>,
    ) -> LangClasses<'g> {
        let interface = ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        let open_class = ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER;
        let final_class = open_class | ClassAccessFlags::FINAL;
        let abstract_class = open_class | ClassAccessFlags::ABSTRACT;
        let serializable = io.serializable;

        let add = |name: BinaryName, superclass: ClassId<'g>, flags: ClassAccessFlags| {
            class_graph.add_class(ClassData::new(name, superclass, flags))
        };
        let add_with = |name: BinaryName,
                        superclass: ClassId<'g>,
                        flags: ClassAccessFlags,
                        interfaces: Vec<ClassId<'g>>| {
            class_graph.add_class(ClassData::new(name, superclass, flags).with_interfaces(interfaces))
        };

        let cloneable = add(BinaryName::CLONEABLE, object, interface);
        let comparable = add(BinaryName::COMPARABLE, object, interface);
        let char_sequence = add(BinaryName::CHARSEQUENCE, object, interface);
        let string = add_with(
            BinaryName::STRING,
            object,
            final_class,
            vec![serializable, comparable, char_sequence],
        );
        let class = add_with(BinaryName::CLASS, object, final_class, vec![serializable]);
        let number = add_with(BinaryName::NUMBER, object, abstract_class, vec![serializable]);
        let integer = add_with(BinaryName::INTEGER, number, final_class, vec![comparable]);
        let long = add_with(BinaryName::LONG, number, final_class, vec![comparable]);
        let float = add_with(BinaryName::FLOAT, number, final_class, vec![comparable]);
        let double = add_with(BinaryName::DOUBLE, number, final_class, vec![comparable]);

        let throwable = add_with(BinaryName::THROWABLE, object, open_class, vec![serializable]);
        let error = add(BinaryName::ERROR, throwable, open_class);
        let exception = add(BinaryName::EXCEPTION, throwable, open_class);
        let runtime_exception = add(BinaryName::RUNTIMEEXCEPTION, exception, open_class);
        let arithmetic_exception = add(BinaryName::ARITHMETICEXCEPTION, runtime_exception, open_class);
        let array_index_out_of_bounds_exception = add(
            BinaryName::ARRAYINDEXOUTOFBOUNDSEXCEPTION,
            runtime_exception,
            open_class,
        );
        let array_store_exception = add(BinaryName::ARRAYSTOREEXCEPTION, runtime_exception, open_class);
        let class_cast_exception = add(BinaryName::CLASSCASTEXCEPTION, runtime_exception, open_class);
        let illegal_monitor_state_exception = add(
            BinaryName::ILLEGALMONITORSTATEEXCEPTION,
            runtime_exception,
            open_class,
        );
        let negative_array_size_exception = add(
            BinaryName::NEGATIVEARRAYSIZEEXCEPTION,
            runtime_exception,
            open_class,
        );
        let null_pointer_exception = add(BinaryName::NULLPOINTEREXCEPTION, runtime_exception, open_class);

        let method_handle = add(BinaryName::METHODHANDLE, object, abstract_class);
        let method_type = add_with(BinaryName::METHODTYPE, object, final_class, vec![serializable]);

        LangClasses {
            object,
            cloneable,
            comparable,
            char_sequence,
            string,
            class,
            number,
            integer,
            long,
            float,
            double,
            throwable,
            error,
            exception,
            runtime_exception,
            arithmetic_exception,
            array_index_out_of_bounds_exception,
            array_store_exception,
            class_cast_exception,
            illegal_monitor_state_exception,
            negative_array_size_exception,
            null_pointer_exception,
            method_handle,
            method_type,
        }
    }
}
