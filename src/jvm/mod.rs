//! Read-only model of JVM classes and method code
//!
//! ### Simple example
//!
//! Consider the following simple Java method:
//!
//! ```java,ignore,no_run
//! public class Point {
//!     static int twice(int x) {
//!         return x * 2;
//!     }
//! }
//! ```
//!
//! Its body can be modelled and evaluated as follows:
//!
//! ```
//! use jvmopt::analysis::{BasicInvocationUnit, EvaluatorSettings, PartialEvaluator, ValueFactory};
//! use jvmopt::jvm::class_graph::*;
//! use jvmopt::jvm::code::{Code, Instruction::*, MethodBody};
//! use jvmopt::jvm::*;
//!
//! # fn evaluate_method() -> Result<(), jvmopt::analysis::Error> {
//! // Setup the class graph, add in Java standard library types
//! let class_graph_arenas = ClassGraphArenas::new();
//! let class_graph = ClassGraph::new(&class_graph_arenas);
//! let java = class_graph.insert_java_library_types();
//!
//! // Declare the class and the method in the class graph
//! let class = class_graph.add_class(ClassData::new(
//!     BinaryName::from_string(String::from("me/alec/Point")).unwrap(),
//!     java.lang.object,
//!     ClassAccessFlags::PUBLIC,
//! ));
//! let twice = class_graph.add_method(MethodData {
//!     class,
//!     name: UnqualifiedName::from_string(String::from("twice")).unwrap(),
//!     descriptor: MethodDescriptor {
//!         parameters: vec![FieldType::int()],
//!         return_type: Some(FieldType::int()),
//!     },
//!     access_flags: MethodAccessFlags::STATIC,
//!     retained: false,
//! });
//!
//! // Lay out the method code
//! let constants = ConstantPool::new();
//! let code = Code::assemble(vec![ILoad(0), IConst2, IMul, IReturn], vec![], 2, 1)?;
//! let body = MethodBody::new(twice, &code, &constants);
//!
//! // Evaluate it
//! let settings = EvaluatorSettings::default();
//! let factory = ValueFactory::new(settings.precision, &class_graph);
//! let unit = BasicInvocationUnit::new(factory);
//! let mut evaluator = PartialEvaluator::new(settings, &class_graph, unit);
//! let trace = evaluator.evaluate(&body)?;
//! assert!(trace.is_traced(3));
//! # Ok(())
//! # }
//! # evaluate_method().unwrap();
//! ```

mod access_flags;
pub mod class_graph;
pub mod code;
mod constants;
mod descriptors;
mod errors;
mod names;

pub use access_flags::*;
pub use constants::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
