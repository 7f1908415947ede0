use jvmopt::analysis::{
    BasicInvocationUnit, EvaluatorSettings, InstructionUsage, InstructionUsageMarker,
    PartialEvaluator, UsageMarkerSettings, ValueFactory,
};
use jvmopt::jvm::class_graph::{ClassGraph, ClassId, MethodData, MethodId};
use jvmopt::jvm::code::MethodBody;
use jvmopt::jvm::{MethodAccessFlags, Name, UnqualifiedName};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn static_method<'g>(
    class_graph: &ClassGraph<'g>,
    class: ClassId<'g>,
    name: &str,
    descriptor: &str,
) -> MethodId<'g> {
    class_graph.add_method(MethodData {
        class,
        name: UnqualifiedName::from_str(name).unwrap(),
        descriptor: class_graph.parse_method_descriptor(descriptor).unwrap(),
        access_flags: MethodAccessFlags::STATIC,
        retained: false,
    })
}

pub fn basic_evaluator<'g>(
    class_graph: &ClassGraph<'g>,
    settings: EvaluatorSettings,
) -> PartialEvaluator<'g, BasicInvocationUnit<'g>> {
    let factory = ValueFactory::new(settings.precision, class_graph);
    PartialEvaluator::new(settings, class_graph, BasicInvocationUnit::new(factory))
}

#[allow(dead_code)]
pub fn mark<'g>(class_graph: &ClassGraph<'g>, body: &MethodBody<'_, 'g>) -> InstructionUsage {
    let mut evaluator = basic_evaluator(class_graph, EvaluatorSettings::default());
    InstructionUsageMarker::new(UsageMarkerSettings::default())
        .mark(body, &mut evaluator, None)
        .unwrap()
}
