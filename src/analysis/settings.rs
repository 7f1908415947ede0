use super::Precision;

/// Configuration of the partial evaluator
#[derive(Clone, Debug)]
pub struct EvaluatorSettings {
    /// Precision of the values created during evaluation
    pub precision: Precision,

    /// Seed `this` as a non-null reference to exactly the declaring class (or a subclass, if the
    /// class is not final) instead of asking the invocation unit
    pub evaluate_this_precisely: bool,

    /// Use nullability to prune control flow around dereferences
    ///
    /// Dereferencing a value that is definitely `null` can only throw, and `getfield`,
    /// `putfield`, and `arraylength` on a value that is definitely not `null` cannot throw.
    pub predict_null_pointer_exceptions: bool,

    /// Follow edges from instructions that may throw into the handlers protecting them
    pub include_exception_handler_edges: bool,

    /// Follow every branch target, even when the branch condition is known
    pub evaluate_all_code: bool,

    /// Number of times an instruction gets evaluated before merges into its state start
    /// widening values
    pub widening_threshold: u32,

    /// Total number of instruction evaluations allowed for one method
    pub maximum_evaluations: usize,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        EvaluatorSettings {
            precision: Precision::default(),
            evaluate_this_precisely: false,
            predict_null_pointer_exceptions: true,
            include_exception_handler_edges: true,
            evaluate_all_code: false,
            widening_threshold: 5,
            maximum_evaluations: 100_000,
        }
    }
}

/// Configuration of the instruction usage marker
#[derive(Clone, Debug)]
pub struct UsageMarkerSettings {
    /// Evaluate the method again even when a trace is provided
    pub run_evaluator: bool,

    /// Keep the instructions the bytecode verifier relies on (subroutine jumps, casts, and
    /// constructor calls)
    pub ensure_safety_for_verifier: bool,

    /// Consider every method invocation to have an externally visible effect
    pub mark_external_side_effects: bool,
}

impl Default for UsageMarkerSettings {
    fn default() -> Self {
        UsageMarkerSettings {
            run_evaluator: false,
            ensure_safety_for_verifier: true,
            mark_external_side_effects: true,
        }
    }
}

/// Which values a [`super::StoringInvocationUnit`] records into its side table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageChannels {
    /// Values written into fields
    pub fields: bool,

    /// Arguments passed to methods
    pub parameters: bool,

    /// Values returned from methods
    pub return_values: bool,

    /// Answer queries from the side table when it has an entry for the member
    ///
    /// This only makes sense once every write to the members has been recorded, typically in a
    /// second pass over the program.
    pub read_back: bool,
}

impl StorageChannels {
    /// Record every channel, without reading anything back
    pub const RECORD_ALL: StorageChannels = StorageChannels {
        fields: true,
        parameters: true,
        return_values: true,
        read_back: false,
    };
}

impl Default for StorageChannels {
    fn default() -> Self {
        StorageChannels::RECORD_ALL
    }
}
