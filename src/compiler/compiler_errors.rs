use crate::compiler::compiler_warnings::CompilerWarning;
use crate::compiler::ir::proc_nodes::TextLocation;
use serde_json::json;
use std::collections::HashMap;

// The final set of errors and warnings emitted from the lifecycle pass
#[derive(Debug, Default)]
pub struct CompilerMessages {
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CompilerWarning>,
}

impl CompilerMessages {
    pub fn new() -> Self {
        CompilerMessages {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn push_error(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn push_warning(&mut self, warning: CompilerWarning) {
        self.warnings.push(warning);
    }
}

#[derive(Debug, Eq, Hash, PartialEq)]
pub enum ErrorMetaDataKey {
    OperatorName,
    CompilationStage,

    // Optional suggestions
    // Can be expanded to add more later
    PrimarySuggestion,     // One-line fix or top-level idea
    AlternativeSuggestion, // Secondary alternative

    // Lifecycle binding information
    ExpectedShape, // The parameter shape the operator requires
    ReceiverKind,  // What the offending receiver actually was
    Indirection,   // "reference" or "pointer" for =deepCopy bindings
    ContextKind,   // Which syntactic position a destructible value occupied
}

#[derive(Debug)]
pub struct CompileError {
    pub msg: String,

    pub location: TextLocation,
    pub error_type: ErrorType,

    // This is for creating more structured and detailed error messages
    // Optimized for LLMs to understand exactly what went wrong
    pub metadata: HashMap<ErrorMetaDataKey, &'static str>,
}

impl CompileError {
    pub fn new(
        msg: impl Into<String>,
        location: TextLocation,
        error_type: ErrorType,
    ) -> CompileError {
        CompileError {
            msg: msg.into(),
            location,
            error_type,
            metadata: HashMap::new(),
        }
    }

    pub fn with_error_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = error_type;
        self
    }

    pub fn new_metadata_entry(&mut self, key: ErrorMetaDataKey, value: &'static str) {
        self.metadata.insert(key, value);
    }

    /// Create a malformed-config error (no source position)
    pub fn config_error(msg: impl Into<String>) -> Self {
        CompileError {
            msg: msg.into(),
            location: TextLocation::default(),
            error_type: ErrorType::Config,
            metadata: HashMap::new(),
        }
    }

    /// Create a compiler error (internal bug, not user's fault)
    pub fn compiler_error(msg: impl Into<String>) -> Self {
        CompileError {
            msg: msg.into(),
            location: TextLocation::default(),
            error_type: ErrorType::Compiler,
            metadata: HashMap::new(),
        }
    }

    /// Create the fatal error for a control-flow edge the front end failed
    /// to enumerate. The destructor schedule can't be trusted after this,
    /// so unit processing stops.
    pub fn missing_scope_exit_edge(msg: impl Into<String>, location: TextLocation) -> Self {
        CompileError {
            msg: msg.into(),
            location,
            error_type: ErrorType::MissingScopeExitEdge,
            metadata: HashMap::new(),
        }
    }

    /// Fatal errors abort the compilation unit instead of being collected.
    /// Everything else is reported and recovered from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.error_type,
            ErrorType::MissingScopeExitEdge | ErrorType::Compiler
        )
    }

    /// Structured form for tooling that consumes the diagnostics stream
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "type": error_type_to_str(&self.error_type),
            "message": self.msg,
            "line": self.location.start_pos.line_number,
            "column": self.location.start_pos.char_column,
            "metadata": self
                .metadata
                .iter()
                .map(|(key, value)| (format!("{key:?}"), *value))
                .collect::<HashMap<String, &str>>(),
        })
    }
}

// The error taxonomy of the lifecycle pass.
// One variant per user-facing failure, plus Config and Compiler buckets.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum ErrorType {
    /// A second operator of the same kind bound to the same nominal type
    DuplicateBinding,
    /// Parameter count/shape or return type doesn't match the operator contract
    InvalidSignature,
    /// Operator bound to a compound, builtin or indirection type
    NonNominalReceiver,
    /// `=deepCopy` reached the same nominal through both ref and ptr
    ConflictingIndirectionBinding,
    /// A self-referential compound with no intervening indirection
    UnresolvableRecursiveType,
    /// A destructible value in a position outside the context whitelist
    IllegalDestructibleUsage,
    /// Internal: a control-flow edge leaving a scope was not enumerated
    MissingScopeExitEdge,
    Config,
    Compiler,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::DuplicateBinding => "Duplicate Lifecycle Binding",
        ErrorType::InvalidSignature => "Invalid Operator Signature",
        ErrorType::NonNominalReceiver => "Non-Nominal Receiver",
        ErrorType::ConflictingIndirectionBinding => "Conflicting Indirection Binding",
        ErrorType::UnresolvableRecursiveType => "Unresolvable Recursive Type",
        ErrorType::IllegalDestructibleUsage => "Illegal Destructible Usage",
        ErrorType::MissingScopeExitEdge => "Missing Scope Exit Edge (Compiler Bug)",
        ErrorType::Config => "Malformed Config",
        ErrorType::Compiler => "Compiler Bug",
    }
}

/// Returns a new CompileError for lifecycle binding and usage violations.
///
/// Usage:
/// `return_lifecycle_error!(DuplicateBinding, "message", location, {
///     OperatorName => "=destroy",
///     PrimarySuggestion => "Remove one of the two bindings",
/// })`;
#[macro_export]
macro_rules! return_lifecycle_error {
    ($error_type:ident, $msg:expr, $loc:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::compiler::compiler_errors::CompileError {
            msg: $msg.into(),
            location: $loc,
            error_type: $crate::compiler::compiler_errors::ErrorType::$error_type,
            metadata: {
                let mut map = std::collections::HashMap::new();
                $(
                    map.insert($crate::compiler::compiler_errors::ErrorMetaDataKey::$key, $value);
                )*
                map
            },
        })
    };
}

/// Returns a new CompileError for internal invariant violations.
/// These abort the unit, they are never user errors.
#[macro_export]
macro_rules! return_compiler_error {
    ($msg:expr) => {
        return Err($crate::compiler::compiler_errors::CompileError::compiler_error($msg))
    };
    ($msg:expr, $loc:expr) => {
        return Err($crate::compiler::compiler_errors::CompileError::new(
            $msg,
            $loc,
            $crate::compiler::compiler_errors::ErrorType::Compiler,
        ))
    };
}
