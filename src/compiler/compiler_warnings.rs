use crate::compiler::ir::proc_nodes::TextLocation;
use colour::yellow_ln_bold;

#[derive(Clone, Debug)]
pub struct CompilerWarning {
    pub msg: String,
    pub location: TextLocation,
    pub warning_kind: WarningKind,
}

impl CompilerWarning {
    pub fn new(msg: &str, location: TextLocation, warning_kind: WarningKind) -> CompilerWarning {
        CompilerWarning {
            msg: msg.to_owned(),
            location,
            warning_kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WarningKind {
    /// A bound lifecycle operator whose nominal type is never resolved by
    /// any procedure in the unit
    UnusedLifecycleOverride,

    /// A user =destroy on an object whose fields have their own destructors.
    /// The override replaces the lifted per-field logic entirely, so the
    /// user implementation is now responsible for those fields.
    OverrideShadowsFieldDestructors,
}

pub fn print_formatted_warning(warning: &CompilerWarning) {
    yellow_ln_bold!(
        "Warning (line {}): {}",
        warning.location.start_pos.line_number,
        warning.msg
    );
}
