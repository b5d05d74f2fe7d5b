use crate::compiler::compiler_errors::{CompileError, CompilerMessages, ErrorType, error_type_to_str};
use crate::compiler::compiler_warnings::print_formatted_warning;
use saying::say;

/// Format and print out every collected message.
/// The lifecycle pass holds no source text, so this prints positions and
/// structured hints rather than code snippets.
pub fn print_compiler_messages(messages: &CompilerMessages) {
    for err in &messages.errors {
        print_formatted_error(err);
    }

    for warning in &messages.warnings {
        print_formatted_warning(warning);
    }
}

pub fn print_formatted_error(e: &CompileError) {
    let kind = error_type_to_str(&e.error_type);
    let line_number = e.location.start_pos.line_number;
    let msg = e.msg.as_str();

    match e.error_type {
        ErrorType::Compiler | ErrorType::MissingScopeExitEdge => {
            say!(Red "Compiler Bug ヽ༼☉ ‿ ⚆༽ﾉ this one is on us, not on your code");
            say!(Dark Red kind, ": ", msg);
        }

        ErrorType::Config => {
            say!(Dark Yellow "Malformed Config: ", msg);
        }

        _ => {
            say!(Dark Magenta kind);
            if line_number >= 0 {
                let position = format!("line {line_number}: ");
                say!(Red position, msg);
            } else {
                say!(Red msg);
            }

            for (key, value) in &e.metadata {
                let hint = format!("  {key:?}: {value}");
                say!(Dark Yellow hint);
            }
        }
    }
}
