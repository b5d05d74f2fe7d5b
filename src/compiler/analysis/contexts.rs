//! Destructible-context validation.
//!
//! A value whose type has a non-default Destroy operation may only be
//! materialized in a position the policy table whitelists: variable
//! initialization, return value, or result assignment by default. The check
//! is purely syntactic, control flow never changes the answer.
//!
//! The whitelist is read from Config rather than hard-coded: the plan of
//! record is to replace this coarse approximation with an escape analysis,
//! and a policy table keeps that door open.

use crate::compiler::compiler_errors::{CompileError, CompilerMessages, ErrorMetaDataKey, ErrorType};
use crate::compiler::datatypes::TypeArena;
use crate::compiler::ir::proc_nodes::{Expr, ExprKind, Procedure, ScopeId, StmtKind};
use crate::compiler::lifecycle::lifting::LiftingResolver;
use crate::compiler::string_interning::StringTable;
use crate::settings::{Config, ContextSite};

/// Check every expression of every statement in a procedure body.
/// Violations are collected; the walk never stops early.
pub fn validate_destructible_contexts(
    procedure: &Procedure,
    arena: &TypeArena,
    string_table: &StringTable,
    resolver: &mut LiftingResolver,
    config: &Config,
    messages: &mut CompilerMessages,
) {
    let mut validator = ContextValidator {
        arena,
        string_table,
        resolver,
        config,
    };

    validator.check_scope(procedure, procedure.root, messages);
}

struct ContextValidator<'a, 'r> {
    arena: &'a TypeArena,
    string_table: &'a StringTable,
    resolver: &'a mut LiftingResolver<'r>,
    config: &'a Config,
}

impl<'a, 'r> ContextValidator<'a, 'r> {
    fn check_scope(&mut self, procedure: &Procedure, scope: ScopeId, messages: &mut CompilerMessages) {
        for stmt in &procedure.scope(scope).statements {
            match &stmt.kind {
                StmtKind::VarDecl { init, .. } => {
                    self.check_expr(init, ContextSite::VarInit, messages);
                }

                StmtKind::LetDecl { init, .. } => {
                    self.check_expr(init, ContextSite::LetInit, messages);
                }

                StmtKind::Assign { value, .. } => {
                    self.check_expr(value, ContextSite::ResultAssignment, messages);
                }

                StmtKind::ExprStmt(expr) => {
                    self.check_expr(expr, ContextSite::Other, messages);
                }

                StmtKind::Return { value, .. } => {
                    if let Some(expr) = value {
                        self.check_expr(expr, ContextSite::ReturnValue, messages);
                    }
                }

                StmtKind::Break { .. } | StmtKind::Continue { .. } => {}

                StmtKind::If {
                    condition,
                    then_scope,
                    else_scope,
                } => {
                    self.check_expr(condition, ContextSite::Other, messages);
                    self.check_scope(procedure, *then_scope, messages);
                    if let Some(else_scope) = else_scope {
                        self.check_scope(procedure, *else_scope, messages);
                    }
                }

                StmtKind::While { condition, body } => {
                    self.check_expr(condition, ContextSite::Other, messages);
                    self.check_scope(procedure, *body, messages);
                }

                StmtKind::Block(inner) => self.check_scope(procedure, *inner, messages),
            }
        }
    }

    /// `site` is the position of this node itself. Nested sub-expressions
    /// are always `Other`: an allowed site legalizes exactly one
    /// materialization, not a whole subtree of them.
    fn check_expr(&mut self, expr: &Expr, site: ContextSite, messages: &mut CompilerMessages) {
        if expr.materializes_value()
            && self.resolver.is_destructible(expr.ty, messages)
            && !self.config.destructible_contexts.contains(&site)
        {
            messages.push_error(self.illegal_usage(expr, site));
        }

        match &expr.kind {
            ExprKind::Field { base, .. } => {
                self.check_expr(base, ContextSite::Other, messages);
            }

            ExprKind::Call { args, .. }
            | ExprKind::Construct { args }
            | ExprKind::Spawn { args, .. } => {
                for arg in args {
                    self.check_expr(arg, ContextSite::Other, messages);
                }
            }

            ExprKind::None
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Local(_) => {}
        }
    }

    fn illegal_usage(&self, expr: &Expr, site: ContextSite) -> CompileError {
        let mut error = CompileError::new(
            format!(
                "A value of type {} has a destructor and can only appear in a destructible \
                 context (variable initialization, return value, or result assignment)",
                self.arena.display_type(expr.ty, self.string_table)
            ),
            expr.location,
            ErrorType::IllegalDestructibleUsage,
        );

        error.new_metadata_entry(ErrorMetaDataKey::ContextKind, site.as_str());
        error.new_metadata_entry(
            ErrorMetaDataKey::PrimarySuggestion,
            "Bind the value to a variable first",
        );

        error
    }
}
