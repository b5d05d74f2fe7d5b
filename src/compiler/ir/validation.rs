//! Procedure IR validation.
//!
//! Always-on structural validation of the IR handed over by the front end.
//! The lifecycle pass relies on a consistent contract: a well-formed scope
//! tree, unique local and edge IDs, and resolvable references. Violations
//! here are internal errors from an upstream collaborator, not user errors,
//! and abort the unit.

use crate::compiler::compiler_errors::CompileError;
use crate::compiler::ir::proc_nodes::{
    EdgeId, Expr, ExprKind, LocalDecl, LocalId, Procedure, ScopeId, ScopeKind, ScopeNode, StmtKind,
};
use crate::compiler::string_interning::StringTable;
use crate::return_compiler_error;
use rustc_hash::FxHashSet;

pub(crate) fn validate_procedure(
    procedure: &Procedure,
    string_table: &StringTable,
) -> Result<(), CompileError> {
    let mut validator = ProcValidator {
        procedure,
        string_table,
        local_ids: FxHashSet::default(),
        edge_ids: FxHashSet::default(),
        visited_scopes: FxHashSet::default(),
    };

    validator.validate()
}

struct ProcValidator<'a> {
    procedure: &'a Procedure,
    string_table: &'a StringTable,

    local_ids: FxHashSet<LocalId>,
    edge_ids: FxHashSet<EdgeId>,
    visited_scopes: FxHashSet<ScopeId>,
}

impl<'a> ProcValidator<'a> {
    fn validate(&mut self) -> Result<(), CompileError> {
        let procedure = self.procedure;

        for param in &procedure.params {
            self.declare_local(param)?;
        }

        let root = self.checked_scope(procedure.root)?;
        if root.parent.is_some() {
            return_compiler_error!(format!(
                "Root scope of '{}' has a parent",
                self.proc_name()
            ));
        }
        if root.kind != ScopeKind::ProcedureBody {
            return_compiler_error!(format!(
                "Root scope of '{}' is not a procedure body scope",
                self.proc_name()
            ));
        }

        self.validate_scope(procedure.root)?;

        // Orphaned scopes are not reachable from the root and would silently
        // escape every later pass
        if self.visited_scopes.len() != procedure.scopes.len() {
            return_compiler_error!(format!(
                "'{}' contains {} scope(s) unreachable from the root",
                self.proc_name(),
                procedure.scopes.len() - self.visited_scopes.len()
            ));
        }

        Ok(())
    }

    fn validate_scope(&mut self, scope_id: ScopeId) -> Result<(), CompileError> {
        let scope = self.checked_scope(scope_id)?;

        if !self.visited_scopes.insert(scope_id) {
            return_compiler_error!(format!(
                "Scope {} of '{}' is referenced more than once",
                scope_id.0,
                self.proc_name()
            ));
        }

        for edge in &scope.exit_edges {
            if !self.edge_ids.insert(edge.id) {
                return_compiler_error!(format!(
                    "Exit edge {} of '{}' is enumerated on more than one scope",
                    edge.id.0,
                    self.proc_name()
                ));
            }
        }

        for stmt in &scope.statements {
            match &stmt.kind {
                StmtKind::VarDecl { local, init } | StmtKind::LetDecl { local, init } => {
                    self.declare_local(local)?;
                    self.validate_expr(init)?;
                }

                StmtKind::Assign { target, value } => {
                    self.check_local_exists(*target)?;
                    self.validate_expr(value)?;
                }

                StmtKind::ExprStmt(expr) => self.validate_expr(expr)?,

                StmtKind::Return { value, .. } => {
                    if let Some(expr) = value {
                        self.validate_expr(expr)?;
                    }
                }

                StmtKind::Break { .. } | StmtKind::Continue { .. } => {}

                StmtKind::If {
                    condition,
                    then_scope,
                    else_scope,
                } => {
                    self.validate_expr(condition)?;
                    self.validate_child_scope(scope_id, *then_scope)?;
                    if let Some(else_scope) = else_scope {
                        self.validate_child_scope(scope_id, *else_scope)?;
                    }
                }

                StmtKind::While { condition, body } => {
                    self.validate_expr(condition)?;
                    let body_scope = self.checked_scope(*body)?;
                    if body_scope.kind != ScopeKind::LoopBody {
                        return_compiler_error!(format!(
                            "While body scope {} of '{}' is not marked as a loop body",
                            body.0,
                            self.proc_name()
                        ));
                    }
                    self.validate_child_scope(scope_id, *body)?;
                }

                StmtKind::Block(inner) => self.validate_child_scope(scope_id, *inner)?,
            }
        }

        Ok(())
    }

    fn validate_child_scope(&mut self, parent: ScopeId, child: ScopeId) -> Result<(), CompileError> {
        let child_scope = self.checked_scope(child)?;

        if child_scope.parent != Some(parent) {
            return_compiler_error!(format!(
                "Scope {} of '{}' is nested in scope {} but records parent {:?}",
                child.0,
                self.proc_name(),
                parent.0,
                child_scope.parent.map(|p| p.0)
            ));
        }

        self.validate_scope(child)
    }

    fn validate_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::Local(local) => self.check_local_exists(*local)?,

            ExprKind::Field { base, .. } => self.validate_expr(base)?,

            ExprKind::Call { args, .. }
            | ExprKind::Construct { args }
            | ExprKind::Spawn { args, .. } => {
                for arg in args {
                    self.validate_expr(arg)?;
                }
            }

            ExprKind::None | ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Float(_) => {}
        }

        Ok(())
    }

    fn declare_local(&mut self, local: &LocalDecl) -> Result<(), CompileError> {
        if !self.local_ids.insert(local.id) {
            return_compiler_error!(format!(
                "Local {} ('{}') of '{}' is declared twice",
                local.id.0,
                self.string_table.resolve(local.name),
                self.proc_name()
            ));
        }
        Ok(())
    }

    fn check_local_exists(&self, local: LocalId) -> Result<(), CompileError> {
        if !self.local_ids.contains(&local) {
            return_compiler_error!(format!(
                "'{}' references local {} before any declaration",
                self.proc_name(),
                local.0
            ));
        }
        Ok(())
    }

    fn checked_scope(&self, scope_id: ScopeId) -> Result<&'a ScopeNode, CompileError> {
        match self.procedure.try_scope(scope_id) {
            Some(scope) => Ok(scope),
            None => Err(CompileError::compiler_error(format!(
                "'{}' references scope {} outside its scope arena",
                self.proc_name(),
                scope_id.0
            ))),
        }
    }

    fn proc_name(&self) -> &str {
        self.string_table.resolve(self.procedure.name)
    }
}
