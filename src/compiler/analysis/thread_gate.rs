//! Cross-thread deep-copy annotation.
//!
//! Every task-submission expression hands its arguments to another
//! execution unit. Before the handoff, each argument is deep-copied on the
//! submitting thread: through the user's `=deepCopy` (or its lifted form)
//! when one resolves, otherwise through a structural clone of every
//! reachable indirection. Either way no two execution units ever observe
//! the same mutable heap location after submission.
//!
//! This pass only annotates; codegen emits the actual calls. The copy
//! happens eagerly at submission even for tasks that are never scheduled,
//! so cancellation can't leak a shared indirection.

use crate::compiler::compiler_errors::CompilerMessages;
use crate::compiler::datatypes::{OpKind, TypeId};
use crate::compiler::ir::proc_nodes::{Expr, ExprKind, Procedure, ScopeId, StmtKind, TextLocation};
use crate::compiler::lifecycle::lifting::{EffectiveOp, LiftingResolver};
use crate::compiler::string_interning::StringId;

/// How one argument crosses the execution-unit boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgCopy {
    /// Emit a call to the resolved user override or lifted plan
    Invoke(EffectiveOp),

    /// No user operation anywhere in the structure: emit the runtime's
    /// structural clone, recursively duplicating reachable indirections
    StructuralClone,
}

#[derive(Debug, Clone)]
pub struct SpawnArgCopy {
    pub index: u32,
    pub ty: TypeId,
    pub copy: ArgCopy,
}

/// Annotation for one task-submission site
#[derive(Debug, Clone)]
pub struct SpawnAnnotation {
    pub callee: StringId,
    pub location: TextLocation,
    pub arg_copies: Vec<SpawnArgCopy>,
}

/// Find every spawn site in a procedure and resolve the deep-copy operation
/// for each argument. DeepCopy resolution is independent of Assign/Destroy:
/// a type may define one without the others.
pub fn annotate_spawn_sites(
    procedure: &Procedure,
    resolver: &mut LiftingResolver,
    messages: &mut CompilerMessages,
) -> Vec<SpawnAnnotation> {
    let mut gate = CrossThreadGate {
        resolver,
        annotations: Vec::new(),
    };

    gate.visit_scope(procedure, procedure.root, messages);
    gate.annotations
}

struct CrossThreadGate<'a, 'r> {
    resolver: &'a mut LiftingResolver<'r>,
    annotations: Vec<SpawnAnnotation>,
}

impl<'a, 'r> CrossThreadGate<'a, 'r> {
    fn visit_scope(&mut self, procedure: &Procedure, scope: ScopeId, messages: &mut CompilerMessages) {
        for stmt in &procedure.scope(scope).statements {
            match &stmt.kind {
                StmtKind::VarDecl { init, .. } | StmtKind::LetDecl { init, .. } => {
                    self.visit_expr(init, messages);
                }

                StmtKind::Assign { value, .. } => self.visit_expr(value, messages),

                StmtKind::ExprStmt(expr) => self.visit_expr(expr, messages),

                StmtKind::Return { value, .. } => {
                    if let Some(expr) = value {
                        self.visit_expr(expr, messages);
                    }
                }

                StmtKind::Break { .. } | StmtKind::Continue { .. } => {}

                StmtKind::If {
                    condition,
                    then_scope,
                    else_scope,
                } => {
                    self.visit_expr(condition, messages);
                    self.visit_scope(procedure, *then_scope, messages);
                    if let Some(else_scope) = else_scope {
                        self.visit_scope(procedure, *else_scope, messages);
                    }
                }

                StmtKind::While { condition, body } => {
                    self.visit_expr(condition, messages);
                    self.visit_scope(procedure, *body, messages);
                }

                StmtKind::Block(inner) => self.visit_scope(procedure, *inner, messages),
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr, messages: &mut CompilerMessages) {
        match &expr.kind {
            ExprKind::Spawn { callee, args } => {
                let mut arg_copies = Vec::with_capacity(args.len());

                for (index, arg) in args.iter().enumerate() {
                    let copy = match self.resolver.resolve(arg.ty, OpKind::DeepCopy, messages) {
                        EffectiveOp::Default => ArgCopy::StructuralClone,
                        resolved => ArgCopy::Invoke(resolved),
                    };

                    arg_copies.push(SpawnArgCopy {
                        index: index as u32,
                        ty: arg.ty,
                        copy,
                    });

                    self.visit_expr(arg, messages);
                }

                self.annotations.push(SpawnAnnotation {
                    callee: *callee,
                    location: expr.location,
                    arg_copies,
                });
            }

            ExprKind::Field { base, .. } => self.visit_expr(base, messages),

            ExprKind::Call { args, .. } | ExprKind::Construct { args } => {
                for arg in args {
                    self.visit_expr(arg, messages);
                }
            }

            ExprKind::None
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Local(_) => {}
        }
    }
}
