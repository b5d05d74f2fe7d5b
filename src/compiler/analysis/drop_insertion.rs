//! Destructor call scheduling at scope exits.
//!
//! For every enumerated exit edge of every scope, computes which live
//! destructible locals must be destroyed before control leaves, and in what
//! order. The output is an annotation table consumed by codegen; nothing in
//! the IR is mutated here.
//!
//! Ordering rules:
//!  - locals within one scope are destroyed in reverse declaration order
//!  - unwinding edges (return/break/continue) destroy the innermost scope's
//!    locals first, then each enclosing scope being unwound
//!  - parameters are never destroyed, only locals declared in the body
//!  - a `return x` consumes `x`: ownership leaves the procedure, so `x` is
//!    excluded from that edge's schedule

use crate::compiler::compiler_errors::{CompileError, CompilerMessages};
use crate::compiler::datatypes::{OpKind, TypeId};
use crate::compiler::ir::proc_nodes::{
    EdgeId, ExitKind, Expr, ExprKind, LocalDecl, LocalId, Procedure, ScopeId, ScopeKind, ScopeNode,
    Stmt, StmtKind, TextLocation,
};
use crate::compiler::lifecycle::lifting::{EffectiveOp, LiftingResolver};
use crate::compiler::string_interning::StringTable;
use crate::drop_log;
use crate::settings::DROPS_PER_EDGE_CAPACITY;
use rustc_hash::FxHashMap;

/// One scheduled destructor invocation on an exit edge
#[derive(Debug, Clone)]
pub struct ScheduledDrop {
    pub local: LocalId,
    pub ty: TypeId,
    pub op: EffectiveOp,
    pub location: TextLocation,
}

/// The full destructor schedule for one procedure, keyed by exit edge.
/// Edges with nothing to destroy have no entry: no synthesized calls are
/// emitted for them.
#[derive(Debug, Default)]
pub struct DestructorSchedule {
    edge_drops: FxHashMap<EdgeId, Vec<ScheduledDrop>>,
}

impl DestructorSchedule {
    pub fn drops_for_edge(&self, edge: EdgeId) -> &[ScheduledDrop] {
        self.edge_drops.get(&edge).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges(&self) -> impl Iterator<Item = (&EdgeId, &Vec<ScheduledDrop>)> {
        self.edge_drops.iter()
    }

    pub fn total_scheduled(&self) -> usize {
        self.edge_drops.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_drops.is_empty()
    }
}

/// Build the destructor schedule for a procedure.
///
/// The only failure here is fatal: a control-flow edge leaving a scope that
/// the front end's CFG construction did not enumerate. The schedule can't
/// be trusted without the complete edge set, so the unit aborts.
pub fn insert_destructor_calls(
    procedure: &Procedure,
    string_table: &StringTable,
    resolver: &mut LiftingResolver,
    messages: &mut CompilerMessages,
) -> Result<DestructorSchedule, CompileError> {
    let mut inserter = ScopeExitInserter {
        procedure,
        string_table,
        resolver,
        schedule: DestructorSchedule::default(),
    };

    let mut frames = Vec::new();
    inserter.walk_scope(procedure.root, &mut frames, messages)?;

    Ok(inserter.schedule)
}

/// Live destructible locals of one scope on the walk stack,
/// in declaration order
struct ScopeFrame {
    kind: ScopeKind,
    live: Vec<ScheduledDrop>,
}

struct ScopeExitInserter<'a, 'r> {
    procedure: &'a Procedure,
    string_table: &'a StringTable,
    resolver: &'a mut LiftingResolver<'r>,
    schedule: DestructorSchedule,
}

impl<'a, 'r> ScopeExitInserter<'a, 'r> {
    fn walk_scope(
        &mut self,
        scope_id: ScopeId,
        frames: &mut Vec<ScopeFrame>,
        messages: &mut CompilerMessages,
    ) -> Result<(), CompileError> {
        let procedure = self.procedure;
        let scope = procedure.scope(scope_id);

        frames.push(ScopeFrame {
            kind: scope.kind,
            live: Vec::with_capacity(DROPS_PER_EDGE_CAPACITY),
        });

        for stmt in &scope.statements {
            match &stmt.kind {
                StmtKind::VarDecl { local, .. } | StmtKind::LetDecl { local, .. } => {
                    self.track_local(local, frames, messages);
                }

                StmtKind::Assign { .. } | StmtKind::ExprStmt(_) => {}

                StmtKind::Return { value, edge } => {
                    self.require_edge(scope, *edge, ExitKind::Return, stmt)?;

                    // Unwind every scope up to and including the procedure body
                    let drops = collect_unwind_drops(frames, 0, consumed_local(value.as_ref()));
                    self.record(*edge, drops);
                }

                StmtKind::Break { edge } => {
                    self.require_edge(scope, *edge, ExitKind::Break, stmt)?;
                    let loop_frame = self.innermost_loop_frame(frames, stmt)?;
                    self.record(*edge, collect_unwind_drops(frames, loop_frame, None));
                }

                StmtKind::Continue { edge } => {
                    self.require_edge(scope, *edge, ExitKind::Continue, stmt)?;
                    let loop_frame = self.innermost_loop_frame(frames, stmt)?;
                    self.record(*edge, collect_unwind_drops(frames, loop_frame, None));
                }

                StmtKind::If {
                    then_scope,
                    else_scope,
                    ..
                } => {
                    self.walk_scope(*then_scope, frames, messages)?;
                    if let Some(else_scope) = else_scope {
                        self.walk_scope(*else_scope, frames, messages)?;
                    }
                }

                StmtKind::While { body, .. } => {
                    self.walk_scope(*body, frames, messages)?;
                }

                StmtKind::Block(inner) => {
                    self.walk_scope(*inner, frames, messages)?;
                }
            }
        }

        if scope_falls_through(scope) {
            let Some(edge) = scope.fallthrough_edge() else {
                return Err(CompileError::missing_scope_exit_edge(
                    format!(
                        "Scope {} of '{}' can complete normally but has no enumerated \
                         fallthrough edge",
                        scope_id.0,
                        self.string_table.resolve(procedure.name)
                    ),
                    procedure.location,
                ));
            };

            // Fallthrough only leaves this one scope
            let innermost = frames.len() - 1;
            let drops = collect_unwind_drops(frames, innermost, None);
            self.record(edge.id, drops);
        }

        frames.pop();
        Ok(())
    }

    fn track_local(
        &mut self,
        local: &LocalDecl,
        frames: &mut [ScopeFrame],
        messages: &mut CompilerMessages,
    ) {
        let op = self.resolver.resolve(local.ty, OpKind::Destroy, messages);
        if op.is_default() {
            return;
        }

        let frame = frames.last_mut().expect("walk always has a frame");
        frame.live.push(ScheduledDrop {
            local: local.id,
            ty: local.ty,
            op,
            location: local.location,
        });
    }

    fn record(&mut self, edge: EdgeId, drops: Vec<ScheduledDrop>) {
        if drops.is_empty() {
            return;
        }

        drop_log!(
            "scheduled {} destructor call(s) on edge {} of '{}'",
            drops.len(),
            edge.0,
            self.string_table.resolve(self.procedure.name)
        );

        self.schedule.edge_drops.insert(edge, drops);
    }

    fn require_edge(
        &self,
        scope: &ScopeNode,
        edge: EdgeId,
        expected: ExitKind,
        stmt: &Stmt,
    ) -> Result<(), CompileError> {
        match scope.find_edge(edge) {
            Some(found) if found.kind == expected => Ok(()),

            Some(found) => Err(CompileError::missing_scope_exit_edge(
                format!(
                    "Exit edge {} of '{}' is enumerated as {:?} but the statement leaves \
                     the scope as {:?}",
                    edge.0,
                    self.string_table.resolve(self.procedure.name),
                    found.kind,
                    expected
                ),
                stmt.location,
            )),

            None => Err(CompileError::missing_scope_exit_edge(
                format!(
                    "A {:?} statement in '{}' leaves its scope along edge {} which the \
                     front end never enumerated",
                    expected,
                    self.string_table.resolve(self.procedure.name),
                    edge.0
                ),
                stmt.location,
            )),
        }
    }

    /// Break/continue unwind up to and including the nearest loop body.
    /// Reaching one outside any loop means CFG construction went wrong.
    fn innermost_loop_frame(
        &self,
        frames: &[ScopeFrame],
        stmt: &Stmt,
    ) -> Result<usize, CompileError> {
        frames
            .iter()
            .rposition(|frame| frame.kind == ScopeKind::LoopBody)
            .ok_or_else(|| {
                CompileError::missing_scope_exit_edge(
                    format!(
                        "A loop exit in '{}' has no enclosing loop body scope",
                        self.string_table.resolve(self.procedure.name)
                    ),
                    stmt.location,
                )
            })
    }
}

/// A `return x` hands `x` out of the procedure instead of destroying it
fn consumed_local(value: Option<&Expr>) -> Option<LocalId> {
    match value {
        Some(Expr {
            kind: ExprKind::Local(local),
            ..
        }) => Some(*local),
        _ => None,
    }
}

/// Collect drops for every frame from `from` to the innermost, innermost
/// scope first, each frame's locals in reverse declaration order.
fn collect_unwind_drops(
    frames: &[ScopeFrame],
    from: usize,
    consumed: Option<LocalId>,
) -> Vec<ScheduledDrop> {
    let mut drops = Vec::new();

    for frame in frames[from..].iter().rev() {
        for scheduled in frame.live.iter().rev() {
            if consumed == Some(scheduled.local) {
                continue;
            }
            drops.push(scheduled.clone());
        }
    }

    drops
}

/// Can control reach the end of this scope's statement list?
/// A purely syntactic check: the last statement either terminates or the
/// scope falls through.
fn scope_falls_through(scope: &ScopeNode) -> bool {
    !matches!(
        scope.statements.last().map(|stmt| &stmt.kind),
        Some(StmtKind::Return { .. }) | Some(StmtKind::Break { .. }) | Some(StmtKind::Continue { .. })
    )
}
