pub mod settings;

pub mod compiler {
    pub mod compiler_dev_logging;
    pub mod compiler_errors;
    pub mod compiler_warnings;
    pub mod datatypes;
    pub mod display_messages;
    pub mod string_interning;

    pub mod ir {
        pub mod proc_nodes;
        pub(crate) mod validation;
    }

    pub mod lifecycle {
        pub mod binder;
        pub mod lifting;
        pub mod registry;

        #[cfg(test)]
        mod tests;
    }

    pub mod analysis {
        pub mod contexts;
        pub mod drop_insertion;
        pub mod thread_gate;

        #[cfg(test)]
        mod tests;
    }
}

use crate::compiler::analysis::contexts::validate_destructible_contexts;
use crate::compiler::analysis::drop_insertion::{DestructorSchedule, insert_destructor_calls};
use crate::compiler::analysis::thread_gate::{SpawnAnnotation, annotate_spawn_sites};
use crate::compiler::compiler_errors::{CompileError, CompilerMessages};
use crate::compiler::compiler_warnings::CompilerWarning;
use crate::compiler::datatypes::{NominalId, TypeArena};
use crate::compiler::ir::proc_nodes::Procedure;
use crate::compiler::ir::validation::validate_procedure;
use crate::compiler::lifecycle::binder::bind_operators;
use crate::compiler::lifecycle::lifting::{
    EffectiveOp, LiftedOp, LiftingResolver, ResolutionStats, expand_user_calls,
};
use crate::compiler::lifecycle::registry::{OperatorDecl, TypeRegistry};
use crate::compiler::string_interning::{StringId, StringTable};
use crate::settings::Config;
use rayon::prelude::*;
use std::time::Instant;

/// Everything the front end hands over for one compilation unit:
/// the resolved type graph, the reserved operator declarations, and the
/// procedure bodies to analyze.
pub struct CompilationUnit {
    pub string_table: StringTable,
    pub types: TypeArena,
    pub operator_decls: Vec<OperatorDecl>,
    pub procedures: Vec<Procedure>,
}

/// Per-procedure output of the pass, consumed by code generation
#[derive(Debug)]
pub struct ProcedureAnnotations {
    pub procedure: StringId,
    pub destructor_schedule: DestructorSchedule,
    pub spawn_sites: Vec<SpawnAnnotation>,
}

/// The validated output of one unit: annotated program points plus the
/// synthesized lifted plans the annotations refer to by id.
#[derive(Debug)]
pub struct UnitAnnotations {
    pub procedures: Vec<ProcedureAnnotations>,
    pub lifted_plans: Vec<LiftedOp>,
    pub stats: ResolutionStats,
    pub warnings: Vec<CompilerWarning>,
}

impl UnitAnnotations {
    /// Flatten an effective operation from these annotations into its
    /// sequence of user override invocations
    pub fn expanded_calls(&self, op: EffectiveOp) -> Vec<NominalId> {
        expand_user_calls(&self.lifted_plans, op)
    }
}

pub struct LifecycleCompiler<'a> {
    config: &'a Config,
}

impl<'a> LifecycleCompiler<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// -----------------------------
    ///   OPERATOR BINDING
    /// -----------------------------
    /// Validates every `=`, `=destroy` and `=deepCopy` declaration and
    /// records at most one binding per (nominal type, kind). The returned
    /// registry is sealed: bindings are immutable before the first
    /// resolver query, which is what lets the surrounding build process
    /// distinct units in parallel.
    pub fn bind_operators(
        &self,
        unit: &CompilationUnit,
        messages: &mut CompilerMessages,
    ) -> TypeRegistry {
        bind_operators(&unit.types, &unit.string_table, &unit.operator_decls, messages)
    }

    /// -----------------------------
    ///   IR VALIDATION
    /// -----------------------------
    /// Structural validation of the incoming procedure IR. A violated
    /// contract (dangling ids, broken scope tree) is an internal error from
    /// an upstream collaborator and aborts the unit.
    pub fn validate_ir(&self, unit: &CompilationUnit) -> Result<(), CompileError> {
        for procedure in &unit.procedures {
            validate_procedure(procedure, &unit.string_table)?;
        }
        Ok(())
    }

    /// -----------------------------
    ///   CONTEXT VALIDATION
    /// -----------------------------
    /// Rejects every destructible value materialized outside the
    /// whitelisted syntactic positions. Purely structural; violations are
    /// collected and analysis continues.
    pub fn check_destructible_contexts(
        &self,
        unit: &CompilationUnit,
        resolver: &mut LiftingResolver,
        messages: &mut CompilerMessages,
    ) {
        for procedure in &unit.procedures {
            validate_destructible_contexts(
                procedure,
                &unit.types,
                &unit.string_table,
                resolver,
                self.config,
                messages,
            );
        }
    }

    /// -----------------------------
    ///   DESTRUCTOR INSERTION
    /// -----------------------------
    /// Schedules destructor calls on every exit edge of every scope, in
    /// reverse declaration order. Returns one schedule per procedure, in
    /// unit order. An unenumerated exit edge is fatal.
    pub fn build_destructor_schedules(
        &self,
        unit: &CompilationUnit,
        resolver: &mut LiftingResolver,
        messages: &mut CompilerMessages,
    ) -> Result<Vec<DestructorSchedule>, CompileError> {
        let mut schedules = Vec::with_capacity(unit.procedures.len());

        for procedure in &unit.procedures {
            schedules.push(insert_destructor_calls(
                procedure,
                &unit.string_table,
                resolver,
                messages,
            )?);
        }

        Ok(schedules)
    }

    /// -----------------------------
    ///   CROSS-THREAD GATE
    /// -----------------------------
    /// Resolves the deep-copy operation for every argument of every task
    /// submission. Returns annotations per procedure, in unit order.
    pub fn annotate_spawn_sites(
        &self,
        unit: &CompilationUnit,
        resolver: &mut LiftingResolver,
        messages: &mut CompilerMessages,
    ) -> Vec<Vec<SpawnAnnotation>> {
        unit.procedures
            .iter()
            .map(|procedure| annotate_spawn_sites(procedure, resolver, messages))
            .collect()
    }
}

/// Run the whole lifecycle pass over one compilation unit.
///
/// User-facing errors are collected across all stages so one run surfaces
/// as many problems as possible; only an internal contract violation
/// (broken IR, missing exit edge) aborts early.
pub fn analyze_unit(unit: &CompilationUnit, config: &Config) -> Result<UnitAnnotations, CompilerMessages> {
    let compiler = LifecycleCompiler::new(config);
    let mut messages = CompilerMessages::new();

    let registry = compiler.bind_operators(unit, &mut messages);
    let mut resolver = LiftingResolver::new(&unit.types, &registry);

    if let Err(fatal) = compiler.validate_ir(unit) {
        messages.push_error(fatal);
        return Err(messages);
    }

    compiler.check_destructible_contexts(unit, &mut resolver, &mut messages);

    let schedules = match compiler.build_destructor_schedules(unit, &mut resolver, &mut messages) {
        Ok(schedules) => schedules,
        Err(fatal) => {
            messages.push_error(fatal);
            return Err(messages);
        }
    };

    let spawn_sites = compiler.annotate_spawn_sites(unit, &mut resolver, &mut messages);

    if config.warnings_disabled {
        messages.warnings.clear();
    } else {
        for warning in resolver.unused_override_warnings(&unit.string_table) {
            messages.push_warning(warning);
        }
    }

    let (lifted_plans, stats) = resolver.into_parts();

    if messages.has_errors() {
        messages.errors.truncate(config.error_limit);
        return Err(messages);
    }

    let procedures = unit
        .procedures
        .iter()
        .zip(schedules)
        .zip(spawn_sites)
        .map(|((procedure, destructor_schedule), spawn_sites)| ProcedureAnnotations {
            procedure: procedure.name,
            destructor_schedule,
            spawn_sites,
        })
        .collect();

    Ok(UnitAnnotations {
        procedures,
        lifted_plans,
        stats,
        warnings: messages.warnings,
    })
}

/// Analyze independent compilation units in parallel.
///
/// Safe by construction: each unit owns its arena and registry, and a
/// sealed registry is read-only, so units never share mutable state.
pub fn analyze_units(
    units: &[CompilationUnit],
    config: &Config,
) -> Vec<Result<UnitAnnotations, CompilerMessages>> {
    let time = Instant::now();

    let results = units
        .par_iter()
        .map(|unit| analyze_unit(unit, config))
        .collect();

    crate::timer_log!(time, "Lifecycle analysis of all units in: ");

    results
}
