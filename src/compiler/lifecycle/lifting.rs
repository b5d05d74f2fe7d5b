//! Lifting resolution.
//!
//! Computes the effective lifecycle operation for any type by structural
//! recursion over the registry: a user override where one is bound, a
//! synthesized "lifted" plan where a constituent somewhere in the structure
//! has one, and the bitwise/no-op default everywhere else.
//!
//! Resolution is total for well-formed types and memoized per
//! (type identity, kind) for the lifetime of the compilation unit. The memo
//! never needs invalidation: the registry is sealed before the first query.

use crate::compiler::compiler_errors::{CompileError, CompilerMessages, ErrorType};
use crate::compiler::compiler_warnings::{CompilerWarning, WarningKind};
use crate::compiler::datatypes::{
    Indirection, NominalId, NominalKind, OpKind, TypeArena, TypeId, TypeKind,
};
use crate::compiler::ir::proc_nodes::TextLocation;
use crate::compiler::lifecycle::registry::TypeRegistry;
use crate::compiler::string_interning::StringTable;
use crate::ops_log;
use crate::settings::LIFTED_PLAN_CAPACITY;
use rustc_hash::{FxHashMap, FxHashSet};

// ============================================================
// Effective operations
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiftedOpId(pub u32);

/// The resolved outcome for one (type, operation kind) query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveOp {
    /// Bitwise copy / no-op destroy / structural deep copy.
    /// No synthesized code is emitted for this type.
    Default,

    /// The user's bound implementation for this nominal type
    Override(NominalId),

    /// A synthesized plan applying constituent operations slot by slot
    Lifted(LiftedOpId),
}

impl EffectiveOp {
    pub fn is_default(self) -> bool {
        self == EffectiveOp::Default
    }
}

/// One step of a lifted plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiftStep {
    /// Apply `op` to one object field or tuple slot
    Slot {
        index: u32,
        ty: TypeId,
        op: EffectiveOp,
    },

    /// Apply `op` to every element of an array or sequence, in index order.
    /// `count` is the static length for arrays, None for sequences whose
    /// length is only known at runtime.
    EachElement {
        count: Option<u32>,
        ty: TypeId,
        op: EffectiveOp,
    },

    /// Chain into the structural parent of an object.
    /// For Destroy this step always comes after the per-field steps.
    Base { nominal: NominalId, op: EffectiveOp },
}

#[derive(Debug, Clone)]
pub struct LiftedOp {
    pub ty: TypeId,
    pub kind: OpKind,
    pub steps: Vec<LiftStep>,
}

/// Flatten an effective operation into the sequence of user override
/// invocations it performs, in application order. Array elements repeat
/// their element operation `length` times; sequence elements appear once as
/// a representative (the real count is a runtime value).
pub fn expand_user_calls(plans: &[LiftedOp], op: EffectiveOp) -> Vec<NominalId> {
    fn push_calls(plans: &[LiftedOp], op: EffectiveOp, out: &mut Vec<NominalId>) {
        match op {
            EffectiveOp::Default => {}
            EffectiveOp::Override(nominal) => out.push(nominal),
            EffectiveOp::Lifted(id) => {
                for step in &plans[id.0 as usize].steps {
                    match step {
                        LiftStep::Slot { op, .. } | LiftStep::Base { op, .. } => {
                            push_calls(plans, *op, out)
                        }
                        LiftStep::EachElement { count, op, .. } => {
                            for _ in 0..count.unwrap_or(1) {
                                push_calls(plans, *op, out);
                            }
                        }
                    }
                }
            }
        }
    }

    let mut calls = Vec::new();
    push_calls(plans, op, &mut calls);
    calls
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionStats {
    pub queries: usize,
    pub memo_hits: usize,
    pub lifted_plans: usize,
    pub cycles_reported: usize,
}

// ============================================================
// Resolver
// ============================================================

pub struct LiftingResolver<'a> {
    arena: &'a TypeArena,
    registry: &'a TypeRegistry,

    memo: FxHashMap<(TypeId, OpKind), EffectiveOp>,
    lifted: Vec<LiftedOp>,

    /// Keys currently on the resolution stack, for cycle detection
    in_progress: FxHashSet<(TypeId, OpKind)>,

    /// Keys that hit a cycle while on the stack; forced to Default
    poisoned: FxHashSet<(TypeId, OpKind)>,

    /// Types already reported as unresolvably recursive.
    /// One diagnostic per offending type, however often it is queried.
    cycle_reported: FxHashSet<TypeId>,

    /// Registry entries that some resolution actually selected
    used_overrides: FxHashSet<(NominalId, OpKind)>,

    /// Object nominals already warned about destroy overrides shadowing
    /// field destructors
    shadow_warned: FxHashSet<NominalId>,

    stats: ResolutionStats,
}

impl<'a> LiftingResolver<'a> {
    /// The registry must be sealed: bindings are immutable before the first
    /// query, which is what makes the memo sound.
    pub fn new(arena: &'a TypeArena, registry: &'a TypeRegistry) -> Self {
        debug_assert!(
            registry.is_sealed(),
            "lifting resolution started before the binder phase completed"
        );

        Self {
            arena,
            registry,
            memo: FxHashMap::default(),
            lifted: Vec::with_capacity(LIFTED_PLAN_CAPACITY),
            in_progress: FxHashSet::default(),
            poisoned: FxHashSet::default(),
            cycle_reported: FxHashSet::default(),
            used_overrides: FxHashSet::default(),
            shadow_warned: FxHashSet::default(),
            stats: ResolutionStats::default(),
        }
    }

    /// Resolve the effective operation for a type.
    ///
    /// Total for well-formed types: every failure is reported into
    /// `messages` exactly once and resolved as Default so analysis can
    /// continue.
    pub fn resolve(
        &mut self,
        ty: TypeId,
        kind: OpKind,
        messages: &mut CompilerMessages,
    ) -> EffectiveOp {
        self.stats.queries += 1;

        if let Some(&cached) = self.memo.get(&(ty, kind)) {
            self.stats.memo_hits += 1;
            return cached;
        }

        if self.in_progress.contains(&(ty, kind)) {
            self.report_cycle(ty, messages);
            self.poisoned.insert((ty, kind));
            return EffectiveOp::Default;
        }

        self.in_progress.insert((ty, kind));
        let mut resolved = self.resolve_uncached(ty, kind, messages);
        self.in_progress.remove(&(ty, kind));

        if self.poisoned.remove(&(ty, kind)) {
            resolved = EffectiveOp::Default;
        }

        ops_log!("resolve {kind} for type {ty:?} -> {resolved:?}");
        self.memo.insert((ty, kind), resolved);
        resolved
    }

    /// Does this type have a non-default Destroy operation anywhere in its
    /// structure? The context validator and the scope-exit inserter both
    /// key off this.
    pub fn is_destructible(&mut self, ty: TypeId, messages: &mut CompilerMessages) -> bool {
        !self.resolve(ty, OpKind::Destroy, messages).is_default()
    }

    pub fn lifted(&self, id: LiftedOpId) -> &LiftedOp {
        &self.lifted[id.0 as usize]
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    /// Flatten an effective operation into the sequence of user override
    /// invocations it performs, in application order.
    pub fn expanded_calls(&self, op: EffectiveOp) -> Vec<NominalId> {
        expand_user_calls(&self.lifted, op)
    }

    /// Warnings for registry entries nothing in the unit ever selected
    pub fn unused_override_warnings(&self, string_table: &StringTable) -> Vec<CompilerWarning> {
        let mut warnings = Vec::new();

        for entry in self.registry.iter() {
            if self.used_overrides.contains(&(entry.target, entry.kind)) {
                continue;
            }

            let name = string_table.resolve(self.arena.nominal(entry.target).name);
            warnings.push(CompilerWarning::new(
                &format!("'{}' bound to {name} is never used by this unit", entry.kind),
                entry.location,
                WarningKind::UnusedLifecycleOverride,
            ));
        }

        warnings
    }

    /// Hand the synthesized plans and stats over to the caller once every
    /// query has been made. Codegen consumes the plans by LiftedOpId.
    pub fn into_parts(self) -> (Vec<LiftedOp>, ResolutionStats) {
        (self.lifted, self.stats)
    }

    // ============================================================
    // Resolution cases
    // ============================================================

    fn resolve_uncached(
        &mut self,
        ty: TypeId,
        kind: OpKind,
        messages: &mut CompilerMessages,
    ) -> EffectiveOp {
        let arena = self.arena;

        match arena.kind(ty) {
            TypeKind::None | TypeKind::Bool | TypeKind::Int | TypeKind::Float => {
                EffectiveOp::Default
            }

            // Indirections don't own their pointee for Assign/Destroy
            // purposes. For DeepCopy they are exactly where a user binding
            // fires.
            TypeKind::Reference(pointee) | TypeKind::Pointer(pointee) => match kind {
                OpKind::Assign | OpKind::Destroy => EffectiveOp::Default,
                OpKind::DeepCopy => self.deep_copy_through_indirection(ty, *pointee),
            },

            TypeKind::Nominal(nominal) => self.resolve_nominal(*nominal, kind, messages),

            TypeKind::Array { element, length } => {
                self.lift_homogeneous(ty, *element, Some(*length), kind, messages)
            }

            TypeKind::Sequence(element) => self.lift_homogeneous(ty, *element, None, kind, messages),

            TypeKind::Tuple(items) => {
                let items = items.clone();
                self.lift_tuple(ty, &items, kind, messages)
            }
        }
    }

    /// `=deepCopy` is bound to the pointee's nominal type but fires at the
    /// indirection occurrence, and only through the spelling it was bound
    /// with. The other spelling falls back to the structural clone.
    fn deep_copy_through_indirection(&mut self, ty: TypeId, pointee: TypeId) -> EffectiveOp {
        let arena = self.arena;

        let TypeKind::Nominal(nominal) = arena.kind(pointee) else {
            return EffectiveOp::Default;
        };

        let Some(entry) = self.registry.get(*nominal, OpKind::DeepCopy) else {
            return EffectiveOp::Default;
        };

        let spelling = match arena.kind(ty) {
            TypeKind::Reference(_) => Indirection::Reference,
            _ => Indirection::Pointer,
        };

        if entry.indirection == Some(spelling) {
            self.used_overrides.insert((*nominal, OpKind::DeepCopy));
            EffectiveOp::Override(*nominal)
        } else {
            EffectiveOp::Default
        }
    }

    fn resolve_nominal(
        &mut self,
        nominal: NominalId,
        kind: OpKind,
        messages: &mut CompilerMessages,
    ) -> EffectiveOp {
        let arena = self.arena;

        // A direct binding wins over any structure. =deepCopy bindings hang
        // off the indirection occurrences instead, so a by-value occurrence
        // of the nominal still resolves structurally.
        if kind != OpKind::DeepCopy && self.registry.get(nominal, kind).is_some() {
            self.used_overrides.insert((nominal, kind));

            if kind == OpKind::Destroy {
                self.warn_shadowed_field_destructors(nominal, messages);
            }

            return EffectiveOp::Override(nominal);
        }

        match &arena.nominal(nominal).kind {
            NominalKind::Object { fields, base } => {
                let field_types: Vec<TypeId> = fields.iter().map(|f| f.ty).collect();
                self.lift_object(nominal, &field_types, *base, kind, messages)
            }

            // A distinct wrapper shares its base's storage; without an
            // override of its own it behaves exactly like the base.
            NominalKind::Distinct { base } => self.resolve(*base, kind, messages),

            // Instantiation happens upstream; the declaration's body stands
            // in for the structure of every instance.
            NominalKind::Generic { body } => self.resolve(*body, kind, messages),
        }
    }

    fn lift_homogeneous(
        &mut self,
        ty: TypeId,
        element: TypeId,
        count: Option<u32>,
        kind: OpKind,
        messages: &mut CompilerMessages,
    ) -> EffectiveOp {
        let element_op = self.resolve(element, kind, messages);

        if element_op.is_default() {
            return EffectiveOp::Default;
        }

        let steps = vec![LiftStep::EachElement {
            count,
            ty: element,
            op: element_op,
        }];

        EffectiveOp::Lifted(self.add_plan(ty, kind, steps))
    }

    fn lift_tuple(
        &mut self,
        ty: TypeId,
        items: &[TypeId],
        kind: OpKind,
        messages: &mut CompilerMessages,
    ) -> EffectiveOp {
        let mut slots = Vec::with_capacity(items.len());
        let mut all_default = true;

        for (index, item) in items.iter().enumerate() {
            let op = self.resolve(*item, kind, messages);
            all_default &= op.is_default();
            slots.push(LiftStep::Slot {
                index: index as u32,
                ty: *item,
                op,
            });
        }

        if all_default {
            return EffectiveOp::Default;
        }

        // Destruction tears slots down in reverse declaration order
        if kind == OpKind::Destroy {
            slots.reverse();
        }

        EffectiveOp::Lifted(self.add_plan(ty, kind, slots))
    }

    fn lift_object(
        &mut self,
        nominal: NominalId,
        field_types: &[TypeId],
        base: Option<NominalId>,
        kind: OpKind,
        messages: &mut CompilerMessages,
    ) -> EffectiveOp {
        let ty = self.arena.nominal_type(nominal);

        let mut slots = Vec::with_capacity(field_types.len());
        let mut all_default = true;

        for (index, field_ty) in field_types.iter().enumerate() {
            let op = self.resolve(*field_ty, kind, messages);
            all_default &= op.is_default();
            slots.push(LiftStep::Slot {
                index: index as u32,
                ty: *field_ty,
                op,
            });
        }

        let base_step = base.and_then(|parent| {
            let parent_ty = self.arena.nominal_type(parent);
            let op = self.resolve(parent_ty, kind, messages);
            if op.is_default() {
                None
            } else {
                Some(LiftStep::Base {
                    nominal: parent,
                    op,
                })
            }
        });

        if all_default && base_step.is_none() {
            return EffectiveOp::Default;
        }

        let mut steps = Vec::with_capacity(slots.len() + 1);

        match kind {
            // Construction order: the structural parent's slots come first
            OpKind::Assign | OpKind::DeepCopy => {
                if let Some(step) = base_step {
                    steps.push(step);
                }
                steps.extend(slots);
            }

            // Destruction order: own fields in reverse declaration order,
            // then chain into the parent so every reachable sub-object is
            // destroyed exactly once.
            OpKind::Destroy => {
                slots.reverse();
                steps.extend(slots);
                if let Some(step) = base_step {
                    steps.push(step);
                }
            }
        }

        EffectiveOp::Lifted(self.add_plan(ty, kind, steps))
    }

    fn add_plan(&mut self, ty: TypeId, kind: OpKind, steps: Vec<LiftStep>) -> LiftedOpId {
        let id = LiftedOpId(self.lifted.len() as u32);
        self.lifted.push(LiftedOp { ty, kind, steps });
        self.stats.lifted_plans += 1;
        id
    }

    // ============================================================
    // Diagnostics
    // ============================================================

    fn report_cycle(&mut self, ty: TypeId, messages: &mut CompilerMessages) {
        if !self.cycle_reported.insert(ty) {
            return;
        }

        self.stats.cycles_reported += 1;

        let location = match self.arena.kind(ty) {
            TypeKind::Nominal(nominal) => self.arena.nominal(*nominal).location,
            _ => TextLocation::default(),
        };

        messages.push_error(CompileError::new(
            "This type contains itself without an intervening reference or pointer, \
             so its lifecycle operations would recurse forever",
            location,
            ErrorType::UnresolvableRecursiveType,
        ));
    }

    fn warn_shadowed_field_destructors(
        &mut self,
        nominal: NominalId,
        messages: &mut CompilerMessages,
    ) {
        if self.shadow_warned.contains(&nominal) {
            return;
        }

        let decl = self.arena.nominal(nominal);
        let NominalKind::Object { fields, .. } = &decl.kind else {
            return;
        };

        let any_field_destructor = fields.iter().any(|field| {
            matches!(self.arena.kind(field.ty), TypeKind::Nominal(field_nominal)
                if self.registry.get(*field_nominal, OpKind::Destroy).is_some())
        });

        if any_field_destructor {
            self.shadow_warned.insert(nominal);
            messages.push_warning(CompilerWarning::new(
                "This '=destroy' replaces the lifted per-field destructor logic, \
                 the implementation is now responsible for destroying every field",
                decl.location,
                WarningKind::OverrideShadowsFieldDestructors,
            ));
        }
    }
}
