//! The per-unit registry of user lifecycle bindings.
//!
//! One slot per (nominal type, operation kind). Entries are immutable once
//! inserted and the whole registry is sealed when the binder phase finishes,
//! so resolver queries never race with mutation even when the surrounding
//! build processes other units in parallel.

use crate::compiler::datatypes::{Indirection, NominalId, OpKind, TypeId};
use crate::compiler::ir::proc_nodes::TextLocation;
use crate::compiler::string_interning::StringId;
use rustc_hash::FxHashMap;

/// How a parameter is passed in an operator declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    Value,
    ConstReference,
    MutableReference,
}

impl ParamMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamMode::Value => "by value",
            ParamMode::ConstReference => "by const reference",
            ParamMode::MutableReference => "by mutable reference",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSig {
    pub mode: ParamMode,
    pub ty: TypeId,
}

/// The validated callable shape of a bound operator
#[derive(Debug, Clone)]
pub struct OperatorSignature {
    pub params: Vec<ParamSig>,
    pub return_type: Option<TypeId>,
}

/// Reference to the user-provided implementation symbol.
/// Codegen resolves this to an actual callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorImpl(pub StringId);

/// An operator declaration as handed over by the front end, before the
/// binder has validated its shape.
#[derive(Debug, Clone)]
pub struct OperatorDecl {
    pub op: OpKind,
    pub params: Vec<ParamSig>,
    pub return_type: Option<TypeId>,
    pub implementation: OperatorImpl,
    pub location: TextLocation,
}

/// A validated binding of one lifecycle operation to one nominal type.
/// Immutable once inserted.
#[derive(Debug, Clone)]
pub struct BoundOperationEntry {
    pub kind: OpKind,
    pub target: NominalId,
    pub signature: OperatorSignature,
    pub implementation: OperatorImpl,

    /// Only set for =deepCopy: which indirection spelling the binding
    /// came through. Used to reject a second binding through the other.
    pub indirection: Option<Indirection>,

    pub location: TextLocation,
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: FxHashMap<(NominalId, OpKind), BoundOperationEntry>,
    sealed: bool,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: NominalId, kind: OpKind) -> Option<&BoundOperationEntry> {
        self.entries.get(&(target, kind))
    }

    /// Insert a validated entry. The binder has already rejected duplicates,
    /// so an occupied slot here is an internal bug.
    pub(crate) fn insert(&mut self, entry: BoundOperationEntry) {
        debug_assert!(
            !self.sealed,
            "lifecycle binding inserted after the binder phase was sealed"
        );

        let previous = self.entries.insert((entry.target, entry.kind), entry);
        debug_assert!(previous.is_none(), "duplicate binding reached the registry");
    }

    /// Mark the binder phase complete. All bindings are visible and
    /// immutable from here on.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundOperationEntry> {
        self.entries.values()
    }
}
