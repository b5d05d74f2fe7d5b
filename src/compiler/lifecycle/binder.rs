//! Operator declaration processing.
//!
//! Validates the fixed signature shape of `=`, `=destroy` and `=deepCopy`
//! declarations and records at most one binding per (nominal type, kind)
//! in the registry. Every rejected declaration produces one diagnostic and
//! is then treated as absent so analysis can continue.

use crate::compiler::compiler_errors::{CompileError, CompilerMessages};
use crate::compiler::datatypes::{Indirection, NominalId, OpKind, TypeArena, TypeId, TypeKind};
use crate::compiler::lifecycle::registry::{
    BoundOperationEntry, OperatorDecl, OperatorSignature, ParamMode, TypeRegistry,
};
use crate::compiler::string_interning::StringTable;
use crate::return_lifecycle_error;

/// Process every operator declaration of a unit and return the sealed
/// registry. Errors are collected, never returned early: each bad
/// declaration is skipped and binding continues.
pub fn bind_operators(
    arena: &TypeArena,
    string_table: &StringTable,
    decls: &[OperatorDecl],
    messages: &mut CompilerMessages,
) -> TypeRegistry {
    let mut binder = OperationBinder {
        arena,
        string_table,
        registry: TypeRegistry::new(),
    };

    for decl in decls {
        match binder.bind(decl) {
            Ok(entry) => binder.registry.insert(entry),
            Err(e) => messages.push_error(e),
        }
    }

    binder.registry.seal();
    binder.registry
}

struct OperationBinder<'a> {
    arena: &'a TypeArena,
    string_table: &'a StringTable,
    registry: TypeRegistry,
}

impl<'a> OperationBinder<'a> {
    fn bind(&self, decl: &OperatorDecl) -> Result<BoundOperationEntry, CompileError> {
        let (target, indirection) = match decl.op {
            OpKind::Assign => (self.check_assign_shape(decl)?, None),
            OpKind::Destroy => (self.check_destroy_shape(decl)?, None),
            OpKind::DeepCopy => {
                let (target, indirection) = self.check_deep_copy_shape(decl)?;
                (target, Some(indirection))
            }
        };

        self.check_not_already_bound(decl, target, indirection)?;

        Ok(BoundOperationEntry {
            kind: decl.op,
            target,
            signature: OperatorSignature {
                params: decl.params.clone(),
                return_type: decl.return_type,
            },
            implementation: decl.implementation,
            indirection,
            location: decl.location,
        })
    }

    /// `=` takes (mutable-reference-to T, T by value or const reference)
    /// and returns nothing.
    fn check_assign_shape(&self, decl: &OperatorDecl) -> Result<NominalId, CompileError> {
        if decl.params.len() != 2 {
            return_lifecycle_error!(
                InvalidSignature,
                format!(
                    "'=' must take exactly two parameters, this declaration takes {}",
                    decl.params.len()
                ),
                decl.location,
                {
                    OperatorName => "=",
                    ExpectedShape => "(var T, T)",
                }
            );
        }

        let dst = decl.params[0];
        let src = decl.params[1];

        if dst.mode != ParamMode::MutableReference {
            return_lifecycle_error!(
                InvalidSignature,
                format!(
                    "The destination of '=' must be passed by mutable reference, found {}",
                    dst.mode.as_str()
                ),
                decl.location,
                {
                    OperatorName => "=",
                    ExpectedShape => "(var T, T)",
                }
            );
        }

        if src.mode == ParamMode::MutableReference {
            return_lifecycle_error!(
                InvalidSignature,
                "The source of '=' must be passed by value or const reference",
                decl.location,
                {
                    OperatorName => "=",
                    ExpectedShape => "(var T, T)",
                }
            );
        }

        if dst.ty != src.ty {
            return_lifecycle_error!(
                InvalidSignature,
                format!(
                    "Both parameters of '=' must have the same type, found {} and {}",
                    self.arena.display_type(dst.ty, self.string_table),
                    self.arena.display_type(src.ty, self.string_table)
                ),
                decl.location,
                {
                    OperatorName => "=",
                    ExpectedShape => "(var T, T)",
                }
            );
        }

        if decl.return_type.is_some() {
            return_lifecycle_error!(
                InvalidSignature,
                "'=' does not return a value",
                decl.location,
                { OperatorName => "=" }
            );
        }

        self.nominal_receiver(decl, dst.ty)
    }

    /// `=destroy` takes exactly one parameter of concrete type T.
    /// T may name a generic type declaration.
    fn check_destroy_shape(&self, decl: &OperatorDecl) -> Result<NominalId, CompileError> {
        if decl.params.len() != 1 {
            return_lifecycle_error!(
                InvalidSignature,
                format!(
                    "'=destroy' must take exactly one parameter, this declaration takes {}",
                    decl.params.len()
                ),
                decl.location,
                {
                    OperatorName => "=destroy",
                    ExpectedShape => "(var T)",
                }
            );
        }

        let param = decl.params[0];

        if param.mode == ParamMode::ConstReference {
            return_lifecycle_error!(
                InvalidSignature,
                "'=destroy' tears its parameter down and cannot take it by const reference",
                decl.location,
                {
                    OperatorName => "=destroy",
                    ExpectedShape => "(var T)",
                }
            );
        }

        if decl.return_type.is_some() {
            return_lifecycle_error!(
                InvalidSignature,
                "'=destroy' does not return a value",
                decl.location,
                { OperatorName => "=destroy" }
            );
        }

        self.nominal_receiver(decl, param.ty)
    }

    /// `=deepCopy` takes one reference- or pointer-indirection parameter and
    /// returns the identical type. The binding target is the pointee's
    /// nominal type, not the indirection itself.
    fn check_deep_copy_shape(
        &self,
        decl: &OperatorDecl,
    ) -> Result<(NominalId, Indirection), CompileError> {
        if decl.params.len() != 1 {
            return_lifecycle_error!(
                InvalidSignature,
                format!(
                    "'=deepCopy' must take exactly one parameter, this declaration takes {}",
                    decl.params.len()
                ),
                decl.location,
                {
                    OperatorName => "=deepCopy",
                    ExpectedShape => "(ref T) -> ref T",
                }
            );
        }

        let param = decl.params[0];

        let (pointee, indirection) = match self.arena.kind(param.ty) {
            TypeKind::Reference(pointee) => (*pointee, Indirection::Reference),
            TypeKind::Pointer(pointee) => (*pointee, Indirection::Pointer),
            _ => {
                return_lifecycle_error!(
                    InvalidSignature,
                    format!(
                        "'=deepCopy' must take a reference or pointer indirection, found {}",
                        self.arena.display_type(param.ty, self.string_table)
                    ),
                    decl.location,
                    {
                        OperatorName => "=deepCopy",
                        ExpectedShape => "(ref T) -> ref T",
                    }
                );
            }
        };

        if decl.return_type != Some(param.ty) {
            return_lifecycle_error!(
                InvalidSignature,
                "'=deepCopy' must return exactly its parameter type",
                decl.location,
                {
                    OperatorName => "=deepCopy",
                    ExpectedShape => "(ref T) -> ref T",
                }
            );
        }

        let target = self.nominal_receiver(decl, pointee)?;
        Ok((target, indirection))
    }

    /// The receiver must resolve to a declared nominal type. Compound
    /// built-ins, scalars and indirection types have no identity to hang a
    /// binding on; the user introduces a distinct/object wrapper instead.
    fn nominal_receiver(&self, decl: &OperatorDecl, ty: TypeId) -> Result<NominalId, CompileError> {
        match self.arena.kind(ty) {
            TypeKind::Nominal(id) => Ok(*id),

            kind => {
                let receiver_kind = if kind.is_indirection() {
                    "indirection type"
                } else if kind.is_compound() {
                    "compound built-in type"
                } else {
                    "built-in scalar type"
                };

                return_lifecycle_error!(
                    NonNominalReceiver,
                    format!(
                        "'{}' can only be bound to an object or distinct type, {} is a {}",
                        decl.op,
                        self.arena.display_type(ty, self.string_table),
                        receiver_kind
                    ),
                    decl.location,
                    {
                        ReceiverKind => "non-nominal",
                        PrimarySuggestion => "Wrap the type in a distinct or object declaration to give it an identity",
                    }
                );
            }
        }
    }

    fn check_not_already_bound(
        &self,
        decl: &OperatorDecl,
        target: NominalId,
        indirection: Option<Indirection>,
    ) -> Result<(), CompileError> {
        let Some(existing) = self.registry.get(target, decl.op) else {
            return Ok(());
        };

        let target_name = self
            .string_table
            .resolve(self.arena.nominal(target).name);

        // A second =deepCopy through the other indirection spelling is its
        // own error: the two bindings would silently shadow each other at
        // every ref/ptr coercion site.
        if decl.op == OpKind::DeepCopy && existing.indirection != indirection {
            return_lifecycle_error!(
                ConflictingIndirectionBinding,
                format!(
                    "'=deepCopy' is already bound to {} through a {}; binding it again through a {} is not allowed",
                    target_name,
                    existing
                        .indirection
                        .map(Indirection::as_str)
                        .unwrap_or("reference"),
                    indirection.map(Indirection::as_str).unwrap_or("reference")
                ),
                decl.location,
                {
                    OperatorName => "=deepCopy",
                    PrimarySuggestion => "Introduce a distinct wrapper type for one of the two indirections",
                }
            );
        }

        return_lifecycle_error!(
            DuplicateBinding,
            format!(
                "'{}' is already bound to {} (line {})",
                decl.op, target_name, existing.location.start_pos.line_number
            ),
            decl.location,
            {
                PrimarySuggestion => "Remove one of the two bindings",
            }
        );
    }
}
