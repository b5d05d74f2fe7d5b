use crate::compiler::ir::proc_nodes::TextLocation;
use crate::compiler::string_interning::{StringId, StringTable};
use rustc_hash::FxHashMap;
use std::fmt::Display;

// ============================================================
// Stable IDs
// ============================================================

/// Identity of a type expression inside the arena.
/// Structurally identical type expressions share one TypeId.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// Identity of a nominal type declaration.
/// Two nominals with the same spelling are still distinct types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NominalId(pub u32);

// ============================================================
// Lifecycle operation kinds
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Assign,
    Destroy,
    DeepCopy,
}

impl OpKind {
    /// The operator token reserved for this kind in source code
    pub fn operator_name(self) -> &'static str {
        match self {
            OpKind::Assign => "=",
            OpKind::Destroy => "=destroy",
            OpKind::DeepCopy => "=deepCopy",
        }
    }

    pub const ALL: [OpKind; 3] = [OpKind::Assign, OpKind::Destroy, OpKind::DeepCopy];
}

impl Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.operator_name())
    }
}

/// Which indirection spelling a `=deepCopy` binding came through.
/// A nominal type may be bound through one of these, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indirection {
    Reference,
    Pointer,
}

impl Indirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Indirection::Reference => "reference",
            Indirection::Pointer => "pointer",
        }
    }
}

// ============================================================
// Type expressions
// ============================================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    // Scalar leaves. Bitwise copy, no-op destroy, trivial deep copy.
    None,
    Bool,
    Int,
    Float,

    /// A declared object/distinct/generic type, by identity
    Nominal(NominalId),

    /// Fixed-length homogeneous compound
    Array { element: TypeId, length: u32 },

    /// Dynamically sized homogeneous compound
    Sequence(TypeId),

    /// Heterogeneous compound with positional slots
    Tuple(Vec<TypeId>),

    /// Non-owning managed indirection
    Reference(TypeId),

    /// Non-owning raw indirection
    Pointer(TypeId),
}

impl TypeKind {
    pub fn is_indirection(&self) -> bool {
        matches!(self, TypeKind::Reference(_) | TypeKind::Pointer(_))
    }

    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            TypeKind::Array { .. } | TypeKind::Sequence(_) | TypeKind::Tuple(_)
        )
    }
}

// ============================================================
// Nominal declarations
// ============================================================
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: StringId,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub enum NominalKind {
    /// `Thing :: object` - ordered fields, optional structural parent
    Object {
        fields: Vec<FieldDecl>,
        base: Option<NominalId>,
    },

    /// `Handle :: distinct Int` - a fresh identity over an existing type.
    /// Shares the base type's storage, so structural resolution passes
    /// through to the base unless the distinct nominal has its own override.
    Distinct { base: TypeId },

    /// A generic type declaration. Instantiation happens upstream; the body
    /// describes the declaration's structure for lifting purposes.
    Generic { body: TypeId },
}

#[derive(Debug, Clone)]
pub struct NominalDecl {
    pub id: NominalId,
    pub name: StringId,
    pub kind: NominalKind,
    pub location: TextLocation,
}

// ============================================================
// Type arena
// ============================================================

/// Owns every type expression and nominal declaration in a compilation unit.
///
/// Type expressions are deduplicated on insertion so that identity comparison
/// (`TypeId == TypeId`) doubles as structural comparison, and memoization in
/// the lifting resolver can key on TypeId alone.
#[derive(Debug, Default)]
pub struct TypeArena {
    types: Vec<TypeKind>,
    dedup: FxHashMap<TypeKind, TypeId>,
    nominals: Vec<NominalDecl>,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a type expression, returning the canonical TypeId for it
    pub fn intern_type(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&existing) = self.dedup.get(&kind) {
            return existing;
        }

        let id = TypeId(self.types.len() as u32);
        self.dedup.insert(kind.clone(), id);
        self.types.push(kind);
        id
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.types[id.0 as usize]
    }

    pub fn try_kind(&self, id: TypeId) -> Option<&TypeKind> {
        self.types.get(id.0 as usize)
    }

    pub fn nominal(&self, id: NominalId) -> &NominalDecl {
        &self.nominals[id.0 as usize]
    }

    pub fn try_nominal(&self, id: NominalId) -> Option<&NominalDecl> {
        self.nominals.get(id.0 as usize)
    }

    pub fn nominal_count(&self) -> usize {
        self.nominals.len()
    }

    fn declare_nominal(&mut self, name: StringId, kind: NominalKind, location: TextLocation) -> NominalId {
        let id = NominalId(self.nominals.len() as u32);
        self.nominals.push(NominalDecl {
            id,
            name,
            kind,
            location,
        });

        // Intern the nominal's type expression up front so resolution can
        // look it up without mutating the arena.
        self.intern_type(TypeKind::Nominal(id));
        id
    }

    pub fn declare_object(
        &mut self,
        name: StringId,
        fields: Vec<FieldDecl>,
        base: Option<NominalId>,
        location: TextLocation,
    ) -> NominalId {
        self.declare_nominal(name, NominalKind::Object { fields, base }, location)
    }

    /// Declare an object before its fields are known, so self-referential
    /// shapes (a node holding a ref to its own type) can be built.
    /// `define_object` fills the fields in exactly once.
    pub fn declare_object_stub(&mut self, name: StringId, location: TextLocation) -> NominalId {
        self.declare_object(name, Vec::new(), None, location)
    }

    pub fn define_object(&mut self, id: NominalId, fields: Vec<FieldDecl>, base: Option<NominalId>) {
        let decl = &mut self.nominals[id.0 as usize];
        debug_assert!(
            matches!(&decl.kind, NominalKind::Object { fields, base } if fields.is_empty() && base.is_none()),
            "define_object on a nominal that already has a definition"
        );
        decl.kind = NominalKind::Object { fields, base };
    }

    pub fn declare_distinct(&mut self, name: StringId, base: TypeId, location: TextLocation) -> NominalId {
        self.declare_nominal(name, NominalKind::Distinct { base }, location)
    }

    pub fn declare_generic(&mut self, name: StringId, body: TypeId, location: TextLocation) -> NominalId {
        self.declare_nominal(name, NominalKind::Generic { body }, location)
    }

    /// The interned `TypeKind::Nominal` expression for a declared nominal
    pub fn nominal_type(&self, id: NominalId) -> TypeId {
        *self
            .dedup
            .get(&TypeKind::Nominal(id))
            .expect("nominal type expressions are interned at declaration")
    }

    /// Render a type for diagnostics. Needs the string table that interned
    /// the nominal names.
    pub fn display_type(&self, id: TypeId, table: &StringTable) -> String {
        match self.kind(id) {
            TypeKind::None => String::from("None"),
            TypeKind::Bool => String::from("Bool"),
            TypeKind::Int => String::from("Int"),
            TypeKind::Float => String::from("Float"),
            TypeKind::Nominal(nominal) => {
                table.resolve(self.nominal(*nominal).name).to_string()
            }
            TypeKind::Array { element, length } => {
                format!("Array[{}, {}]", length, self.display_type(*element, table))
            }
            TypeKind::Sequence(element) => {
                format!("Sequence[{}]", self.display_type(*element, table))
            }
            TypeKind::Tuple(items) => {
                let mut inner = String::new();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        inner.push_str(", ");
                    }
                    inner.push_str(&self.display_type(*item, table));
                }
                format!("({inner})")
            }
            TypeKind::Reference(pointee) => {
                format!("ref {}", self.display_type(*pointee, table))
            }
            TypeKind::Pointer(pointee) => {
                format!("ptr {}", self.display_type(*pointee, table))
            }
        }
    }
}
