//! End-to-end tests of the lifecycle pass through the public API:
//! operator binding, lifting, context validation, destructor scheduling
//! and cross-thread deep-copy annotation over whole compilation units.

use sapling::compiler::analysis::thread_gate::ArgCopy;
use sapling::compiler::compiler_errors::ErrorType;
use sapling::compiler::datatypes::{FieldDecl, NominalId, OpKind, TypeArena, TypeId, TypeKind};
use sapling::compiler::ir::proc_nodes::{
    EdgeId, ExitEdge, ExitKind, Expr, ExprKind, LocalDecl, LocalId, Procedure, ScopeId, ScopeKind,
    ScopeNode, Stmt, StmtKind, TextLocation,
};
use sapling::compiler::lifecycle::lifting::EffectiveOp;
use sapling::compiler::lifecycle::registry::{OperatorDecl, OperatorImpl, ParamMode, ParamSig};
use sapling::compiler::string_interning::StringTable;
use sapling::settings::{Config, ContextSite};
use sapling::{CompilationUnit, analyze_unit, analyze_units};
use std::io::Write;

fn location(line: i32) -> TextLocation {
    TextLocation::new_just_line(line)
}

struct UnitBuilder {
    string_table: StringTable,
    types: TypeArena,
    handle: NominalId,
    handle_ty: TypeId,
    ref_handle_ty: TypeId,
    int_ty: TypeId,
    bool_ty: TypeId,
    none_ty: TypeId,
}

impl UnitBuilder {
    fn new() -> Self {
        let mut string_table = StringTable::new();
        let mut types = TypeArena::new();

        let int_ty = types.intern_type(TypeKind::Int);
        let bool_ty = types.intern_type(TypeKind::Bool);
        let none_ty = types.intern_type(TypeKind::None);

        let handle_name = string_table.intern("Handle");
        let fd = string_table.intern("fd");
        let handle = types.declare_object(
            handle_name,
            vec![FieldDecl { name: fd, ty: int_ty }],
            None,
            location(1),
        );
        let handle_ty = types.nominal_type(handle);
        let ref_handle_ty = types.intern_type(TypeKind::Reference(handle_ty));

        Self {
            string_table,
            types,
            handle,
            handle_ty,
            ref_handle_ty,
            int_ty,
            bool_ty,
            none_ty,
        }
    }

    fn destroy_decl(&mut self) -> OperatorDecl {
        OperatorDecl {
            op: OpKind::Destroy,
            params: vec![ParamSig {
                mode: ParamMode::MutableReference,
                ty: self.handle_ty,
            }],
            return_type: None,
            implementation: OperatorImpl(self.string_table.intern("destroy_handle")),
            location: location(2),
        }
    }

    fn deep_copy_decl(&mut self) -> OperatorDecl {
        OperatorDecl {
            op: OpKind::DeepCopy,
            params: vec![ParamSig {
                mode: ParamMode::Value,
                ty: self.ref_handle_ty,
            }],
            return_type: Some(self.ref_handle_ty),
            implementation: OperatorImpl(self.string_table.intern("deep_copy_handle")),
            location: location(3),
        }
    }

    fn make_handle(&mut self, line: i32) -> Expr {
        Expr::call(
            self.string_table.intern("make_handle"),
            Vec::new(),
            self.handle_ty,
            location(line),
        )
    }

    fn local(&mut self, id: u32, name: &str, ty: TypeId, line: i32) -> LocalDecl {
        LocalDecl {
            id: LocalId(id),
            name: self.string_table.intern(name),
            ty,
            location: location(line),
        }
    }
}

fn stmt(kind: StmtKind, line: i32) -> Stmt {
    Stmt {
        kind,
        location: location(line),
    }
}

fn edge(id: u32, kind: ExitKind) -> ExitEdge {
    ExitEdge {
        id: EdgeId(id),
        kind,
        location: location(0),
    }
}

/// var a = make_handle()
/// var b = make_handle()
/// if flag
///     return
/// spawn worker(get_conn(), 3)
fn serve_procedure(builder: &mut UnitBuilder) -> Procedure {
    let init_a = builder.make_handle(2);
    let init_b = builder.make_handle(3);
    let a = builder.local(0, "a", builder.handle_ty, 2);
    let b = builder.local(1, "b", builder.handle_ty, 3);

    let flag = Expr::bool(true, builder.bool_ty, location(4));
    let conn = Expr::call(
        builder.string_table.intern("get_conn"),
        Vec::new(),
        builder.ref_handle_ty,
        location(6),
    );
    let task = Expr::new(
        ExprKind::Spawn {
            callee: builder.string_table.intern("worker"),
            args: vec![conn, Expr::int(3, builder.int_ty, location(6))],
        },
        builder.none_ty,
        location(6),
    );

    Procedure {
        name: builder.string_table.intern("serve"),
        params: vec![],
        scopes: vec![
            ScopeNode {
                id: ScopeId(0),
                parent: None,
                kind: ScopeKind::ProcedureBody,
                statements: vec![
                    stmt(StmtKind::VarDecl { local: a, init: init_a }, 2),
                    stmt(StmtKind::VarDecl { local: b, init: init_b }, 3),
                    stmt(
                        StmtKind::If {
                            condition: flag,
                            then_scope: ScopeId(1),
                            else_scope: None,
                        },
                        4,
                    ),
                    stmt(StmtKind::ExprStmt(task), 6),
                ],
                exit_edges: vec![edge(0, ExitKind::Fallthrough)],
            },
            ScopeNode {
                id: ScopeId(1),
                parent: Some(ScopeId(0)),
                kind: ScopeKind::Block,
                statements: vec![stmt(StmtKind::Return { value: None, edge: EdgeId(1) }, 5)],
                exit_edges: vec![edge(1, ExitKind::Return)],
            },
        ],
        root: ScopeId(0),
        location: location(1),
    }
}

#[test]
fn full_pipeline_annotates_drops_and_spawn_copies() {
    let mut builder = UnitBuilder::new();
    let operator_decls = vec![builder.destroy_decl(), builder.deep_copy_decl()];
    let procedure = serve_procedure(&mut builder);

    let unit = CompilationUnit {
        string_table: builder.string_table,
        types: builder.types,
        operator_decls,
        procedures: vec![procedure],
    };

    let annotations = analyze_unit(&unit, &Config::default()).expect("unit must analyze cleanly");

    assert_eq!(annotations.procedures.len(), 1);
    let serve = &annotations.procedures[0];

    // Both exit edges destroy b then a
    let early_return: Vec<u32> = serve
        .destructor_schedule
        .drops_for_edge(EdgeId(1))
        .iter()
        .map(|drop| drop.local.0)
        .collect();
    let fallthrough: Vec<u32> = serve
        .destructor_schedule
        .drops_for_edge(EdgeId(0))
        .iter()
        .map(|drop| drop.local.0)
        .collect();
    assert_eq!(early_return, vec![1, 0]);
    assert_eq!(fallthrough, vec![1, 0]);

    // Each scheduled drop is the Handle override itself
    for drop in serve.destructor_schedule.drops_for_edge(EdgeId(0)) {
        assert_eq!(annotations.expanded_calls(drop.op), vec![builder_handle(&unit)]);
    }

    // The spawn site deep-copies the ref through the user override and the
    // Int through the structural clone
    assert_eq!(serve.spawn_sites.len(), 1);
    let copies = &serve.spawn_sites[0].arg_copies;
    assert!(matches!(
        copies[0].copy,
        ArgCopy::Invoke(EffectiveOp::Override(_))
    ));
    assert_eq!(copies[1].copy, ArgCopy::StructuralClone);

    // Every binding was exercised, so no unused-override warnings
    assert!(annotations.warnings.is_empty());
    assert!(annotations.stats.queries > 0);
}

fn builder_handle(unit: &CompilationUnit) -> NominalId {
    // The fixture declares exactly one nominal
    assert_eq!(unit.types.nominal_count(), 1);
    unit.types.nominal(NominalId(0)).id
}

#[test]
fn user_errors_are_collected_across_stages() {
    let mut builder = UnitBuilder::new();

    // One duplicate binding and one illegal bare destructible statement
    let operator_decls = vec![
        builder.destroy_decl(),
        builder.destroy_decl(),
    ];

    let bare = builder.make_handle(2);
    let procedure = Procedure {
        name: builder.string_table.intern("start"),
        params: vec![],
        scopes: vec![ScopeNode {
            id: ScopeId(0),
            parent: None,
            kind: ScopeKind::ProcedureBody,
            statements: vec![stmt(StmtKind::ExprStmt(bare), 2)],
            exit_edges: vec![edge(0, ExitKind::Fallthrough)],
        }],
        root: ScopeId(0),
        location: location(1),
    };

    let unit = CompilationUnit {
        string_table: builder.string_table,
        types: builder.types,
        operator_decls,
        procedures: vec![procedure],
    };

    let messages = analyze_unit(&unit, &Config::default()).unwrap_err();

    let kinds: Vec<ErrorType> = messages.errors.iter().map(|e| e.error_type).collect();
    assert!(kinds.contains(&ErrorType::DuplicateBinding));
    assert!(kinds.contains(&ErrorType::IllegalDestructibleUsage));

    // The structured diagnostics stream keeps type and position
    let json = messages.errors[0].to_json();
    assert!(json["type"].is_string());
    assert!(json["line"].is_number());
}

#[test]
fn missing_exit_edge_aborts_the_unit() {
    let mut builder = UnitBuilder::new();
    let operator_decls = vec![builder.destroy_decl()];

    let init = builder.make_handle(2);
    let h = builder.local(0, "h", builder.handle_ty, 2);

    let procedure = Procedure {
        name: builder.string_table.intern("start"),
        params: vec![],
        scopes: vec![ScopeNode {
            id: ScopeId(0),
            parent: None,
            kind: ScopeKind::ProcedureBody,
            statements: vec![stmt(StmtKind::VarDecl { local: h, init }, 2)],
            // No edges enumerated: upstream CFG construction bug
            exit_edges: vec![],
        }],
        root: ScopeId(0),
        location: location(1),
    };

    let unit = CompilationUnit {
        string_table: builder.string_table,
        types: builder.types,
        operator_decls,
        procedures: vec![procedure],
    };

    let messages = analyze_unit(&unit, &Config::default()).unwrap_err();
    assert_eq!(
        messages.errors.last().unwrap().error_type,
        ErrorType::MissingScopeExitEdge
    );
}

#[test]
fn policy_table_loads_from_toml_and_narrows_contexts() {
    let mut config_file = tempfile::NamedTempFile::new().expect("temp config file");
    write!(
        config_file,
        "unit_name = \"narrowed\"\ndestructible_contexts = [\"var-init\", \"let-init\"]\n"
    )
    .expect("write config");

    let config = Config::from_toml_file(config_file.path()).expect("config must parse");
    assert_eq!(config.unit_name, "narrowed");
    assert!(config.destructible_contexts.contains(&ContextSite::VarInit));
    assert!(!config.destructible_contexts.contains(&ContextSite::ReturnValue));

    // A return of a destructible value now violates the narrowed table
    let mut builder = UnitBuilder::new();
    let operator_decls = vec![builder.destroy_decl()];
    let returned = builder.make_handle(2);

    let procedure = Procedure {
        name: builder.string_table.intern("start"),
        params: vec![],
        scopes: vec![ScopeNode {
            id: ScopeId(0),
            parent: None,
            kind: ScopeKind::ProcedureBody,
            statements: vec![stmt(
                StmtKind::Return {
                    value: Some(returned),
                    edge: EdgeId(0),
                },
                2,
            )],
            exit_edges: vec![edge(0, ExitKind::Return)],
        }],
        root: ScopeId(0),
        location: location(1),
    };

    let unit = CompilationUnit {
        string_table: builder.string_table,
        types: builder.types,
        operator_decls,
        procedures: vec![procedure],
    };

    let messages = analyze_unit(&unit, &config).unwrap_err();
    assert_eq!(
        messages.errors[0].error_type,
        ErrorType::IllegalDestructibleUsage
    );
}

#[test]
fn rejected_config_values_surface_as_config_errors() {
    let error = Config::from_toml_str("destructible_contexts = [\"other\"]").unwrap_err();
    assert_eq!(error.error_type, ErrorType::Config);

    let error = Config::from_toml_str("not toml at all [").unwrap_err();
    assert_eq!(error.error_type, ErrorType::Config);
}

#[test]
fn independent_units_analyze_in_parallel() {
    let units: Vec<CompilationUnit> = (0..4)
        .map(|_| {
            let mut builder = UnitBuilder::new();
            let operator_decls = vec![builder.destroy_decl(), builder.deep_copy_decl()];
            let procedure = serve_procedure(&mut builder);

            CompilationUnit {
                string_table: builder.string_table,
                types: builder.types,
                operator_decls,
                procedures: vec![procedure],
            }
        })
        .collect();

    let results = analyze_units(&units, &Config::default());

    assert_eq!(results.len(), 4);
    for result in results {
        let annotations = result.expect("every unit is clean");
        assert_eq!(annotations.procedures.len(), 1);
        assert!(annotations.procedures[0].destructor_schedule.total_scheduled() > 0);
    }
}
