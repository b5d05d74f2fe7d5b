#![cfg(test)]

use crate::compiler::analysis::tests::test_support::{
    call_expr, edge, handle_fixture, location, single_scope_proc, spawn_expr, stmt,
};
use crate::compiler::analysis::thread_gate::{ArgCopy, annotate_spawn_sites};
use crate::compiler::compiler_errors::CompilerMessages;
use crate::compiler::datatypes::FieldDecl;
use crate::compiler::ir::proc_nodes::{ExitKind, Expr, StmtKind};
use crate::compiler::lifecycle::lifting::{EffectiveOp, LiftingResolver};

#[test]
fn spawn_argument_with_override_invokes_it() {
    let mut fixture = handle_fixture();

    let conn = call_expr("get_conn", fixture.ref_handle_ty, &mut fixture.string_table, 2);
    let count = Expr::int(3, fixture.int_ty, location(2));
    let task = spawn_expr(
        "worker",
        vec![conn, count],
        fixture.none_ty,
        &mut fixture.string_table,
        2,
    );

    let proc = single_scope_proc(
        "start",
        vec![],
        vec![stmt(StmtKind::ExprStmt(task), 2)],
        vec![edge(0, ExitKind::Fallthrough)],
        &mut fixture.string_table,
    );

    let mut resolver = LiftingResolver::new(&fixture.arena, &fixture.registry);
    let mut messages = CompilerMessages::new();

    let annotations = annotate_spawn_sites(&proc, &mut resolver, &mut messages);

    assert_eq!(annotations.len(), 1);
    let site = &annotations[0];
    assert_eq!(site.arg_copies.len(), 2);

    // The ref argument goes through the user's =deepCopy...
    assert_eq!(
        site.arg_copies[0].copy,
        ArgCopy::Invoke(EffectiveOp::Override(fixture.handle))
    );

    // ...and the plain Int is structurally cloned
    assert_eq!(site.arg_copies[1].copy, ArgCopy::StructuralClone);
}

#[test]
fn compound_argument_resolves_to_lifted_deep_copy() {
    let mut fixture = handle_fixture();

    // Conn :: object { link: ref Handle } - the deep copy lifts over the field
    let conn_name = fixture.string_table.intern("Conn");
    let link_name = fixture.string_table.intern("link");
    let conn = fixture.arena.declare_object(
        conn_name,
        vec![FieldDecl {
            name: link_name,
            ty: fixture.ref_handle_ty,
        }],
        None,
        location(1),
    );
    let conn_ty = fixture.arena.nominal_type(conn);

    let arg = call_expr("get_conn", conn_ty, &mut fixture.string_table, 2);
    let task = spawn_expr(
        "worker",
        vec![arg],
        fixture.none_ty,
        &mut fixture.string_table,
        2,
    );

    let proc = single_scope_proc(
        "start",
        vec![],
        vec![stmt(StmtKind::ExprStmt(task), 2)],
        vec![edge(0, ExitKind::Fallthrough)],
        &mut fixture.string_table,
    );

    let mut resolver = LiftingResolver::new(&fixture.arena, &fixture.registry);
    let mut messages = CompilerMessages::new();

    let annotations = annotate_spawn_sites(&proc, &mut resolver, &mut messages);

    let ArgCopy::Invoke(op) = annotations[0].arg_copies[0].copy else {
        panic!("a compound holding an overridden ref must lift, not clone");
    };
    assert!(matches!(op, EffectiveOp::Lifted(_)));
    assert_eq!(resolver.expanded_calls(op), vec![fixture.handle]);
}

#[test]
fn default_arguments_fall_back_to_structural_clone() {
    let mut fixture = handle_fixture();

    let first = Expr::int(1, fixture.int_ty, location(2));
    let second = Expr::bool(true, fixture.bool_ty, location(2));
    let task = spawn_expr(
        "worker",
        vec![first, second],
        fixture.none_ty,
        &mut fixture.string_table,
        2,
    );

    let proc = single_scope_proc(
        "start",
        vec![],
        vec![stmt(StmtKind::ExprStmt(task), 2)],
        vec![edge(0, ExitKind::Fallthrough)],
        &mut fixture.string_table,
    );

    let mut resolver = LiftingResolver::new(&fixture.arena, &fixture.registry);
    let mut messages = CompilerMessages::new();

    let annotations = annotate_spawn_sites(&proc, &mut resolver, &mut messages);

    assert!(
        annotations[0]
            .arg_copies
            .iter()
            .all(|arg| arg.copy == ArgCopy::StructuralClone)
    );
}

#[test]
fn spawn_sites_nested_in_other_expressions_are_found() {
    let mut fixture = handle_fixture();

    let inner_task = spawn_expr(
        "background_fill",
        vec![Expr::int(0, fixture.int_ty, location(3))],
        fixture.int_ty,
        &mut fixture.string_table,
        3,
    );
    let outer = Expr::call(
        fixture.string_table.intern("record"),
        vec![inner_task],
        fixture.none_ty,
        location(3),
    );

    let proc = single_scope_proc(
        "start",
        vec![],
        vec![stmt(StmtKind::ExprStmt(outer), 3)],
        vec![edge(0, ExitKind::Fallthrough)],
        &mut fixture.string_table,
    );

    let mut resolver = LiftingResolver::new(&fixture.arena, &fixture.registry);
    let mut messages = CompilerMessages::new();

    let annotations = annotate_spawn_sites(&proc, &mut resolver, &mut messages);
    assert_eq!(annotations.len(), 1);
    assert!(fixture
        .string_table
        .resolve(annotations[0].callee)
        .eq("background_fill"));
}

#[test]
fn deep_copy_resolution_never_requires_destroy_or_assign() {
    let mut fixture = handle_fixture();

    let conn = call_expr("get_conn", fixture.ref_handle_ty, &mut fixture.string_table, 2);
    let task = spawn_expr(
        "worker",
        vec![conn],
        fixture.none_ty,
        &mut fixture.string_table,
        2,
    );

    let proc = single_scope_proc(
        "start",
        vec![],
        vec![stmt(StmtKind::ExprStmt(task), 2)],
        vec![edge(0, ExitKind::Fallthrough)],
        &mut fixture.string_table,
    );

    let mut resolver = LiftingResolver::new(&fixture.arena, &fixture.registry);
    let mut messages = CompilerMessages::new();

    // ref Handle itself is not destructible and has no assignment override,
    // yet the gate still resolves its deep copy
    assert!(!resolver.is_destructible(fixture.ref_handle_ty, &mut messages));

    let annotations = annotate_spawn_sites(&proc, &mut resolver, &mut messages);
    assert!(matches!(
        annotations[0].arg_copies[0].copy,
        ArgCopy::Invoke(EffectiveOp::Override(_))
    ));
}
