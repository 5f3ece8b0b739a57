use super::*;
use crate::context::{ContextResolver, LexicalMode};
use crate::document::Document;
use crate::text::{Position, utf16_len};

fn ctx_at_end(text: &str, mode: LexicalMode) -> CompletionContext {
    let doc = Document::from_text(text);
    let last = doc.len() - 1;
    let width = doc.line(last).map_or(0, |l| utf16_len(&l.text));
    ContextResolver::resolve(&doc, Position::new(last as u32, width), mode)
}

fn script(text: &str) -> CompletionContext {
    ctx_at_end(text, LexicalMode::Script)
}

fn labels(items: &[CompletionItem]) -> Vec<&str> {
    items.iter().map(|i| i.label.as_str()).collect()
}

fn local(plan: CompletionPlan) -> Vec<CompletionItem> {
    match plan {
        CompletionPlan::Local(items) => items,
        other => panic!("expected a local plan, got {other:?}"),
    }
}

fn request(plan: CompletionPlan) -> OracleRequest {
    match plan {
        CompletionPlan::Query(request) => request,
        other => panic!("expected an oracle query, got {other:?}"),
    }
}

#[test]
fn command_names_after_test_prefix() {
    let builder = CompletionBuilder::default();
    let items = local(builder.plan(&script("TEST.SUBPROGRAM:Manager::PlaceOrder\nTEST.")));
    let names = labels(&items);
    assert!(names.contains(&"VALUE"));
    assert!(names.contains(&"EXPECTED"));
    assert!(!names.contains(&"CODED_TEST_FILE"));
    assert_eq!(names[0], "SCRIPT_FEATURE");
    assert!(items.iter().all(|i| i.kind == ItemKind::Keyword));
}

#[test]
fn coded_test_driver_swaps_value_for_coded_test_file() {
    let builder = CompletionBuilder::default();
    let items = local(builder.plan(&script("TEST.SUBPROGRAM:coded_tests_driver\nTEST.")));
    let names = labels(&items);
    assert!(!names.contains(&"VALUE"));
    assert!(!names.contains(&"EXPECTED"));
    assert!(names.contains(&"CODED_TEST_FILE"));
}

#[test]
fn command_names_filter_by_partial() {
    let builder = CompletionBuilder::default();
    let items = local(builder.plan(&script("TEST.SUBPROGRAM:x\ntest.val")));
    assert_eq!(labels(&items), vec!["VALUE", "VALUE_USER_CODE"]);
}

#[test]
fn line_start_offers_starters() {
    let builder = CompletionBuilder::default();
    let plain = local(builder.plan(&script("TEST.SUBPROGRAM:Manager::PlaceOrder\n")));
    assert_eq!(labels(&plain), vec!["TEST", "TEST.VALUE", "TEST.EXPECTED"]);

    let compound = local(builder.plan(&script("TEST.SUBPROGRAM:<<COMPOUND>>\n")));
    assert_eq!(labels(&compound), vec!["TEST", "TEST.SLOT"]);

    let driver = local(builder.plan(&script("TEST.SUBPROGRAM:coded_tests_driver\nT")));
    assert_eq!(labels(&driver), vec!["TEST"]);
}

#[test]
fn name_and_script_feature_are_local() {
    let builder = CompletionBuilder::default();
    assert_eq!(labels(&local(builder.plan(&script("TEST.NAME:")))), vec!["<test-name>"]);
    assert_eq!(builder.plan(&script("TEST.NAME:smoke")), CompletionPlan::Nothing);

    let features = local(builder.plan(&script("TEST.SCRIPT_FEATURE:STRUCT_")));
    assert_eq!(
        labels(&features),
        vec![
            "STRUCT_BASE_CTOR_ADDS_POINTER",
            "STRUCT_DTOR_ADDS_POINTER",
            "STRUCT_FIELD_CTOR_ADDS_POINTER"
        ]
    );
}

#[test]
fn subprogram_query_is_scoped_to_the_nearest_unit() {
    let builder = CompletionBuilder::default();
    let req = request(builder.plan(&script("TEST.UNIT:database\nTEST.UNIT:manager\nTEST.SUBPROGRAM:")));
    assert_eq!(req.kind, ChoiceKind::Function);
    assert_eq!(req.unit.as_deref(), Some("manager"));
    assert_eq!(req.field_key, "SUBPROGRAM");

    assert_eq!(builder.plan(&script("TEST.SUBPROGRAM:")), CompletionPlan::Nothing);
}

#[test]
fn dotted_paths_query_with_the_narrower_line() {
    let builder = CompletionBuilder::default();
    let top = request(builder.plan(&script("TEST.VALUE:")));
    let scoped = request(builder.plan(&script("TEST.VALUE:manager.")));
    assert_eq!(top.line_so_far, "TEST.VALUE:");
    assert_eq!(scoped.line_so_far, "TEST.VALUE:manager.");
    assert_eq!(top.field_key, scoped.field_key);
}

#[test]
fn value_lines_stop_completing_when_complete() {
    let builder = CompletionBuilder::default();
    let full = "TEST.VALUE:manager.Manager::PlaceOrder.Order.Entree:Chicken:";
    assert_eq!(builder.plan(&script(full)), CompletionPlan::Nothing);
    let globals = "TEST.VALUE:USER_GLOBALS_VCAST.<<GLOBAL>>.VECTORCAST_INT1:1:";
    assert_eq!(builder.plan(&script(globals)), CompletionPlan::Nothing);
    // a scope operator typed after a dotted path does not pop anything up
    assert_eq!(builder.plan(&script("TEST.VALUE:manager.Manager::")), CompletionPlan::Nothing);
    assert!(matches!(builder.plan(&script("TEST.VALUE:manager.Manager::Pl")), CompletionPlan::Query(_)));
}

#[test]
fn fields_without_choices_plan_nothing() {
    let builder = CompletionBuilder::default();
    for line in ["TEST.CODED_TEST_FILE:", "TEST.NOTES:", "TEST.NEW:", "TEST.BOGUS:"] {
        assert_eq!(builder.plan(&script(line)), CompletionPlan::Nothing, "{line}");
    }
    assert_eq!(builder.plan(&script("TEST.NOTES:\nTEST.")), CompletionPlan::Nothing);
}

#[test]
fn rows_keep_oracle_order_and_details() {
    let builder = CompletionBuilder::default();
    let ctx = script("TEST.VALUE:");
    let response = ChoiceResponse::with_choices(
        "File",
        ["database", "manager@unit under test", "USER_GLOBALS_VCAST", "uut_prototype_stubs"],
    );
    let items = builder.build(&ctx, &response);
    assert_eq!(
        labels(&items),
        vec!["database", "manager", "USER_GLOBALS_VCAST", "uut_prototype_stubs"]
    );
    assert_eq!(items[1].detail, "unit under test");
    assert!(items.iter().all(|i| i.kind == ItemKind::File));
    assert_eq!(builder.build(&ctx, &response), items);
}

#[test]
fn scalar_rows_expand_into_value_helpers() {
    let builder = CompletionBuilder::default();
    let ctx = script("TEST.VALUE:manager.Manager::PlaceOrder.Table:");
    let response = ChoiceResponse::with_choices("Value", ["scalar@unsigned short"]);
    let items = builder.build(&ctx, &response);
    assert_eq!(labels(&items), vec!["unsigned short", "vary", "<<MIN>>", "<<MID>>", "<<MAX>>"]);
    assert!(items[1].is_snippet);
    assert_eq!(items[1].insert_text.as_deref(), Some("VARY FROM:$1 TO:$2 BY:$3"));
    assert_eq!(items[2].kind, ItemKind::Constant);
}

#[test]
fn generated_instances_and_global_scope_are_dropped() {
    let builder = CompletionBuilder::default();
    let values = builder.build(
        &script("TEST.VALUE:USER_GLOBALS_VCAST.<<GLOBAL>>."),
        &ChoiceResponse::with_choices("Variable", ["C_1_2", "VECTORCAST_INT1", "obj C_10_20"]),
    );
    assert_eq!(labels(&values), vec!["VECTORCAST_INT1"]);

    let subprograms = builder.build(
        &script("TEST.UNIT:manager\nTEST.SUBPROGRAM:"),
        &ChoiceResponse::with_choices("Function", ["<<INIT>>", "<<GLOBAL>>", "Manager::PlaceOrder"]),
    );
    assert_eq!(labels(&subprograms), vec!["<<INIT>>", "Manager::PlaceOrder"]);
}

#[test]
fn requirement_rows_render_key_and_title() {
    let builder = CompletionBuilder::default();
    let items = builder.build(
        &script("TEST.REQUIREMENT_KEY:"),
        &ChoiceResponse::with_choices(
            "Keyword",
            ["FR11 ||| \"Clearing a table\" ||| Clearing resets the occupied flag", "bare"],
        ),
    );
    assert_eq!(labels(&items), vec!["FR11 | Clearing a table", "bare"]);
}

#[test]
fn vmock_extra_text_becomes_an_edit_on_the_first_item() {
    let builder = CompletionBuilder::default();
    let ctx = ctx_at_end("#include <x>\n// vmock manager ", LexicalMode::EmbeddedComment);
    let req = request(builder.plan(&ctx));
    assert_eq!(req.kind, ChoiceKind::Mock);
    assert_eq!(req.line_so_far, "// vmock manager");

    let response = ChoiceResponse {
        choice_kind: "Function".into(),
        choice_list: vec!["Manager::PlaceOrder".into(), "Manager::ClearTable".into()],
        extra_text: Some("some extra data".into()),
        messages: Vec::new(),
    };
    let items = builder.build(&ctx, &response);
    assert_eq!(
        items[0].additional_text_edits,
        vec![TextEdit {
            range: Range::default(),
            new_text: "// some extra data".into()
        }]
    );
    assert!(items[1].additional_text_edits.is_empty());

    let failed = ChoiceResponse {
        extra_text: Some("server-error".into()),
        ..response
    };
    assert!(builder.build(&ctx, &failed)[0].additional_text_edits.is_empty());
}

#[test]
fn unknown_choice_kinds_are_keywords() {
    assert_eq!(ItemKind::from_choice_kind("Function"), ItemKind::Function);
    assert_eq!(ItemKind::from_choice_kind(""), ItemKind::Keyword);
    assert_eq!(ItemKind::from_choice_kind("Snippet"), ItemKind::Keyword);
}
