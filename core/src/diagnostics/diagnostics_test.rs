use super::*;

const NESTED: &str = "Commands cannot be nested in a \"NOTES\" block";

fn scan(text: &str) -> Vec<Diagnostic> {
    DiagnosticsScanner::default().scan(&Document::from_text(text))
}

fn strict(text: &str) -> Vec<Diagnostic> {
    let config = EngineConfig::default().with_structural_checks(true);
    DiagnosticsScanner::new(&config).scan(&Document::from_text(text))
}

fn messages(diags: &[Diagnostic]) -> Vec<&str> {
    diags.iter().map(|d| d.message.as_str()).collect()
}

#[test]
fn command_between_notes_markers_is_the_only_finding() {
    let diags = scan("TEST.NOTES:\nTEST.\nTEST.END_NOTES:");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, NESTED);
    assert_eq!(diags[0].severity, Severity::Warning);
    assert_eq!(diags[0].range, Range::on_line(1, 0, 5));
    assert_eq!(diags[0].source, SOURCE);
}

#[test]
fn open_notes_block_reports_each_command_line() {
    let text = "TEST.UNIT:manager\nTEST.NOTES:\nsome prose\nTEST.VALUE:x\n\nTEST.NAME:y\nTEST.NOTES:\nmore";
    let diags = scan(text);
    let nested: Vec<usize> = diags.iter().filter(|d| d.message == NESTED).map(Diagnostic::line).collect();
    assert_eq!(nested, vec![3, 5, 6]);
    // the opening line also carries the unterminated-block warning
    assert!(diags.iter().any(|d| d.line() == 1 && d.code == "unterminated-block"));
}

#[test]
fn validity_rules_are_errors() {
    let text = "TEST.SUBPROGRAM:coded_tests_driver\nTEST.NEW\nTEST.VALUE:manager.x:1\nTEST.CODED_TEST_FILE:a.cpp\nTEST.END";
    let diags = scan(text);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].line(), 2);
    assert_eq!(diags[0].severity, Severity::Error);
    assert_eq!(
        diags[0].message,
        "TEST.VALUE and TEST.EXPECTED are not valid when TEST.SUBPROGRAM is set to coded_tests_driver"
    );

    let other = scan("TEST.SUBPROGRAM:Manager::PlaceOrder\nTEST.CODED_TEST_FILE");
    assert_eq!(
        messages(&other),
        vec!["TEST.CODED_TEST_FILE is not valid when TEST.SUBPROGRAM is not set to coded_tests_driver"]
    );
}

#[test]
fn unrecognized_lines_are_skipped() {
    let text = "-- Environment: MANAGER\n\nrandom words\n// comment\nTEST.\nTEST.SUB";
    assert!(scan(text).is_empty());
}

#[test]
fn stray_terminator_is_reported() {
    let diags = scan("TEST.END_FLOW:");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, "stray-terminator");
    assert_eq!(diags[0].message, "TEST.END_FLOW has no matching TEST.FLOW");
}

#[test]
fn two_scans_are_identical() {
    let text = "TEST.NOTES:\nTEST.VALUE:a\nTEST.SUBPROGRAM:coded_tests_driver\nTEST.END_NOTES:\nTEST.FLOW:\nTEST.STUB:x";
    let doc = Document::from_text(text);
    let scanner = DiagnosticsScanner::default();
    assert_eq!(scanner.scan(&doc), scanner.scan(&doc));
}

#[test]
fn findings_are_ordered_by_line() {
    let diags = scan("TEST.FLOW:\nTEST.VALUE:a\nTEST.END_NOTES:\nTEST.VALUE:b");
    let lines: Vec<usize> = diags.iter().map(Diagnostic::line).collect();
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
    assert_eq!(lines.first(), Some(&0));
}

#[test]
fn caps_bound_the_output() {
    let mut text = String::from("TEST.NOTES:\n");
    for _ in 0..50 {
        text.push_str("TEST.VALUE:x\n");
    }
    let config = EngineConfig {
        max_diagnostics: 10,
        ..EngineConfig::default()
    };
    assert_eq!(DiagnosticsScanner::new(&config).scan(&Document::from_text(&text)).len(), 10);

    let config = EngineConfig {
        max_lines: 5,
        ..EngineConfig::default()
    };
    let diags = DiagnosticsScanner::new(&config).scan(&Document::from_text(&text));
    assert!(diags.iter().all(|d| d.line() < 5));
}

#[test]
fn structural_checks_follow_the_script_shape() {
    let text = "\
TEST.SCRIPT_FEATURE:MIXED_CASE_NAMES
TEST.SCRIPT_FEATURE:NOT_A_FLAG
TEST.SUBPROGRAM:PlaceOrder
TEST.UNIT:manager
TEST.SUBPROGRAM:<<INIT>>
TEST.NAME:outside
TEST.END
TEST.NEW
TEST.NAME:inside
TEST.BOGUS:1
TEST.END";
    let diags = strict(text);
    let found: Vec<(usize, &str)> = diags.iter().map(|d| (d.line(), d.code)).collect();
    assert_eq!(
        found,
        vec![
            (1, "invalid-feature"),
            (2, "missing-unit"),
            (5, "test-scope-only"),
            (6, "missing-test-start"),
            (9, "invalid-command"),
        ]
    );
    assert_eq!(diags[0].message, INVALID_FEATURE);
    assert!(diags.iter().all(|d| d.severity == Severity::Warning));
}

#[test]
fn new_without_subprogram_is_flagged() {
    let diags = strict("TEST.UNIT:manager\nTEST.NEW\nTEST.END");
    assert_eq!(messages(&diags), vec![MISSING_SUBPROGRAM]);
}

#[test]
fn structural_checks_are_off_by_default() {
    assert!(scan("TEST.BOGUS:1\nTEST.END").is_empty());
}

#[test]
fn requirement_key_needs_a_gateway_when_the_host_knows() {
    let doc = Document::from_text("TEST.NEW\nTEST.REQUIREMENT_KEY:FR11\nTEST.END");
    let scanner = DiagnosticsScanner::default();

    assert!(scanner.scan(&doc).is_empty());
    let present = EnvironmentFacts::default().with_requirements_gateway(true);
    assert!(scanner.scan_in(&doc, present).is_empty());

    let absent = EnvironmentFacts::default().with_requirements_gateway(false);
    let diags = scanner.scan_in(&doc, absent);
    assert_eq!(messages(&diags), vec![NO_REQUIREMENTS_GATEWAY]);
    assert_eq!(diags[0].line(), 1);
    assert_eq!(diags[0].code, "requirements-gateway");
    assert_eq!(diags[0].severity, Severity::Warning);
}
