use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, InsertTextFormat, NumberOrString, Position,
    Range, TextEdit,
};

use tst_core::{ItemKind, Severity};

pub(crate) fn to_core_position(pos: Position) -> tst_core::Position {
    tst_core::Position::new(pos.line, pos.character)
}

pub(crate) fn to_lsp_range(range: tst_core::Range) -> Range {
    Range::new(
        Position::new(range.start.line, range.start.character),
        Position::new(range.end.line, range.end.character),
    )
}

pub(crate) fn to_lsp_diagnostic(diag: &tst_core::Diagnostic) -> Diagnostic {
    Diagnostic {
        range: to_lsp_range(diag.range),
        severity: Some(match diag.severity {
            Severity::Error => DiagnosticSeverity::ERROR,
            Severity::Warning => DiagnosticSeverity::WARNING,
        }),
        code: Some(NumberOrString::String(diag.code.to_string())),
        source: Some(diag.source.to_string()),
        message: diag.message.clone(),
        ..Default::default()
    }
}

fn to_lsp_kind(kind: ItemKind) -> CompletionItemKind {
    match kind {
        ItemKind::Constant => CompletionItemKind::CONSTANT,
        ItemKind::Enum => CompletionItemKind::ENUM,
        ItemKind::Field => CompletionItemKind::FIELD,
        ItemKind::File => CompletionItemKind::FILE,
        ItemKind::Function => CompletionItemKind::FUNCTION,
        ItemKind::Keyword => CompletionItemKind::KEYWORD,
        ItemKind::Property => CompletionItemKind::PROPERTY,
        ItemKind::Value => CompletionItemKind::VALUE,
        ItemKind::Variable => CompletionItemKind::VARIABLE,
        ItemKind::Text => CompletionItemKind::TEXT,
        ItemKind::Snippet => CompletionItemKind::SNIPPET,
    }
}

pub(crate) fn to_lsp_completion(item: &tst_core::CompletionItem) -> CompletionItem {
    let edits: Vec<TextEdit> = item
        .additional_text_edits
        .iter()
        .map(|e| TextEdit::new(to_lsp_range(e.range), e.new_text.clone()))
        .collect();
    CompletionItem {
        label: item.label.clone(),
        kind: Some(to_lsp_kind(item.kind)),
        detail: (!item.detail.is_empty()).then(|| item.detail.clone()),
        insert_text: item.insert_text.clone(),
        insert_text_format: item.is_snippet.then_some(InsertTextFormat::SNIPPET),
        additional_text_edits: (!edits.is_empty()).then_some(edits),
        ..Default::default()
    }
}
