//! Placeholder substitution, error policies and single-node directives.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use common::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use stamper_core::{stamp, StampError, Stamper, StamperSettings, WordDocument};

fn stamp_default(doc: &WordDocument, context: serde_json::Value) -> WordDocument {
    stamp(doc, &context, &StamperSettings::default()).expect("stamps")
}

// ============================================================================
// Placeholders
// ============================================================================

#[test]
fn template_without_markers_is_unchanged() {
    let template = template(&format!("{}{}", p("Plain text"), p("More text")), &[]);
    let output = stamp_default(&template, json!({ "name": "Ada" }));
    assert_eq!(xml(&output), xml(&template));
}

#[test]
fn placeholder_split_across_styled_runs() {
    let body = r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Hello ${na</w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>me}!</w:t></w:r></w:p>"#;
    let output = stamp_default(&template(body, &[]), json!({ "name": "Ada" }));
    assert_eq!(texts(&output), vec!["Hello Ada!"]);
    assert_eq!(count(output.main(), "b"), 1);
    assert_eq!(count(output.main(), "i"), 1);
}

#[test]
fn proof_error_markers_removed_on_request() {
    let body = r#"<w:p><w:proofErr w:type="spellStart"/><w:r><w:t>${name}</w:t></w:r><w:proofErr w:type="spellEnd"/></w:p>"#;
    let template = template(body, &[]);
    let context = json!({ "name": "Ada" });

    let kept = stamp_default(&template, context.clone());
    assert_eq!(count(kept.main(), "proofErr"), 2);

    let settings = StamperSettings::default().with_remove_proof_errors(true);
    let cleaned = stamp(&template, &context, &settings).unwrap();
    assert_eq!(count(cleaned.main(), "proofErr"), 0);
    assert_eq!(texts(&cleaned), vec!["Ada"]);
}

#[test]
fn nested_paths_and_numbers() {
    let body = p("${user.name} is ${user.age}");
    let output = stamp_default(&template(&body, &[]), json!({ "user": { "name": "Ada", "age": 36 } }));
    assert_eq!(texts(&output), vec!["Ada is 36"]);
}

#[test]
fn header_placeholders_are_replaced() {
    let header = format!(
        r#"<w:hdr xmlns:w="{W_NS}"><w:p><w:r><w:t>Prepared for ${{name}}</w:t></w:r></w:p></w:hdr>"#
    );
    let template = with_header(&p("Body"), &header);
    let output = stamp_default(&template, json!({ "name": "Ada" }));

    let story = &output.stories()[0];
    assert_eq!(story.path, "word/header1.xml");
    let root = story.tree.root().unwrap();
    assert_eq!(story.tree.text(root), "Prepared for Ada");
}

#[test]
fn line_break_placeholder_becomes_break() {
    let settings = StamperSettings::default().with_line_break_placeholder("|");
    let output = stamp(
        &template(&p("${address}"), &[]),
        &json!({ "address": "Line 1|Line 2" }),
        &settings,
    )
    .unwrap();
    assert_eq!(count(output.main(), "br"), 1);
    assert_eq!(texts(&output), vec!["Line 1Line 2"]);
}

#[test]
fn image_value_adds_media_part() {
    let mut png = b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR".to_vec();
    png.extend_from_slice(&8u32.to_be_bytes());
    png.extend_from_slice(&8u32.to_be_bytes());
    let context = json!({ "logo": { "$image": STANDARD.encode(&png) } });

    let output = stamp_default(&template(&p("${logo}"), &[]), context);
    assert_eq!(count(output.main(), "drawing"), 1);
    assert!(output
        .package()
        .part_names()
        .any(|name| name.starts_with("word/media/") && name.ends_with(".png")));
}

#[test]
fn stamp_bytes_round_trip() {
    let bytes = template(&p("Dear ${name},"), &[]).to_bytes().unwrap();
    let stamped = Stamper::default()
        .stamp_bytes(&bytes, &json!({ "name": "Grace" }))
        .unwrap();
    let reloaded = WordDocument::from_bytes(&stamped).unwrap();
    assert_eq!(texts(&reloaded), vec!["Dear Grace,"]);
}

#[test]
fn stamper_is_reusable() {
    let stamper = Stamper::default();
    let template = template(
        &commented(1, &["Item ${n}"]),
        &[(1, "repeatParagraph(items)")],
    );
    let context = json!({ "items": [{ "n": 1 }, { "n": 2 }] });
    let first = stamper.stamp(&template, &context).unwrap();
    let second = stamper.stamp(&template, &context).unwrap();
    assert_eq!(xml(&first), xml(&second));
    assert_eq!(texts(&second), vec!["Item 1", "Item 2"]);
}

proptest! {
    #[test]
    fn placeholder_survives_any_run_split(cut in 1usize..14) {
        let text = "Hello ${name}!";
        let (head, tail) = text.split_at(cut);
        let body = format!(
            "<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>{head}</w:t></w:r><w:r><w:t>{tail}</w:t></w:r></w:p>"
        );
        let output = stamp(&template(&body, &[]), &json!({ "name": "Ada" }), &StamperSettings::default()).unwrap();
        prop_assert_eq!(texts(&output), vec!["Hello Ada!".to_string()]);
    }
}

// ============================================================================
// Unresolved expressions
// ============================================================================

#[test]
fn unresolved_placeholder_fails_and_leaves_template_untouched() {
    let template = template(&p("Hi ${missing}"), &[]);
    let before = xml(&template);
    let err = stamp(&template, &json!({}), &StamperSettings::default()).unwrap_err();
    assert!(matches!(err, StampError::UnresolvedExpression { ref expression, .. } if expression == "${missing}"));
    assert_eq!(xml(&template), before);
}

#[test]
fn lenient_policies() {
    let template = template(&p("Hi ${missing}"), &[]);
    let run = |settings: StamperSettings| texts(&stamp(&template, &json!({}), &settings).unwrap());

    assert_eq!(run(StamperSettings::lenient()), vec!["Hi ${missing}"]);
    assert_eq!(
        run(StamperSettings::lenient().with_leave_empty_on_error(true)),
        vec!["Hi "]
    );
    assert_eq!(
        run(StamperSettings::lenient().with_default_value("N/A")),
        vec!["Hi N/A"]
    );
}

#[test]
fn null_values_render_empty_unless_disabled() {
    let template = template(&p("[${value}]"), &[]);
    let context = json!({ "value": null });
    assert_eq!(texts(&stamp_default(&template, context.clone())), vec!["[]"]);

    let strict = StamperSettings::default().with_replace_null_values(false);
    let err = stamp(&template, &context, &strict).unwrap_err();
    assert!(matches!(err, StampError::UnresolvedExpression { .. }));
}

#[test]
fn unknown_directive_fails_by_default() {
    let template = template(&commented(1, &["text"]), &[(1, "frobnicate(x)")]);
    let err = stamp(&template, &json!({ "x": 1 }), &StamperSettings::default()).unwrap_err();
    assert!(matches!(err, StampError::UnresolvedExpression { ref expression, .. } if expression == "frobnicate(x)"));

    let kept = stamp(&template, &json!({ "x": 1 }), &StamperSettings::lenient()).unwrap();
    assert_eq!(comment_entries(&kept), 1);
    assert_eq!(count(kept.main(), "commentRangeStart"), 1);
}

#[test]
fn invalid_directive_is_dropped_when_leaving_empty() {
    let template = template(
        &commented(1, &["x ${name}"]),
        &[(1, "repeatParagraph(name)")],
    );
    let context = json!({ "name": "Ada" });
    let err = stamp(&template, &context, &StamperSettings::default()).unwrap_err();
    assert!(matches!(err, StampError::InvalidDirective { ref reason, .. } if reason == "expects a list, got string"));

    let settings = StamperSettings::lenient().with_leave_empty_on_error(true);
    let output = stamp(&template, &context, &settings).unwrap();
    assert_eq!(texts(&output), vec!["x Ada"]);
    assert_eq!(comment_entries(&output), 0);
    assert_eq!(count(output.main(), "commentReference"), 0);
}

#[test]
fn plain_comments_are_kept() {
    let template = template(&commented(1, &["Hello ${name}"]), &[(1, "Looks good")]);
    let output = stamp_default(&template, json!({ "name": "Ada" }));
    assert_eq!(texts(&output), vec!["Hello Ada"]);
    assert_eq!(comment_entries(&output), 1);
    assert_eq!(count(output.main(), "commentRangeEnd"), 1);
}

#[test]
fn crossing_comment_ranges_are_skipped() {
    let crossing = r#"<w:p><w:commentRangeStart w:id="1"/><w:commentRangeStart w:id="2"/><w:r><w:t>${name}</w:t></w:r><w:commentRangeEnd w:id="1"/><w:commentRangeEnd w:id="2"/></w:p>"#;
    let body = format!("{crossing}{}", commented(3, &["Drop me"]));
    let mut document = template(
        &body,
        &[(1, "displayParagraphIf(false)"), (2, "note"), (3, "displayParagraphIf(false)")],
    );
    let report = Stamper::default()
        .stamp_in_place(&mut document, &json!({ "name": "Ada" }))
        .unwrap();
    assert_eq!(report.malformed_comments, 2);
    assert_eq!(report.directives, 1);
    assert_eq!(texts(&document), vec!["Ada"]);
}

#[test]
fn directive_nested_in_a_plain_comment_runs() {
    let body = concat!(
        r#"<w:p><w:commentRangeStart w:id="1"/><w:r><w:t>Shown</w:t></w:r></w:p>"#,
        r#"<w:p><w:commentRangeStart w:id="2"/><w:r><w:t>Hidden</w:t></w:r><w:commentRangeEnd w:id="2"/><w:r><w:commentReference w:id="2"/></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>Tail</w:t></w:r><w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r></w:p>"#,
    );
    let template = template(body, &[(1, "Please check"), (2, "displayParagraphIf(false)")]);
    let output = stamp_default(&template, json!({}));
    assert_eq!(texts(&output), vec!["Shown", "Tail"]);
    assert_eq!(comment_entries(&output), 1);
    assert_eq!(count(output.main(), "commentRangeStart"), 1);
}

#[test]
fn values_are_not_scanned_again_by_the_outer_pass() {
    let template = template(&commented(1, &["Note: ${v}"]), &[(1, "repeatParagraph(items)")]);

    let output = stamp_default(
        &template,
        json!({ "secret": "LEAK", "items": [{ "v": "${secret}" }] }),
    );
    assert_eq!(texts(&output), vec!["Note: ${secret}"]);

    let output = stamp_default(&template, json!({ "items": [{ "v": "costs ${price}" }] }));
    assert_eq!(texts(&output), vec!["Note: costs ${price}"]);
}

// ============================================================================
// Conditional display and word replacement
// ============================================================================

#[test]
fn display_paragraph_if() {
    let template = template(
        &format!("{}{}", p("Keep"), commented(1, &["Optional"])),
        &[(1, "displayParagraphIf(show)")],
    );

    let hidden = stamp_default(&template, json!({ "show": false }));
    assert_eq!(texts(&hidden), vec!["Keep"]);
    assert_eq!(comment_entries(&hidden), 0);

    let shown = stamp_default(&template, json!({ "show": true }));
    assert_eq!(texts(&shown), vec!["Keep", "Optional"]);
    assert_eq!(count(shown.main(), "commentRangeStart"), 0);
}

#[test]
fn display_table_if_removes_whole_table() {
    let body = format!(
        "<w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>{}",
        commented(1, &["cell"]),
        p("after")
    );
    let template = template(&body, &[(1, "displayTableIf(show)")]);
    let output = stamp_default(&template, json!({ "show": false }));
    assert_eq!(count(output.main(), "tbl"), 0);
    assert_eq!(texts(&output), vec!["after"]);
}

#[test]
fn display_row_if_null_removes_row() {
    let body = format!(
        "<w:tbl><w:tr><w:tc>{}</w:tc></w:tr><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>",
        p("always"),
        commented(1, &["sometimes"])
    );
    let template = template(&body, &[(1, "displayTableRowIf(flag)")]);
    let output = stamp_default(&template, json!({ "flag": null }));
    assert_eq!(count(output.main(), "tr"), 1);
    assert_eq!(output.main().text(output.body().unwrap()), "always");
}

#[test]
fn display_if_rejects_non_boolean() {
    let template = template(&commented(1, &["x"]), &[(1, "displayParagraphIf(count)")]);
    let err = stamp(&template, &json!({ "count": 3 }), &StamperSettings::default()).unwrap_err();
    assert!(matches!(err, StampError::InvalidDirective { .. }));
}

#[test]
fn replace_word_with_keeps_run_style() {
    let body = r#"<w:p><w:r><w:t>Dear </w:t></w:r><w:commentRangeStart w:id="1"/><w:r><w:rPr><w:b/></w:rPr><w:t>NAME</w:t></w:r><w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r></w:p>"#;
    let template = template(body, &[(1, "replaceWordWith(name)")]);
    let output = stamp_default(&template, json!({ "name": "Ada" }));
    assert_eq!(texts(&output), vec!["Dear Ada"]);
    assert_eq!(count(output.main(), "b"), 1);
    assert_eq!(count(output.main(), "commentReference"), 0);
}

#[test]
fn replace_word_with_needs_a_single_run() {
    let template = template(
        &commented(1, &["first", "second"]),
        &[(1, "replaceWordWith(name)")],
    );
    let err = stamp(&template, &json!({ "name": "Ada" }), &StamperSettings::default()).unwrap_err();
    assert!(matches!(err, StampError::InvalidDirective { .. }));
}

// ============================================================================
// Tables
// ============================================================================

fn table_template() -> WordDocument {
    let body = format!(
        "<w:tbl><w:tr><w:tc>{}</w:tc></w:tr><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>{}",
        commented(1, &["Header"]),
        p("Cell"),
        p("${after}")
    );
    template(&body, &[(1, "resolveTable(table)")])
}

fn cell_texts(doc: &WordDocument) -> Vec<Vec<String>> {
    let main = doc.main();
    let root = main.root().unwrap();
    main.descendants(root)
        .filter(|&n| main.is(n, W_NS, "tr"))
        .map(|row| {
            main.child_elements(row)
                .filter(|&c| main.is(c, W_NS, "tc"))
                .map(|cell| main.text(cell))
                .collect()
        })
        .collect()
}

#[test]
fn resolve_table_fills_headers_and_records() {
    let context = json!({
        "after": "done",
        "table": {
            "headers": ["Name", "Born"],
            "records": [["Ada", 1815], ["Grace", "${after}"]],
        },
    });
    let output = stamp_default(&table_template(), context);
    assert_eq!(
        cell_texts(&output),
        vec![
            vec!["Name", "Born"],
            vec!["Ada", "1815"],
            vec!["Grace", "${after}"],
        ]
    );
    assert_eq!(texts(&output), vec!["done"]);
    assert_eq!(count(output.main(), "commentRangeStart"), 0);
    assert_eq!(comment_entries(&output), 0);
}

#[test]
fn resolve_table_without_records_keeps_headers_only() {
    let context = json!({ "after": "", "table": { "headers": ["Name"], "records": [] } });
    let output = stamp_default(&table_template(), context);
    assert_eq!(cell_texts(&output), vec![vec!["Name"]]);
}

#[test]
fn resolve_table_null_uses_substitute() {
    let context = json!({ "after": "end", "table": null });
    let removed = stamp_default(&table_template(), context.clone());
    assert_eq!(count(removed.main(), "tbl"), 0);
    assert_eq!(texts(&removed), vec!["end"]);

    let settings = StamperSettings::default().with_empty_repeat_substitute("No data");
    let substituted = stamp(&table_template(), &context, &settings).unwrap();
    assert_eq!(texts(&substituted), vec!["No data", "end"]);
}

#[test]
fn resolve_table_outside_a_table_is_invalid() {
    let template = template(&commented(1, &["x"]), &[(1, "resolveTable(table)")]);
    let context = json!({ "table": { "headers": [], "records": [] } });
    let err = stamp(&template, &context, &StamperSettings::default()).unwrap_err();
    assert!(matches!(err, StampError::InvalidDirective { ref reason, .. } if reason == "not inside a table cell"));
}

// ============================================================================
// Inline directives
// ============================================================================

#[test]
fn inline_display_if() {
    let template = template(
        &format!("{}{}", p("#{displayParagraphIf(flag)}Visible"), p("Other")),
        &[],
    );

    let shown = stamp_default(&template, json!({ "flag": true }));
    assert_eq!(texts(&shown), vec!["Visible", "Other"]);

    let hidden = stamp_default(&template, json!({ "flag": false }));
    assert_eq!(texts(&hidden), vec!["Other"]);
}

#[test]
fn inline_repeat_paragraph() {
    let template = template(&p("#{repeatParagraph(items)}Item ${n}"), &[]);
    let output = stamp_default(&template, json!({ "items": [{ "n": "a" }, { "n": "b" }] }));
    assert_eq!(texts(&output), vec!["Item a", "Item b"]);
}

#[test]
fn unresolved_inline_directive_policies() {
    let template = template(&p("A#{nope}B"), &[]);
    let err = stamp(&template, &json!({}), &StamperSettings::default()).unwrap_err();
    assert!(matches!(err, StampError::UnresolvedExpression { .. }));

    let emptied = stamp(
        &template,
        &json!({}),
        &StamperSettings::lenient().with_leave_empty_on_error(true),
    )
    .unwrap();
    assert_eq!(texts(&emptied), vec!["AB"]);

    let defaulted = stamp(
        &template,
        &json!({}),
        &StamperSettings::lenient().with_default_value("-"),
    )
    .unwrap();
    assert_eq!(texts(&defaulted), vec!["A-B"]);

    let kept = stamp(&template, &json!({}), &StamperSettings::lenient()).unwrap();
    assert_eq!(texts(&kept), vec!["A#{nope}B"]);
}
