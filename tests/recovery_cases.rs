use fork_mind::recovery::{RecoveryError, recover, sanitize};
use serde_json::json;

#[test]
fn sanitize_is_idempotent() {
    let input = "\u{201C}quoted\u{201D} \u{2018}single\u{2019} \u{2014} dash \u{2026} end\u{0007}\n\ttab";
    let once = sanitize(input);
    let twice = sanitize(&once);
    assert_eq!(once, twice);
    assert_eq!(once, "\"quoted\" 'single' - dash ... end\n\ttab");
}

#[test]
fn well_formed_json_parses_directly() {
    let input = r#"{"a": 1, "nested": {"b": ["x", "y"]}, "ok": true}"#;
    let value = recover(input).unwrap();
    assert_eq!(value, json!({"a": 1, "nested": {"b": ["x", "y"]}, "ok": true}));
}

#[test]
fn fenced_block_with_language_tag_is_extracted() {
    let input = "Here you go:\n```json\n{\"a\":1}\n```";
    assert_eq!(recover(input).unwrap(), json!({"a": 1}));
}

#[test]
fn fenced_block_without_language_tag_is_extracted() {
    let input = "Sure!\n```\n{\"ready\": true}\n```\nLet me know if you need more.";
    assert_eq!(recover(input).unwrap(), json!({"ready": true}));
}

#[test]
fn prose_around_object_is_stripped() {
    let input = "The result is {\"a\": 1} — hope that helps!";
    assert_eq!(recover(input).unwrap(), json!({"a": 1}));
}

#[test]
fn trailing_commas_are_repaired() {
    let input = r#"{"a": 1, "b": [1,2,],}"#;
    assert_eq!(recover(input).unwrap(), json!({"a": 1, "b": [1, 2]}));
}

#[test]
fn smart_quotes_are_normalized_before_parsing() {
    let input = "{\u{201C}mood\u{201D}: \u{201C}wistful\u{201D}}";
    assert_eq!(recover(input).unwrap(), json!({"mood": "wistful"}));
}

#[test]
fn single_quoted_values_are_requoted() {
    let input = r#"{"mood": 'hopeful', "tags": ['a', 'b']}"#;
    assert_eq!(
        recover(input).unwrap(),
        json!({"mood": "hopeful", "tags": ["a", "b"]})
    );
}

#[test]
fn apostrophes_inside_double_quoted_strings_survive() {
    let input = r#"{"note": "it's fine", "x": 'y'}"#;
    assert_eq!(recover(input).unwrap(), json!({"note": "it's fine", "x": "y"}));
}

#[test]
fn unescaped_inner_quotes_become_content() {
    let input = r#"{"note": "she said "hi" to me"}"#;
    let value = recover(input).unwrap();
    assert_eq!(value["note"], json!(r#"she said "hi" to me"#));
}

#[test]
fn raw_newline_inside_string_is_escaped() {
    let input = "{\"a\": \"line one\nline two\"}";
    let value = recover(input).unwrap();
    assert_eq!(value["a"], json!("line one\nline two"));
}

#[test]
fn plain_prose_fails_with_preview() {
    let input = "I'm sorry, I can't produce that for you today.";
    match recover(input) {
        Err(RecoveryError::NoJsonFound { preview }) => {
            assert!(preview.contains("sorry"), "preview was {preview:?}");
        }
        other => panic!("expected NoJsonFound, got {other:?}"),
    }
}

#[test]
fn empty_input_fails() {
    assert!(matches!(
        recover(""),
        Err(RecoveryError::NoJsonFound { .. })
    ));
}

// Two sibling top-level objects are not supported: the candidate is the
// literal first-`{`-to-last-`}` slice, which never becomes valid JSON.
// This pins the behavior rather than guessing a pick-one policy.
#[test]
fn sibling_objects_fail_with_diagnostic() {
    let input = r#"{"a":1} extra {"b":2}"#;
    match recover(input) {
        Err(RecoveryError::Unparseable {
            message,
            offset,
            preview,
            ..
        }) => {
            assert!(!message.is_empty());
            assert!(offset.is_some());
            assert!(preview.contains("extra"));
        }
        other => panic!("expected Unparseable, got {other:?}"),
    }
}

#[test]
fn diagnostics_carry_offset_and_context() {
    let input = r#"{"a": zzz}"#;
    match recover(input) {
        Err(RecoveryError::Unparseable {
            offset, context, ..
        }) => {
            assert!(offset.is_some());
            assert!(context.contains("zzz"), "context was {context:?}");
        }
        other => panic!("expected Unparseable, got {other:?}"),
    }
}

#[test]
fn zero_width_characters_are_stripped_during_repair() {
    let input = "{\"a\":\u{FEFF} 1,\u{200B} \"b\": 2}";
    assert_eq!(recover(input).unwrap(), json!({"a": 1, "b": 2}));
}
