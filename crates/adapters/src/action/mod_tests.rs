// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn params(pairs: &[(&str, &str)]) -> StepParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn content_replaces_whole_file() {
    let out = apply_patch("a.ts", Some("old"), &params(&[("content", "new")])).unwrap();
    assert_eq!(out, "new");
}

#[test]
fn content_creates_missing_file() {
    let out = apply_patch("a.ts", None, &params(&[("content", "new")])).unwrap();
    assert_eq!(out, "new");
}

#[test]
fn search_replace_substitutes_all_occurrences() {
    let out = apply_patch(
        "a.ts",
        Some("let x = 1; let y = x;"),
        &params(&[("search", "let"), ("replace", "const")]),
    )
    .unwrap();
    assert_eq!(out, "const x = 1; const y = x;");
}

#[parameterized(
    no_params = { &[] },
    search_only = { &[("search", "x")] },
    empty_search = { &[("search", ""), ("replace", "y")] },
)]
fn invalid_parameters_are_rejected(pairs: &[(&str, &str)]) {
    let err = apply_patch("a.ts", Some("x"), &params(pairs)).unwrap_err();
    assert!(matches!(err, ActionError::InvalidParameters(_)), "{err:?}");
}

#[test]
fn missing_pattern_is_an_error() {
    let err = apply_patch(
        "a.ts",
        Some("abc"),
        &params(&[("search", "zzz"), ("replace", "y")]),
    )
    .unwrap_err();
    assert!(matches!(err, ActionError::PatternNotFound { .. }));
}

#[test]
fn search_replace_on_missing_file_is_not_found() {
    let err = apply_patch("a.ts", None, &params(&[("search", "a"), ("replace", "b")])).unwrap_err();
    assert!(matches!(err, ActionError::NotFound(_)));
}
