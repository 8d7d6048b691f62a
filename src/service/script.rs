// Copyright 2023 Remi Bernotavicius

//! Turns a bundled SQL file into a list of statements for a batch.
//!
//! Only `-- ` line comments (with the trailing space) are recognized; `/* */` blocks and `--`
//! followed by anything else pass through untouched.

use crate::{Error, Result};
use std::path::Path;

pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::resource(path, e))?;
    let statements = statements_from_script(&content);
    log::info!("loaded {} statements from {path:?}", statements.len());
    Ok(statements)
}

pub fn statements_from_script(content: &str) -> Vec<String> {
    let content = strip_comments(content);
    let content = collapse_whitespace(&content);
    split_statements(&content)
}

/// Removes every `-- ` through the end of its line, newline included.
fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("-- ") {
        out.push_str(&rest[..start]);
        rest = match rest[start..].find('\n') {
            Some(eol) => &rest[start + eol + 1..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

fn collapse_whitespace(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut in_whitespace = false;
    for c in content.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
            }
            in_whitespace = true;
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    out
}

fn split_statements(content: &str) -> Vec<String> {
    content
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[test]
fn comments_and_blank_lines() {
    let statements = statements_from_script("-- comment\nSELECT 1;\n\nSELECT 2");
    assert_eq!(statements, ["SELECT 1", "SELECT 2"]);
}

#[test]
fn comment_stripping() {
    assert_eq!(strip_comments("a -- b\nc"), "a c");
    assert_eq!(strip_comments("a -- trailing"), "a ");
    assert_eq!(strip_comments("-- one\n-- two\nx"), "x");
    assert_eq!(strip_comments("--no-space\nx"), "--no-space\nx");
    assert_eq!(strip_comments("/* block */ x"), "/* block */ x");
}

#[test]
fn whitespace_is_collapsed() {
    assert_eq!(
        collapse_whitespace("CREATE TABLE t (\n\t a INT,\r\n  b INT\n)"),
        "CREATE TABLE t ( a INT, b INT )"
    );
}

#[test]
fn splitting_drops_blank_segments() {
    assert_eq!(split_statements(" a ; ; b;c ;  "), ["a", "b", "c"]);
    assert!(split_statements("  ").is_empty());
    assert!(split_statements(";;").is_empty());
}

#[test]
fn clean_input_is_unchanged() {
    let statements = vec![
        "DROP TABLE IF EXISTS unit".to_string(),
        "CREATE TABLE unit (unit_id INTEGER PRIMARY KEY, unit_name_singular TEXT)".to_string(),
        "INSERT INTO unit (unit_name_singular) VALUES ('cup')".to_string(),
    ];
    let script = statements.join("; ") + ";";
    assert_eq!(statements_from_script(&script), statements);
}

#[test]
fn commented_multi_line_script() {
    let script = "\
-- Units
INSERT INTO unit (unit_name_singular, unit_name_plural) VALUES ('cup', 'cups');
INSERT INTO unit (unit_name_singular, unit_name_plural)
    VALUES ('pinch', 'pinches'); -- the smallest

--
-- Categories
INSERT INTO category (category_name) VALUES ('Breakfast');
";
    assert_eq!(
        statements_from_script(script),
        [
            "INSERT INTO unit (unit_name_singular, unit_name_plural) VALUES ('cup', 'cups')",
            "INSERT INTO unit (unit_name_singular, unit_name_plural) VALUES ('pinch', 'pinches')",
            // A bare `--` is not a comment here, and collapsing pulls the next line onto it.
            "-- INSERT INTO category (category_name) VALUES ('Breakfast')",
        ]
    );
}

#[test]
fn missing_file_is_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let e = load_script(dir.path().join("missing.sql")).unwrap_err();
    assert!(!e.is_not_found());
    assert!(e.to_string().contains("missing.sql"), "{e}");
}
