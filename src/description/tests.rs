use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::*;
use crate::expr::EvaluationContext;

fn parse(text: &str) -> Result<Document, DescriptionError> {
    parse_str(text, Path::new("inline.desc"), &EvaluationContext::default())
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("benchrepo-description-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("scratch directory is created");
    dir
}

#[test]
fn sections_hold_items_in_order() {
    let document = parse(
        "# leading comment\n\
         [GLOBAL]\n\
         env: RUN = first\n\
         \n\
         [graph]\n\
         Title: Bandwidth\n\
         xtype: linear\n\
         ytype: log\n\
         [bench]\n\
         name: ior\n\
         filter: $NODES > 1\n\
         filter: $OPERATION = 'read'\n\
         [curve]\n\
         xval: $NODES\n\
         yval: $BANDWIDTH\n",
    )
    .expect("description parses");

    let kinds: Vec<SectionKind> = document.sections.iter().map(|section| section.kind).collect();
    assert_eq!(
        kinds,
        vec![SectionKind::Global, SectionKind::Graph, SectionKind::Bench, SectionKind::Curve]
    );
    let graph = &document.sections[1];
    assert_eq!(graph.value("title"), Some("Bandwidth"));
    assert_eq!(graph.item("ytype").map(|item| item.location.line), Some(8));
    assert_eq!(document.sections[2].values("filter").count(), 2);
}

#[test]
fn continuation_joins_lines_and_keeps_first_line_number() {
    let document = parse("[graph]\ntitle: a very \\\n   long \\\n title\nxtype: linear\n").expect("parses");
    let title = document.sections[0].item("title").expect("title present");
    assert_eq!(title.value, "a very long title");
    assert_eq!(title.location.line, 2);
    assert_eq!(document.sections[0].item("xtype").map(|item| item.location.line), Some(5));
}

#[test]
fn end_section_stops_parsing() {
    let document = parse("[graph]\nxtype: linear\n[end]\nthis is not parsed\n").expect("parses");
    assert_eq!(document.sections.len(), 1);
}

#[test]
fn vocabulary_violations_report_line_numbers() {
    let unknown = parse("[graph]\nxtype: linear\ncolour: red\n").expect_err("unknown key fails");
    assert_eq!(unknown.line, 3);
    assert!(unknown.message.contains("colour"));

    let duplicate = parse("[curve]\nxval: 1\nxval: 2\n").expect_err("duplicate key fails");
    assert_eq!(duplicate.line, 3);
    assert!(duplicate.to_string().starts_with("inline.desc:3:"));

    let check = parse("[curve]\n\naggr: mode\n").expect_err("bad aggregation fails");
    assert_eq!(check.line, 3);

    let options = parse("[graph]\noptions: stack, wobble\n").expect_err("bad flag fails");
    assert!(options.message.contains("wobble"));
}

#[test]
fn structural_errors_are_positioned() {
    let orphan = parse("title: nothing\n").expect_err("item without section fails");
    assert_eq!(orphan.line, 1);

    let section = parse("[plot]\n").expect_err("unknown section fails");
    assert!(section.message.contains("plot"));

    let malformed = parse("[graph]\njust words\n").expect_err("item without colon fails");
    assert_eq!(malformed.line, 2);
}

#[test]
fn includes_splice_relative_files() {
    let dir = scratch_dir("includes");
    fs::create_dir_all(dir.join("parts")).expect("parts directory");
    fs::write(
        dir.join("parts").join("curves.inc"),
        "[curve]\nxval: $NODES\nyval: $BANDWIDTH\n",
    )
    .expect("include written");
    fs::write(
        dir.join("main.desc"),
        "[graph]\nxtype: linear\nytype: linear\n[bench]\nname: ior\ninclude \"%{PARTS}/curves.inc\"\n",
    )
    .expect("main written");

    let mut overrides = BTreeMap::new();
    overrides.insert("PARTS".to_string(), "parts".to_string());
    let ctx = EvaluationContext::new(overrides);
    let document = parse_file(&dir.join("main.desc"), &ctx).expect("description with include parses");

    let curve = &document.sections[2];
    assert_eq!(curve.kind, SectionKind::Curve);
    assert!(curve.location.file.ends_with("curves.inc"));
    assert_eq!(curve.item("yval").map(|item| item.location.line), Some(3));
}

#[test]
fn include_cycles_are_rejected() {
    let dir = scratch_dir("cycle");
    fs::write(dir.join("a.desc"), "[graph]\ninclude \"b.desc\"\n").expect("a written");
    fs::write(dir.join("b.desc"), "include 'a.desc'\n").expect("b written");

    let err = parse_file(&dir.join("a.desc"), &EvaluationContext::default()).expect_err("cycle fails");
    assert!(err.message.contains("cycle"));
    assert!(err.file.ends_with("b.desc"));
}

#[test]
fn malformed_and_missing_includes_fail() {
    let malformed = parse("include curves.inc\n").expect_err("unquoted include fails");
    assert!(malformed.message.contains("malformed include"));

    let dir = scratch_dir("missing");
    let main = dir.join("main.desc");
    fs::write(&main, "[graph]\ninclude \"absent.inc\"\n").expect("main written");
    let missing = parse_file(&main, &EvaluationContext::default()).expect_err("missing include fails");
    assert_eq!(missing.line, 2);
}

#[test]
fn item_helpers_split_values() {
    assert_eq!(parse_range(":10"), Ok((None, Some(10.0))));
    assert!(parse_range("1-10").is_err());
    assert_eq!(parse_iterate_fields("$OPERATION, ${api}, nodes"), vec!["OPERATION", "api", "nodes"]);
    assert_eq!(
        parse_function_definition("speedup(a, b) = a / b"),
        Some(("speedup".to_string(), vec!["a".to_string(), "b".to_string()], "a / b".to_string()))
    );
    assert_eq!(
        parse_style_definition("hexagon = Hexagon pt 14"),
        Some(("hexagon".to_string(), "Hexagon".to_string(), Some("pt 14".to_string())))
    );
    assert_eq!(parse_flags("Stack,normalize  grid"), vec!["stack", "normalize", "grid"]);
}
