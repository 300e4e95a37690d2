/*
 * Diagnostics as the host sees them: one compile call in, collected
 * messages (and their rendered form) out.
 */

use vexel::{compile, render_error_to_string_no_color, Error, Options, Severity};

fn fail(src: &str) -> Error {
    match compile(src, Options::default()) {
        Ok(_) => panic!("expected compilation to fail:\n{src}"),
        Err(e) => e,
    }
}

fn messages(err: &Error) -> Vec<String> {
    err.diagnostics()
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.to_string())
        .collect()
}

#[test]
fn undefined_identifier() {
    let err = fail("a = nowhere + 1;");
    assert_eq!(messages(&err), ["undefined identifier 'nowhere'"]);
}

#[test]
fn unknown_function() {
    let err = fail("a = frobnicate(1);");
    assert_eq!(messages(&err), ["unknown function 'frobnicate'"]);
}

#[test]
fn every_bad_statement_gets_its_own_diagnostic() {
    let err = fail("a = x;\nb = y;");
    assert_eq!(
        messages(&err),
        [
            "undefined identifier 'x'",
            "undefined identifier 'y'",
        ]
    );
}

#[test]
fn output_never_computed() {
    let err = fail("#input p numeric\n#output o numeric\na = p;");
    let msgs = messages(&err);
    assert!(
        msgs.iter().any(|m| m.contains("output 'o'")),
        "{msgs:?}"
    );
}

#[test]
fn overlapping_io_ranges() {
    let err = fail(concat!(
        "#input a vec2 @0\n",
        "#input b numeric @4\n",
        "#output o numeric\n",
        "o = a.x + b;\n",
    ));
    let msgs = messages(&err);
    assert!(
        msgs.iter()
            .any(|m| m.contains("'b' overlaps an earlier input binding")),
        "{msgs:?}"
    );
}

#[test]
fn io_offset_near_the_top_of_the_block() {
    // An explicit offset whose range runs past the addressable block must
    // come back as a diagnostic, also for any auto-offset binding after it.
    let err = fail(concat!(
        "#input a numeric @65534\n",
        "#input b numeric\n",
        "#output o numeric\n",
        "o = a + b;\n",
    ));
    let msgs = messages(&err);
    assert!(
        msgs.iter()
            .any(|m| m.contains("'a' ends beyond the addressable block")),
        "{msgs:?}"
    );
}

#[test]
fn gap_in_the_input_block() {
    let err = fail(concat!(
        "#input a numeric @0\n",
        "#input b numeric @8\n",
        "#output o numeric\n",
        "o = a + b;\n",
    ));
    let msgs = messages(&err);
    assert!(
        msgs.iter().any(|m| m.contains("gap at byte 4")),
        "{msgs:?}"
    );
}

#[test]
fn directives_after_statements() {
    let err = fail("a = 1;\n#define k 2\nb = k;");
    let msgs = messages(&err);
    assert!(
        msgs.iter()
            .any(|m| m.contains("directives must precede all statements")),
        "{msgs:?}"
    );
}

#[test]
fn recursive_inline_function() {
    let err = fail(concat!(
        "function f(x) { return f(x); }\n",
        "a = f(1);\n",
    ));
    let msgs = messages(&err);
    assert!(
        msgs.iter().any(|m| m.contains("'f'")),
        "{msgs:?}"
    );
}

#[test]
fn inline_body_locals_are_rejected() {
    let err = fail(concat!(
        "function lift(a) { t = a * 2; return t; }\n",
        "x = lift(1);\n",
    ));
    let msgs = messages(&err);
    assert!(
        msgs.iter()
            .any(|m| m.contains("bodies are limited to formal parameters and constants")),
        "{msgs:?}"
    );
}

#[test]
fn mixed_widths_in_arithmetic() {
    let err = fail(concat!(
        "#input a vec3\n",
        "#input b vec2\n",
        "#output o vec3\n",
        "o = a + b;\n",
    ));
    let msgs = messages(&err);
    assert!(!msgs.is_empty(), "{msgs:?}");
}

#[test]
fn vector_condition_is_rejected() {
    let err = fail("#input v vec3\n#output o numeric\nif (v) { o = 1; } else { o = 0; }");
    let msgs = messages(&err);
    assert!(
        msgs.iter()
            .any(|m| m.contains("condition must be a scalar, got width 3")),
        "{msgs:?}"
    );
}

#[test]
fn rendered_report_points_at_the_offending_span() {
    let source = "a = 1 + oops;";
    let err = fail(source);
    let report = render_error_to_string_no_color(source, &err);
    assert!(report.contains("undefined identifier 'oops'"), "{report}");
    assert!(report.contains("a = 1 + oops;"), "{report}");
}

#[test]
fn errors_do_not_leak_into_warnings() {
    // A failing compile never produces a Compilation, so warnings travel
    // in the same diagnostics list, below the errors.
    let err = fail("#input unused numeric\na = nope;");
    let all = err.diagnostics();
    assert!(all.iter().any(|d| d.severity == Severity::Error));
}
