use pretty_assertions::assert_eq;

use crate::opcode::*;
use crate::options::Options;
use crate::pipeline::{compile, Compilation};
use crate::test_utils::init_test_logging;

fn build(src: &str) -> Compilation {
    init_test_logging();
    compile(src, Options::default()).unwrap_or_else(|e| {
        panic!("compilation failed: {:#?}", e.diagnostics());
    })
}

fn code(c: &Compilation) -> &[u8] {
    &c.program.code[..c.program.code_len]
}

#[test]
fn trivial_assignment_image() {
    let c = build("a = 1;");
    assert_eq!(code(&c), &[OP_MOV, VAR_BIAS, 0x61, OP_END]);
    assert_eq!(c.program.data_count, 1);
    // Scalar number: kind nibble 0, width nibble 1.
    assert_eq!(c.program.meta[0], 0x01);
}

#[test]
fn variadic_push_feeds_the_move() {
    let c = build("#input p numeric\n#output o numeric\no = p + p;");
    assert_eq!(
        code(&c),
        &[
            OP_ADD + PUSH_VARIANT,
            2,
            VAR_BIAS,
            VAR_BIAS,
            OP_MOV,
            VAR_BIAS + 1,
            OP_STACK,
            OP_END,
        ]
    );
}

#[test]
fn zero_fill_lowers_to_a_single_move() {
    let c = build("#output o vec2\no = 0;");
    assert_eq!(code(&c), &[OP_MOV_ZERO, VAR_BIAS, OP_END]);
    assert_eq!(c.program.data_count, 2);
    assert_eq!(c.program.meta[0], 0x02);
}

#[test]
fn if_else_jumps_are_absolute() {
    let c = build("a = 1;\nif (a < 2) { a = 3; } else { a = 4; }");
    let bytes = code(&c);
    assert_eq!(
        bytes,
        &[
            OP_MOV, VAR_BIAS, 0x61, // a = 1
            OP_LT + PUSH_VARIANT, VAR_BIAS, 0x62, // push a < 2
            OP_JUMP_IF_NOT, 15, 0, // to the else branch
            OP_MOV, VAR_BIAS, 0x63, // a = 3
            OP_JUMP, 18, 0, // over the else branch
            OP_MOV, VAR_BIAS, 0x64, // a = 4
            OP_END,
        ]
    );
}

#[test]
fn loop_jumps_back_to_the_condition() {
    let c = build("a = 0;\nwhile (a < 3) { a = a + 1; }");
    let bytes = code(&c);
    assert_eq!(bytes[0], OP_MOV_ZERO);
    // Condition re-evaluates from offset 2; the loop exit lands on OP_END.
    assert_eq!(bytes[2], OP_LT + PUSH_VARIANT);
    assert_eq!(bytes[5], OP_JUMP_IF_NOT);
    assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 18);
    assert_eq!(bytes[15], OP_JUMP);
    assert_eq!(u16::from_le_bytes([bytes[16], bytes[17]]), 2);
    assert_eq!(bytes[18], OP_END);
}

#[test]
fn materialized_constants_land_in_the_data_segment() {
    let c = build("a = 0.3;\nb = a;");
    assert_eq!(
        code(&c),
        &[
            OP_MOV, VAR_BIAS, VAR_BIAS + 2, // a = $c
            OP_MOV, VAR_BIAS + 1, VAR_BIAS, // b = a
            OP_END,
        ]
    );
    assert_eq!(c.program.data_count, 3);
    assert_eq!(c.program.data[2], 0.3);
}

#[test]
fn raw_cdata_lives_behind_the_end_marker() {
    let c = build("#cdata s raw \"hi\"\na = noise(s);");
    let bytes = code(&c);
    // Blob reference, external call, move, end, then the blob itself.
    assert_eq!(bytes[0], OP_CDATA_REF);
    let blob_at = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
    assert_eq!(bytes[blob_at], OP_CDATA);
    assert_eq!(u16::from_le_bytes([bytes[blob_at + 1], bytes[blob_at + 2]]), 2);
    assert_eq!(&bytes[blob_at + 3..blob_at + 5], b"hi");
    assert_eq!(bytes[blob_at - 1], OP_END);
    assert_eq!(bytes[3], OP_EXT_PUSH);
}

#[test]
fn variable_references_stay_clear_of_operand_data() {
    let c = build(
        "#input p vec3\n#output o vec3\nv = p * 2;\nif (v.x > 1) { v = v + p; }\no = v;",
    );
    let bytes = code(&c);
    let hardcoded = operand_positions(bytes);
    // Every variable reference the scan sees must address a live data
    // slot; a reference byte misread out of operand data would not.
    for (i, &b) in bytes.iter().enumerate() {
        if is_var_ref(b) && !hardcoded.contains(&i) {
            assert!(
                ((b - VAR_BIAS) as usize) < c.program.data_count,
                "byte {i} references slot {} of {}",
                b - VAR_BIAS,
                c.program.data_count
            );
        }
    }
    assert!(hardcoded.iter().all(|&p| p < bytes.len()));
}

#[test]
fn compilation_is_deterministic() {
    let src = "#input p vec2\n#output o vec2\nv = p * 0.25;\no = v + (0.1 0.2);";
    let a = build(src);
    let b = build(src);
    assert_eq!(code(&a), code(&b));
    assert_eq!(a.program.data[..a.program.data_count], b.program.data[..b.program.data_count]);
}
