//! Vexel bytecode opcode map.
//!
//! The packaged instruction stream is one undifferentiated byte array, so
//! every byte value is assigned to exactly one of four roles:
//!
//! ```text
//! 0x00 ..= 0x1F   core opcodes (moves, jumps, stack, cdata, external calls)
//! 0x20 ..= 0x5F   function opcodes, in base/push-variant pairs
//! 0x60 ..= 0x7F   constant opcodes (well-known values, valid as operands)
//! 0x80 ..= 0xFF   variable references (byte - VAR_BIAS = data-segment slot)
//! ```
//!
//! Bytes that are immediate data (jump offsets, external function ids,
//! variadic size bytes, cdata payloads) can collide with any of the ranges
//! above; the packager counts them with [`operand_bytes_after`] so they are
//! never reinterpreted as opcodes or variable references.

/// Bias separating variable-reference bytes from everything else.
///
/// A byte `b >= VAR_BIAS` in opcode position denotes data slot
/// `b - VAR_BIAS`. This caps the addressable data segment at 128 slots.
pub const VAR_BIAS: u8 = 0x80;

// ============================================================================
// Core opcodes (0x00 - 0x1F)
// ============================================================================

/// No operation. Keeping 0x00 inert means zeroed memory cannot execute
/// anything interesting.
pub const OP_NOP: u8 = 0x00;
/// End of program. Cdata blobs, if any, follow this byte.
pub const OP_END: u8 = 0x01;
/// `[OP_MOV][dst][src]` - copy a value into a variable.
pub const OP_MOV: u8 = 0x02;
/// `[OP_MOV_ZERO][dst]` - zero-fill a variable (cheaper than materializing
/// a zero value and copying it).
pub const OP_MOV_ZERO: u8 = 0x03;
/// `[OP_MOV_IDX0][dst][src]` - write component 0 of a vector variable.
pub const OP_MOV_IDX0: u8 = 0x04;
pub const OP_MOV_IDX1: u8 = 0x05;
pub const OP_MOV_IDX2: u8 = 0x06;
pub const OP_MOV_IDX3: u8 = 0x07;
/// `[OP_MOV_IDXV][dst][index][src]` - write a runtime-computed component.
pub const OP_MOV_IDXV: u8 = 0x08;
/// Operand byte: pop the value from the evaluation stack.
pub const OP_STACK: u8 = 0x09;
/// `[OP_PUSH][src]` - push a plain operand onto the evaluation stack.
pub const OP_PUSH: u8 = 0x0A;
/// `[OP_JUMP][lo][hi]` - absolute little-endian code offset.
pub const OP_JUMP: u8 = 0x0B;
/// `[OP_JUMP_IF][lo][hi]` - jump when the popped stack top is non-zero.
pub const OP_JUMP_IF: u8 = 0x0C;
/// `[OP_JUMP_IF_NOT][lo][hi]` - jump when the popped stack top is zero.
pub const OP_JUMP_IF_NOT: u8 = 0x0D;
/// `[OP_CDATA][len lo][len hi][payload...]` - constant blob marker, only
/// emitted after [`OP_END`].
pub const OP_CDATA: u8 = 0x0E;
/// `[OP_CDATA_REF][lo][hi]` - push the code offset of a cdata blob.
pub const OP_CDATA_REF: u8 = 0x0F;
/// `[OP_EXT][id lo][id hi][args...]` - external call, result discarded.
pub const OP_EXT: u8 = 0x10;
/// `[OP_EXT_PUSH][id lo][id hi][args...]` - external call, result pushed.
pub const OP_EXT_PUSH: u8 = 0x11;
/// `[OP_CONST_LOAD][slot]` - push the value at a raw data slot. The slot
/// byte is unbiased, so it is hardcoded operand data.
pub const OP_CONST_LOAD: u8 = 0x12;

// 0x13-0x1F reserved.

// ============================================================================
// Function opcodes (0x20 - 0x5F), base/push pairs
// ============================================================================

// Arithmetic. add/mul/min/max are variadic and carry a size byte.
pub const OP_ADD: u8 = 0x20;
pub const OP_SUB: u8 = 0x22;
pub const OP_MUL: u8 = 0x24;
pub const OP_DIV: u8 = 0x26;
pub const OP_MOD: u8 = 0x28;
pub const OP_NEG: u8 = 0x2A;

// Comparisons collapse to a width-1 truth value.
pub const OP_EQ: u8 = 0x2C;
pub const OP_NE: u8 = 0x2E;
pub const OP_LT: u8 = 0x30;
pub const OP_LE: u8 = 0x32;
pub const OP_GT: u8 = 0x34;
pub const OP_GE: u8 = 0x36;

// Logical.
pub const OP_AND: u8 = 0x38;
pub const OP_OR: u8 = 0x3A;
pub const OP_NOT: u8 = 0x3C;

// Vector construction.
pub const OP_EXPAND2: u8 = 0x3E;
pub const OP_EXPAND3: u8 = 0x40;
pub const OP_EXPAND4: u8 = 0x42;
pub const OP_VEC2: u8 = 0x44;
pub const OP_VEC3: u8 = 0x46;
pub const OP_VEC4: u8 = 0x48;

// Component reads.
pub const OP_IDX0: u8 = 0x4A;
pub const OP_IDX1: u8 = 0x4C;
pub const OP_IDX2: u8 = 0x4E;
pub const OP_IDX3: u8 = 0x50;
pub const OP_IDXV: u8 = 0x52;

// Math builtins.
pub const OP_SIN: u8 = 0x54;
pub const OP_COS: u8 = 0x56;
pub const OP_SQRT: u8 = 0x58;
pub const OP_ABS: u8 = 0x5A;
pub const OP_MIN: u8 = 0x5C;
pub const OP_MAX: u8 = 0x5E;

/// Offset from a function's base opcode to its push variant.
pub const PUSH_VARIANT: u8 = 1;

// ============================================================================
// Constant opcodes (0x60 - 0x7F)
// ============================================================================

pub const CONST_OP_BASE: u8 = 0x60;

/// Well-known values that encode as a single opcode byte instead of
/// occupying a data-segment slot. Matching is done within the configured
/// constant epsilon; values are stored positive only (negations are split
/// into a unary minus during identifier mapping).
pub const CONST_OPS: &[(u8, f32)] = &[
    (0x60, 0.0),
    (0x61, 1.0),
    (0x62, 2.0),
    (0x63, 3.0),
    (0x64, 4.0),
    (0x65, 0.5),
    (0x66, 0.25),
    (0x67, 10.0),
    (0x68, core::f32::consts::PI),
    (0x69, core::f32::consts::TAU),
    (0x6A, core::f32::consts::FRAC_PI_2),
    (0x6B, core::f32::consts::E),
    (0x6C, core::f32::consts::SQRT_2),
    (0x6D, 1.0e-6),
    (0x6E, f32::INFINITY),
];

/// Find the constant opcode for `value`, if one matches within `epsilon`.
///
/// Infinity needs an exact match; epsilon arithmetic on infinities is NaN.
pub fn const_op_for(value: f32, epsilon: f32) -> Option<u8> {
    CONST_OPS.iter().find_map(|&(op, v)| {
        let hit = if v.is_infinite() {
            value == v
        } else {
            (value - v).abs() <= epsilon
        };
        hit.then_some(op)
    })
}

/// The value a constant opcode stands for.
pub fn const_op_value(op: u8) -> Option<f32> {
    CONST_OPS.iter().find_map(|&(o, v)| (o == op).then_some(v))
}

/// True for bytes that reference a data-segment slot in opcode or operand
/// position.
#[inline]
pub fn is_var_ref(byte: u8) -> bool {
    byte >= VAR_BIAS
}

/// True for the jump family (each followed by two hardcoded offset bytes).
#[inline]
pub fn is_jump(op: u8) -> bool {
    matches!(op, OP_JUMP | OP_JUMP_IF | OP_JUMP_IF_NOT)
}

/// True for external-call opcodes (followed by a 2-byte function id).
#[inline]
pub fn is_ext_call(op: u8) -> bool {
    matches!(op, OP_EXT | OP_EXT_PUSH)
}

/// True for base or push variants of the variadic functions, which carry a
/// size byte before their operands.
#[inline]
pub fn is_variadic(op: u8) -> bool {
    let base = op & !PUSH_VARIANT;
    matches!(base, OP_ADD | OP_MUL | OP_MIN | OP_MAX)
}

/// How many bytes immediately after opcode `op` are hardcoded operand data
/// that must never be rescanned as opcodes or variable references.
///
/// For [`OP_CDATA`] the payload length is encoded in the two bytes after
/// the marker, so the caller has to add it; `peek` supplies those two bytes.
pub fn operand_bytes_after(op: u8, peek: Option<[u8; 2]>) -> usize {
    if is_jump(op) || is_ext_call(op) || op == OP_CDATA_REF {
        2
    } else if is_variadic(op) || op == OP_CONST_LOAD {
        1
    } else if op == OP_CDATA {
        let len = peek.map_or(0, |b| u16::from_le_bytes(b) as usize);
        2 + len
    } else {
        0
    }
}

/// Byte indices inside `code` that hold hardcoded operand data.
///
/// This is the reference scan used to verify packaging safety: a correctly
/// packaged stream has variable-reference bytes only *outside* the returned
/// set.
pub fn operand_positions(code: &[u8]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < code.len() {
        let op = code[i];
        i += 1;
        if is_var_ref(op) {
            continue;
        }
        let peek = (i + 2 <= code.len()).then(|| [code[i], code[i + 1]]);
        let skip = operand_bytes_after(op, peek);
        for j in 0..skip {
            if i + j < code.len() {
                out.push(i + j);
            }
        }
        i += skip;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_variants_are_base_plus_one() {
        assert_eq!(OP_ADD | PUSH_VARIANT, OP_ADD + 1);
        assert_eq!(OP_MAX + PUSH_VARIANT, 0x5F);
        // The function bank must stay clear of the constant-opcode bank.
        assert!(OP_MAX + PUSH_VARIANT < CONST_OP_BASE);
    }

    #[test]
    fn const_op_matching_uses_epsilon() {
        assert_eq!(const_op_for(0.0, 1e-6), Some(0x60));
        assert_eq!(const_op_for(1.0 + 5e-7, 1e-6), Some(0x61));
        assert_eq!(const_op_for(1.1, 1e-6), None);
        assert_eq!(const_op_for(f32::INFINITY, 1e-6), Some(0x6E));
        assert_eq!(const_op_for(0.3333, 1e-6), None);
    }

    #[test]
    fn variadic_covers_both_variants() {
        assert!(is_variadic(OP_ADD));
        assert!(is_variadic(OP_ADD + 1));
        assert!(is_variadic(OP_MIN));
        assert!(!is_variadic(OP_SUB));
        assert!(!is_variadic(OP_NEG + 1));
    }

    #[test]
    fn operand_scan_skips_jump_offsets() {
        // jump 0x0185; mov a b
        let code = [OP_JUMP, 0x85, 0x01, OP_MOV, 0x80, 0x81];
        assert_eq!(operand_positions(&code), vec![1, 2]);
    }

    #[test]
    fn operand_scan_skips_cdata_payload() {
        let code = [OP_END, OP_CDATA, 0x03, 0x00, 0xFF, 0x80, 0x01];
        assert_eq!(operand_positions(&code), vec![2, 3, 4, 5, 6]);
    }
}
