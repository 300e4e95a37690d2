//! Function registry.
//!
//! Maps callable names to opcode pairs (for VM builtins) or external ids
//! (for host-dispatched calls). Width and arity rules live here so the
//! analysis stage can check calls without knowing how they lower.

use ecow::EcoString;
use hashbrown::HashMap;
use lazy_static::lazy_static;

use crate::opcode::*;

/// Index into a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u16);

impl FuncId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a call lowers to bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncCode {
    /// VM builtin. `base` is the statement form; `base + PUSH_VARIANT`
    /// pushes the result.
    Op { base: u8 },
    /// Host-dispatched call via [`OP_EXT`] / [`OP_EXT_PUSH`] with a 16-bit
    /// function id.
    Ext { id: u16 },
    /// Zero-fill of the destination, lowered to [`OP_MOV_ZERO`] instead of
    /// a function opcode.
    Zero,
}

#[derive(Debug, Clone)]
pub struct FuncDesc {
    pub name: EcoString,
    pub code: FuncCode,
    pub min_args: u8,
    pub max_args: u8,
    /// Required operand width, or 0 to accept any uniform width.
    pub accepts_width: u8,
    /// Result width, or 0 to pass the operand width through.
    pub returns_width: u8,
}

impl FuncDesc {
    const fn op(name: &'static str, base: u8, min: u8, max: u8, accepts: u8, returns: u8) -> Self {
        Self {
            name: EcoString::inline(name),
            code: FuncCode::Op { base },
            min_args: min,
            max_args: max,
            accepts_width: accepts,
            returns_width: returns,
        }
    }
}

lazy_static! {
    static ref BUILTINS: Vec<FuncDesc> = vec![
        // Arithmetic. add and mul are variadic; sub/div/mod are the binary
        // leftovers the precedence repair cannot fold away.
        FuncDesc::op("add", OP_ADD, 2, 8, 0, 0),
        FuncDesc::op("sub", OP_SUB, 2, 2, 0, 0),
        FuncDesc::op("mul", OP_MUL, 2, 8, 0, 0),
        FuncDesc::op("div", OP_DIV, 2, 2, 0, 0),
        FuncDesc::op("mod", OP_MOD, 2, 2, 0, 0),
        FuncDesc::op("neg", OP_NEG, 1, 1, 0, 0),
        // Comparisons and logic collapse to a scalar truth value.
        FuncDesc::op("eq", OP_EQ, 2, 2, 0, 1),
        FuncDesc::op("ne", OP_NE, 2, 2, 0, 1),
        FuncDesc::op("lt", OP_LT, 2, 2, 0, 1),
        FuncDesc::op("le", OP_LE, 2, 2, 0, 1),
        FuncDesc::op("gt", OP_GT, 2, 2, 0, 1),
        FuncDesc::op("ge", OP_GE, 2, 2, 0, 1),
        FuncDesc::op("and", OP_AND, 2, 2, 1, 1),
        FuncDesc::op("or", OP_OR, 2, 2, 1, 1),
        FuncDesc::op("not", OP_NOT, 1, 1, 1, 1),
        // Vector construction.
        FuncDesc::op("expand2", OP_EXPAND2, 1, 1, 1, 2),
        FuncDesc::op("expand3", OP_EXPAND3, 1, 1, 1, 3),
        FuncDesc::op("expand4", OP_EXPAND4, 1, 1, 1, 4),
        FuncDesc::op("vec2", OP_VEC2, 2, 2, 1, 2),
        FuncDesc::op("vec3", OP_VEC3, 3, 3, 1, 3),
        FuncDesc::op("vec4", OP_VEC4, 4, 4, 1, 4),
        // Component reads. Range against the operand width is checked by
        // the analysis stage, not here.
        FuncDesc::op("idx0", OP_IDX0, 1, 1, 0, 1),
        FuncDesc::op("idx1", OP_IDX1, 1, 1, 0, 1),
        FuncDesc::op("idx2", OP_IDX2, 1, 1, 0, 1),
        FuncDesc::op("idx3", OP_IDX3, 1, 1, 0, 1),
        FuncDesc::op("idxv", OP_IDXV, 2, 2, 0, 1),
        // Math builtins.
        FuncDesc::op("sin", OP_SIN, 1, 1, 0, 0),
        FuncDesc::op("cos", OP_COS, 1, 1, 0, 0),
        FuncDesc::op("sqrt", OP_SQRT, 1, 1, 0, 0),
        FuncDesc::op("abs", OP_ABS, 1, 1, 0, 0),
        FuncDesc::op("min", OP_MIN, 2, 8, 0, 0),
        FuncDesc::op("max", OP_MAX, 2, 8, 0, 0),
        FuncDesc {
            name: EcoString::inline("zero"),
            code: FuncCode::Zero,
            min_args: 0,
            max_args: 0,
            accepts_width: 0,
            returns_width: 0,
        },
        // External builtins dispatched to the host.
        FuncDesc {
            name: EcoString::inline("lerp"),
            code: FuncCode::Ext { id: 0 },
            min_args: 3,
            max_args: 3,
            accepts_width: 0,
            returns_width: 0,
        },
        FuncDesc {
            name: EcoString::inline("dot"),
            code: FuncCode::Ext { id: 1 },
            min_args: 2,
            max_args: 2,
            accepts_width: 0,
            returns_width: 1,
        },
        FuncDesc {
            name: EcoString::inline("noise"),
            code: FuncCode::Ext { id: 2 },
            min_args: 1,
            max_args: 3,
            accepts_width: 1,
            returns_width: 1,
        },
    ];
}

/// Callable names known to one compilation run: the builtin table plus any
/// host-registered externals.
#[derive(Debug)]
pub struct Registry {
    funcs: Vec<FuncDesc>,
    by_name: HashMap<EcoString, FuncId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let funcs = BUILTINS.clone();
        let by_name = funcs
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), FuncId(i as u16)))
            .collect();
        Self { funcs, by_name }
    }

    /// Register a host function. Returns `None` when the name collides with
    /// an existing callable.
    pub fn register_external(
        &mut self,
        name: impl Into<EcoString>,
        id: u16,
        min_args: u8,
        max_args: u8,
        returns_width: u8,
    ) -> Option<FuncId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return None;
        }
        let fid = FuncId(self.funcs.len() as u16);
        self.funcs.push(FuncDesc {
            name: name.clone(),
            code: FuncCode::Ext { id },
            min_args,
            max_args,
            accepts_width: 0,
            returns_width,
        });
        self.by_name.insert(name, fid);
        Some(fid)
    }

    pub fn lookup(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: FuncId) -> &FuncDesc {
        &self.funcs[id.index()]
    }
}
