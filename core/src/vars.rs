//! Variable table.
//!
//! Every named script variable, every i/o binding and every materialized
//! constant lives here. Ids are dense indices; after the cleanup stage they
//! double as data-segment slot numbers (one slot per component, so a vec3
//! occupies three consecutive slots). The table is lock-guarded so the
//! analysis stage can fan out over statements.

use ecow::EcoString;
use hashbrown::HashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

/// Index into the variable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u16);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a variable's payload is laid out in the data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataKind {
    /// Scalar or vector of f32 components, one slot each.
    #[default]
    Number,
    /// Cdata blob, bytes packed little-endian four to a slot.
    BlobU8,
    BlobI8,
    BlobI16,
    BlobF32,
    /// Cdata blob emitted verbatim after the end marker instead of
    /// occupying data slots.
    BlobRaw,
}

impl DataKind {
    /// Bytes per element when packed into the data segment.
    pub fn element_bytes(self) -> usize {
        match self {
            DataKind::BlobU8 | DataKind::BlobI8 | DataKind::BlobRaw => 1,
            DataKind::BlobI16 => 2,
            DataKind::Number | DataKind::BlobF32 => 4,
        }
    }

    /// Nibble stored in the meta segment alongside the width.
    pub fn meta_tag(self) -> u8 {
        match self {
            DataKind::Number => 0,
            DataKind::BlobU8 => 1,
            DataKind::BlobI8 => 2,
            DataKind::BlobI16 => 3,
            DataKind::BlobF32 => 4,
            DataKind::BlobRaw => 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: EcoString,
    /// Component count, 0 until width inference fixes it.
    pub width: u8,
    pub kind: DataKind,
    /// Constants are compiler-materialized and eligible for sweeping;
    /// everything else was declared by the script.
    pub is_constant: bool,
    pub is_input: bool,
    pub is_output: bool,
    pub ref_count: i32,
    /// Constant value or i/o defaults, applied by the packager.
    pub values: SmallVec<[f32; 4]>,
    /// Cdata payload, already packed per `kind`.
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    vars: Vec<Variable>,
    by_name: HashMap<EcoString, VarId>,
}

/// Shared, lock-guarded variable table.
#[derive(Debug, Default)]
pub struct VariableTable {
    inner: Mutex<Inner>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh named variable. Declaration counts as the first
    /// reference. Returns `None` when the name is already taken.
    pub fn create(
        &self,
        name: impl Into<EcoString>,
        width: u8,
        is_input: bool,
        is_output: bool,
    ) -> Option<VarId> {
        let name = name.into();
        let mut inner = self.inner.lock();
        if inner.by_name.contains_key(&name) {
            return None;
        }
        let id = VarId(inner.vars.len() as u16);
        inner.vars.push(Variable {
            name: name.clone(),
            width,
            kind: DataKind::Number,
            is_constant: false,
            is_input,
            is_output,
            ref_count: 1,
            values: SmallVec::new(),
            payload: Vec::new(),
        });
        inner.by_name.insert(name, id);
        Some(id)
    }

    /// Materialize an anonymous constant. Starts at ref count zero; callers
    /// retain it per use, so an unused constant sweeps away in cleanup.
    pub fn create_constant(&self, value: f32) -> VarId {
        let mut inner = self.inner.lock();
        let id = VarId(inner.vars.len() as u16);
        let name = ecow::eco_format!("$c{}", id.0);
        inner.vars.push(Variable {
            name,
            width: 1,
            kind: DataKind::Number,
            is_constant: true,
            is_input: false,
            is_output: false,
            ref_count: 0,
            values: SmallVec::from_slice(&[value]),
            payload: Vec::new(),
        });
        id
    }

    /// Create a cdata blob variable with an already-packed payload. Raw
    /// blobs live in the code segment; the packager decides from `kind`.
    pub fn create_blob(
        &self,
        name: impl Into<EcoString>,
        kind: DataKind,
        payload: Vec<u8>,
    ) -> Option<VarId> {
        let name = name.into();
        let mut inner = self.inner.lock();
        if inner.by_name.contains_key(&name) {
            return None;
        }
        let id = VarId(inner.vars.len() as u16);
        inner.vars.push(Variable {
            name: name.clone(),
            width: 1,
            kind,
            is_constant: true,
            is_input: false,
            is_output: false,
            ref_count: 0,
            values: SmallVec::new(),
            payload,
        });
        inner.by_name.insert(name, id);
        Some(id)
    }

    pub fn lookup(&self, name: &str) -> Option<VarId> {
        self.inner.lock().by_name.get(name).copied()
    }

    /// Look up an existing variable or create a width-0 one. Either way the
    /// caller holds a new reference. The bool is true when the variable was
    /// created by this call.
    pub fn get_or_create(&self, name: impl Into<EcoString>) -> (VarId, bool) {
        let name = name.into();
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.by_name.get(&name) {
            inner.vars[id.index()].ref_count += 1;
            return (id, false);
        }
        let id = VarId(inner.vars.len() as u16);
        inner.vars.push(Variable {
            name: name.clone(),
            width: 0,
            kind: DataKind::Number,
            is_constant: false,
            is_input: false,
            is_output: false,
            ref_count: 1,
            values: SmallVec::new(),
            payload: Vec::new(),
        });
        inner.by_name.insert(name, id);
        (id, true)
    }

    /// Reuse an existing constant slot within `epsilon`, creating one
    /// otherwise. Always retains the result.
    pub fn find_or_create_constant(&self, value: f32, epsilon: f32) -> VarId {
        let mut inner = self.inner.lock();
        let found = inner.vars.iter().position(|v| {
            v.is_constant
                && v.kind == DataKind::Number
                && v.values.len() == 1
                && (v.values[0] - value).abs() <= epsilon
        });
        let id = match found {
            Some(i) => VarId(i as u16),
            None => {
                let id = VarId(inner.vars.len() as u16);
                let name = ecow::eco_format!("$c{}", id.0);
                inner.vars.push(Variable {
                    name,
                    width: 1,
                    kind: DataKind::Number,
                    is_constant: true,
                    is_input: false,
                    is_output: false,
                    ref_count: 0,
                    values: SmallVec::from_slice(&[value]),
                    payload: Vec::new(),
                });
                id
            }
        };
        inner.vars[id.index()].ref_count += 1;
        id
    }

    pub fn retain(&self, id: VarId) {
        self.inner.lock().vars[id.index()].ref_count += 1;
    }

    pub fn release(&self, id: VarId) {
        self.inner.lock().vars[id.index()].ref_count -= 1;
    }

    pub fn ref_count(&self, id: VarId) -> i32 {
        self.inner.lock().vars[id.index()].ref_count
    }

    pub fn width(&self, id: VarId) -> u8 {
        self.inner.lock().vars[id.index()].width
    }

    /// First write to a width-0 variable fixes its width.
    pub fn set_width(&self, id: VarId, width: u8) {
        self.inner.lock().vars[id.index()].width = width;
    }

    pub fn set_values(&self, id: VarId, values: SmallVec<[f32; 4]>) {
        self.inner.lock().vars[id.index()].values = values;
    }

    pub fn get(&self, id: VarId) -> Variable {
        self.inner.lock().vars[id.index()].clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().vars.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Variable> {
        self.inner.lock().vars.clone()
    }

    /// Drop dead constants and renumber so script variables come before
    /// compiler constants. Returns the old-id to new-id map; `None` marks a
    /// swept entry. Callers must rewrite every stored [`VarId`] with it.
    pub fn sweep(&self) -> Vec<Option<VarId>> {
        let mut inner = self.inner.lock();
        let old = core::mem::take(&mut inner.vars);
        let mut remap = vec![None; old.len()];
        let mut kept: Vec<(usize, Variable)> = Vec::with_capacity(old.len());
        for (i, var) in old.into_iter().enumerate() {
            if var.is_constant && var.ref_count <= 0 {
                continue;
            }
            kept.push((i, var));
        }
        // Stable partition: declared variables first, constants after, both
        // in original order.
        kept.sort_by_key(|(_, v)| v.is_constant);
        inner.by_name.clear();
        for (new_idx, (old_idx, var)) in kept.into_iter().enumerate() {
            let id = VarId(new_idx as u16);
            remap[old_idx] = Some(id);
            inner.by_name.insert(var.name.clone(), id);
            inner.vars.push(var);
        }
        remap
    }
}
