//! Mutable flattening state for recursive subsystem inlining.
//!
//! [`FlattenContext`] holds the flattened [`Model`] under construction, a
//! global map from every original `(SheetId, BlockId)` pair to the final
//! block it was inlined as, the enable-gate chain recorded per final block,
//! and the current subsystem stack for cycle detection.

use std::collections::HashMap;

use obliq_common::Ident;
use obliq_ir::{Arena, Block, BlockId, PortAddr, SheetId, Wire, WireId};

/// One ancestor subsystem's enable condition, gating every block inlined
/// from inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnableGate {
    /// The subsystem's own (unprefixed) name, for diagnostics and codegen.
    pub subsystem_name: Ident,
    /// The final, already-flattened port driving the subsystem's enable input.
    pub condition: PortAddr,
}

/// Mutable state threaded through recursive scope flattening.
///
/// Mirrors the shape of an elaboration context: a single output structure
/// under construction, a cache keyed on identity rather than parameters (an
/// original block is inlined exactly once), and a stack used to detect
/// violations of the sheet-ownership tree invariant.
pub struct FlattenContext {
    /// Every block that survives in the flattened graph, freshly renamed.
    pub blocks: Arena<BlockId, Block>,
    /// Every wire in the flattened graph, with endpoints already remapped.
    pub wires: Vec<Wire>,
    /// The sheet a final block was inlined from, used to restrict
    /// sheet-label resolution to one scope at a time.
    pub origin_sheet: HashMap<BlockId, SheetId>,
    /// Enable-gate chain recorded per final block, outermost ancestor first.
    pub enable_chains: HashMap<BlockId, Vec<EnableGate>>,
    /// Maps an original `(SheetId, BlockId)` to the block it was inlined as.
    final_of: HashMap<(SheetId, BlockId), BlockId>,
    /// Sheets currently being inlined, for cycle detection against a
    /// malformed subsystem-ownership tree.
    visiting: Vec<SheetId>,
    /// Next fresh wire ID, since wires from many original sheets are merged
    /// into one flat list.
    next_wire_id: u32,
}

impl FlattenContext {
    /// Creates an empty flattening context.
    pub fn new() -> Self {
        Self {
            blocks: Arena::new(),
            wires: Vec::new(),
            origin_sheet: HashMap::new(),
            enable_chains: HashMap::new(),
            final_of: HashMap::new(),
            visiting: Vec::new(),
            next_wire_id: 0,
        }
    }

    /// Allocates a fresh [`WireId`], unique across the whole flattened graph.
    pub fn alloc_wire_id(&mut self) -> WireId {
        let id = WireId::from_raw(self.next_wire_id);
        self.next_wire_id += 1;
        id
    }

    /// Allocates `block` into the flattened graph, recording where it came
    /// from and which enable gates apply to it.
    pub fn inline_block(
        &mut self,
        origin: (SheetId, BlockId),
        block: Block,
        gates: Vec<EnableGate>,
    ) -> BlockId {
        let sheet = origin.0;
        let id = self.blocks.alloc(block);
        self.origin_sheet.insert(id, sheet);
        self.final_of.insert(origin, id);
        if !gates.is_empty() {
            self.enable_chains.insert(id, gates);
        }
        id
    }

    /// Looks up the final block a `(SheetId, BlockId)` pair was inlined as.
    pub fn final_block(&self, origin: (SheetId, BlockId)) -> Option<BlockId> {
        self.final_of.get(&origin).copied()
    }

    /// Pushes a sheet onto the in-progress-inlining stack.
    ///
    /// Returns `false` if the sheet is already being inlined higher up the
    /// stack — a cycle in the subsystem-ownership tree, which a well-formed
    /// model can never produce (every sheet belongs to exactly one
    /// subsystem, or to none). This is a defensive guard, not a user-facing
    /// diagnostic.
    pub fn enter_sheet(&mut self, sheet: SheetId) -> bool {
        if self.visiting.contains(&sheet) {
            return false;
        }
        self.visiting.push(sheet);
        true
    }

    /// Pops the most recently entered sheet.
    pub fn exit_sheet(&mut self) {
        self.visiting.pop();
    }
}

impl Default for FlattenContext {
    fn default() -> Self {
        Self::new()
    }
}
