//! Subsystem flattening and sheet-label resolution.
//!
//! Walks a validated [`Model`] top-down, recursively inlining every
//! subsystem's interior blocks into one flat sheet: blocks are renamed with
//! their owning subsystem's name as a prefix, exterior wires are rewritten
//! to terminate at (or originate from) the renamed interior `input_port`/
//! `output_port` blocks, and matched `sheet_label_sink`/`sheet_label_source`
//! pairs within the same scope collapse into a direct wire. Sibling
//! subsystems never share sheet-label scope.
//!
//! The result feeds the simulator and the code emitter, neither of which
//! needs to reason about hierarchy once flattening has run.

#![warn(missing_docs)]

pub mod context;

use std::collections::HashMap;

use obliq_common::{Ident, InternalError, Interner, XResult};
use obliq_ir::{
    Arena, Block, BlockId, BlockKind, Model, PortAddr, Sheet, SheetId, SheetLabelParams, Wire,
};

pub use context::{EnableGate, FlattenContext};

/// A flattened model plus the enable-gate chain recorded for each block.
pub struct FlattenedModel {
    /// The single-sheet model, ready for the simulator and code emitter.
    pub model: Model,
    /// For every inlined block owned (directly or transitively) by an
    /// enable-checked subsystem, the chain of gates from outermost to
    /// innermost ancestor. Blocks with no enable-checked ancestor are absent.
    pub enable_chains: HashMap<BlockId, Vec<EnableGate>>,
}

/// Flattens `model` into a single executable sheet.
///
/// `interner` must be the same interner used to build `model`'s `Ident`s:
/// flatten needs it both to read existing names, for prefixing, and to
/// intern the freshly composed `prefix_name` identifiers it produces.
///
/// Returns `Err` only for a malformed model invariant that `obliq_validate`
/// should already have ruled out (a dangling sheet or block reference, or a
/// sheet claimed by two different subsystem scopes) — never for anything a
/// well-formed model can legitimately contain.
pub fn flatten(model: &Model, interner: &Interner) -> XResult<FlattenedModel> {
    let mut ctx = FlattenContext::new();
    flatten_scope(&mut ctx, model, &[model.main_sheet], "", &[], interner)?;

    let main = model.main();
    let flat_sheet = Sheet {
        id: SheetId::from_raw(0),
        name: main.name,
        blocks: ctx.blocks,
        wires: ctx.wires,
        extents: main.extents,
    };
    let mut sheets = Arena::new();
    let main_sheet = sheets.alloc(flat_sheet);

    Ok(FlattenedModel {
        model: Model {
            version: model.version.clone(),
            name: model.name,
            sheets,
            main_sheet,
            global_settings: model.global_settings,
        },
        enable_chains: ctx.enable_chains,
    })
}

/// Inlines one subsystem scope (the sibling set of sheets owned together by
/// one subsystem, or the top-level model when `sheet_ids == [main_sheet]`).
fn flatten_scope(
    ctx: &mut FlattenContext,
    model: &Model,
    sheet_ids: &[SheetId],
    prefix: &str,
    enable_chain: &[EnableGate],
    interner: &Interner,
) -> XResult<()> {
    for &sid in sheet_ids {
        if !ctx.enter_sheet(sid) {
            return Err(InternalError::new(format!(
                "sheet {:?} is reachable from more than one subsystem scope",
                sid
            )));
        }
    }

    // Pass 1: inline every ordinary (non-subsystem) block in this scope, so
    // that pass 2's subsystem recursion and pass 3's wire rewriting can both
    // resolve any port in the scope by simple lookup.
    for &sid in sheet_ids {
        let sheet = sheet_of(model, sid)?;
        for (bid, block) in sheet.blocks.iter() {
            if matches!(block.kind, BlockKind::Subsystem(_)) {
                continue;
            }
            let renamed = Block {
                id: block.id,
                kind: block.kind.clone(),
                name: composed_name(interner, prefix, block.name),
                position: block.position,
                span: block.span,
            };
            let final_id = ctx.inline_block((sid, bid), renamed, enable_chain.to_vec());
            ctx.blocks.get_mut(final_id).id = final_id;
        }
    }

    // Pass 2: recurse into every subsystem owned by this scope. A
    // subsystem's own enable gate, if any, is resolved from the wire
    // feeding its enable port within the current scope — which pass 1
    // guarantees is already inlined, unless that wire is itself driven by
    // a sibling subsystem's output in this same scope (not supported; see
    // `resolve_port`'s doc comment).
    for &sid in sheet_ids {
        let sheet = sheet_of(model, sid)?;
        for (bid, block) in sheet.blocks.iter() {
            let BlockKind::Subsystem(params) = &block.kind else {
                continue;
            };
            let sub_prefix = format!("{prefix}{}_", interner.resolve(block.name));
            let mut child_chain = enable_chain.to_vec();
            if params.show_enable_input {
                let enable_port = PortAddr::enable(bid);
                if let Some(wire) = sheet.wires_into(enable_port).next() {
                    let condition = resolve_port(ctx, model, sid, wire.source_port)?;
                    child_chain.push(EnableGate {
                        subsystem_name: block.name,
                        condition,
                    });
                }
            }
            flatten_scope(ctx, model, &params.sheets, &sub_prefix, &child_chain, interner)?;
        }
    }

    // Pass 3: rewrite every wire in this scope's own sheets. Wires whose
    // target is a subsystem's enable port were already consumed in pass 2
    // and are dropped here, not re-emitted.
    for &sid in sheet_ids {
        let sheet = sheet_of(model, sid)?;
        for wire in &sheet.wires {
            let Some(target) = resolve_endpoint_target(ctx, model, sid, wire.target_port)? else {
                continue;
            };
            let source = resolve_port(ctx, model, sid, wire.source_port)?;
            ctx.wires.push(Wire {
                id: ctx.alloc_wire_id(),
                source_port: source,
                target_port: target,
            });
        }
    }

    for _ in sheet_ids {
        ctx.exit_sheet();
    }

    resolve_sheet_labels(ctx, sheet_ids);

    Ok(())
}

fn sheet_of(model: &Model, id: SheetId) -> XResult<&Sheet> {
    model
        .sheet(id)
        .ok_or_else(|| InternalError::new(format!("flattening reached dangling sheet id {:?}", id)))
}

fn composed_name(interner: &Interner, prefix: &str, local: Ident) -> Ident {
    if prefix.is_empty() {
        return local;
    }
    interner.get_or_intern(&format!("{prefix}{}", interner.resolve(local)))
}

/// Resolves a wire endpoint that reads a value (a wire's source, or the
/// source feeding a subsystem's enable input) to its final port.
///
/// If `port.block` names a `Subsystem` in the current sheet, this is a read
/// of one of its declared outputs: the matching interior `output_port`
/// block (by name, searched across every sheet the subsystem owns) stands
/// in for it. Looking this up requires that subsystem to already have been
/// recursed into — true for every subsystem except one whose own enable
/// condition is driven by a *sibling* subsystem's output within the same
/// scope, which is not supported (flagged as a known limitation rather than
/// silently producing a wrong graph).
fn resolve_port(ctx: &FlattenContext, model: &Model, sid: SheetId, port: PortAddr) -> XResult<PortAddr> {
    let sheet = sheet_of(model, sid)?;
    let block = sheet.block(port.block).ok_or_else(|| {
        InternalError::new(format!("wire references dangling block {:?}", port.block))
    })?;
    match &block.kind {
        BlockKind::Subsystem(params) => {
            let name = *params.output_ports.get(port.index as usize).ok_or_else(|| {
                InternalError::new("wire reads an out-of-range subsystem output port")
            })?;
            let (osid, obid) = find_port_block(model, &params.sheets, name, false).ok_or_else(|| {
                InternalError::new("subsystem declares an output port with no matching output_port block")
            })?;
            let final_id = ctx.final_block((osid, obid)).ok_or_else(|| {
                InternalError::new(
                    "subsystem output read before its scope was flattened (sibling-subsystem enable dependency?)",
                )
            })?;
            Ok(PortAddr::new(final_id, 0))
        }
        _ => {
            let final_id = ctx.final_block((sid, port.block)).ok_or_else(|| {
                InternalError::new(format!("block {:?} was never inlined", port.block))
            })?;
            Ok(PortAddr::new(final_id, port.index))
        }
    }
}

/// Resolves a wire endpoint that writes a value (a wire's target) to its
/// final port, or `None` if the endpoint is a subsystem's enable port
/// (consumed separately, never re-emitted as a literal wire).
fn resolve_endpoint_target(
    ctx: &FlattenContext,
    model: &Model,
    sid: SheetId,
    port: PortAddr,
) -> XResult<Option<PortAddr>> {
    let sheet = sheet_of(model, sid)?;
    let block = sheet.block(port.block).ok_or_else(|| {
        InternalError::new(format!("wire references dangling block {:?}", port.block))
    })?;
    match &block.kind {
        BlockKind::Subsystem(params) => {
            if port.index < 0 {
                return Ok(None);
            }
            let name = *params.input_ports.get(port.index as usize).ok_or_else(|| {
                InternalError::new("wire feeds an out-of-range subsystem input port")
            })?;
            let (isid, ibid) = find_port_block(model, &params.sheets, name, true).ok_or_else(|| {
                InternalError::new("subsystem declares an input port with no matching input_port block")
            })?;
            let final_id = ctx.final_block((isid, ibid)).ok_or_else(|| {
                InternalError::new("subsystem input targeted before its scope was flattened")
            })?;
            Ok(Some(PortAddr::new(final_id, 0)))
        }
        _ => {
            let final_id = ctx.final_block((sid, port.block)).ok_or_else(|| {
                InternalError::new(format!("block {:?} was never inlined", port.block))
            })?;
            Ok(Some(PortAddr::new(final_id, port.index)))
        }
    }
}

/// Finds the `input_port` (or, if `input` is false, `output_port`) block
/// declaring `name`, searching every sheet in `sheet_ids` in order.
fn find_port_block(
    model: &Model,
    sheet_ids: &[SheetId],
    name: Ident,
    input: bool,
) -> Option<(SheetId, BlockId)> {
    for &sid in sheet_ids {
        let sheet = model.sheet(sid)?;
        for (bid, block) in sheet.blocks.iter() {
            let matches = match &block.kind {
                BlockKind::InputPort(p) if input => p.port_name == name,
                BlockKind::OutputPort(p) if !input => p.port_name == name,
                _ => false,
            };
            if matches {
                return Some((sid, bid));
            }
        }
    }
    None
}

/// Resolves every matched `sheet_label_sink`/`sheet_label_source` pair whose
/// blocks both originate from a sheet in `sheet_ids` into a direct wire:
/// every wire sourced from a matching `sheet_label_source` is rewritten to
/// originate from whatever drives the matching sink instead. The sink and
/// source blocks themselves are left in the flattened graph (the arena
/// backing it is append-only) but become functionally inert — the sink
/// still records its original driver, the source no longer has any wire
/// reading from it.
fn resolve_sheet_labels(ctx: &mut FlattenContext, sheet_ids: &[SheetId]) {
    let mut driver_of: HashMap<Ident, PortAddr> = HashMap::new();
    for (bid, block) in ctx.blocks.iter() {
        let in_scope = ctx
            .origin_sheet
            .get(&bid)
            .is_some_and(|sid| sheet_ids.contains(sid));
        if !in_scope {
            continue;
        }
        if let BlockKind::SheetLabelSink(SheetLabelParams { signal_name }) = &block.kind {
            let target = PortAddr::new(bid, 0);
            if let Some(wire) = ctx.wires.iter().find(|w| w.target_port == target) {
                driver_of.insert(*signal_name, wire.source_port);
            }
        }
    }

    let mut sources: Vec<(BlockId, Ident)> = Vec::new();
    for (bid, block) in ctx.blocks.iter() {
        let in_scope = ctx
            .origin_sheet
            .get(&bid)
            .is_some_and(|sid| sheet_ids.contains(sid));
        if !in_scope {
            continue;
        }
        if let BlockKind::SheetLabelSource(SheetLabelParams { signal_name }) = &block.kind {
            sources.push((bid, *signal_name));
        }
    }

    for (source_id, name) in sources {
        let Some(&driver) = driver_of.get(&name) else {
            continue;
        };
        let source_port = PortAddr::new(source_id, 0);
        for wire in ctx.wires.iter_mut() {
            if wire.source_port == source_port {
                wire.source_port = driver;
            }
        }
    }
}
