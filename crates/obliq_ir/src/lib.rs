//! The model IR — the in-memory representation shared by the validator,
//! flattener, simulator, and code emitter.
//!
//! This crate defines the core types ([`Model`], [`Sheet`], [`Block`],
//! [`Wire`]) and the declarative block-kind [`registry`] that the rest of the
//! pipeline walks and transforms after the external wire format has been
//! parsed into it.

#![warn(missing_docs)]

pub mod arena;
pub mod ids;
pub mod model;
pub mod registry;
pub mod types;

pub use arena::{Arena, ArenaId};
pub use ids::{BlockId, SheetId, WireId};
pub use model::{
    Block, BlockKind, BufferPolicy, Comparator, ConditionParams, DemuxParams, EvaluateParams,
    Extents, Extrapolation, GlobalSettings, Lookup1dParams, Lookup2dParams, Model,
    MultiplyParams, MuxParams, PortAddr, PortBlockParams, Position, RecorderParams, ScaleParams,
    Sheet, SheetLabelParams, SourceParams, SourceVariant, SubsystemParams, SumParams, TrigOp,
    TrigParams, Wire,
};
pub use registry::{port_counts, BlockDescriptor, PortCounts};
pub use types::{BaseType, ParseTypeError, SignalType};
