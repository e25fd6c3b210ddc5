//! All built-in validation rule implementations.
//!
//! This module re-exports all individual rule types and provides
//! `register_builtin_rules` to add every structural, type, and sheet-label
//! check to a [`crate::ValidationEngine`].

mod l301;
mod l302;
mod l303;
mod s101;
mod s102;
mod s103;
mod s104;
mod s105;
mod s106;
mod s107;
mod t201;
mod t202;
mod t203;
mod t204;

pub use l301::DuplicateSheetLabelSink;
pub use l302::SheetLabelUnmatched;
pub use l303::EmptySheetLabelName;
pub use s101::SelfConnection;
pub use s102::PortAlreadyConnected;
pub use s103::DuplicateConnection;
pub use s104::UnknownBlockType;
pub use s105::PortIndexOutOfRange;
pub use s106::MissingSheet;
pub use s107::UnknownSubsystemPort;
pub use t201::TypeMismatch;
pub use t202::DimensionMismatch;
pub use t203::ScalarRequired;
pub use t204::BoolRequired;

use crate::ValidationEngine;

/// Registers every built-in rule (S101-S107, T201-T204, L301-L303) with `engine`.
pub fn register_builtin_rules(engine: &mut ValidationEngine) {
    engine.register(Box::new(SelfConnection));
    engine.register(Box::new(PortAlreadyConnected));
    engine.register(Box::new(DuplicateConnection));
    engine.register(Box::new(UnknownBlockType));
    engine.register(Box::new(PortIndexOutOfRange));
    engine.register(Box::new(MissingSheet));
    engine.register(Box::new(UnknownSubsystemPort));
    engine.register(Box::new(TypeMismatch));
    engine.register(Box::new(DimensionMismatch));
    engine.register(Box::new(ScalarRequired));
    engine.register(Box::new(BoolRequired));
    engine.register(Box::new(DuplicateSheetLabelSink));
    engine.register(Box::new(SheetLabelUnmatched));
    engine.register(Box::new(EmptySheetLabelName));
}
