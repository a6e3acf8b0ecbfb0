#![forbid(unsafe_code)]

//! ScopeKit public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use scopekit_core::{
    Build, BuildContext, Consumer, ElementId, FlushReport, Node, PipelineConfig, Publisher,
    ScopeResolutionError, Tree, resolve,
};
pub use scopekit_reactive::{Observable, Subscription};

pub mod prelude {
    pub use scopekit_core as core;
    pub use scopekit_reactive as reactive;

    pub use scopekit_core::{BuildContext, Consumer, Node, Publisher, Tree, resolve};
    pub use scopekit_reactive::Observable;
}
