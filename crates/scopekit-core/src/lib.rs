#![forbid(unsafe_code)]

//! Scoped model propagation for ScopeKit.
//!
//! A [`Publisher`] makes one [`Observable<T>`] discoverable to its subtree;
//! a [`Consumer<T>`] resolves the nearest one by exact type and rebuilds
//! when it changes. [`resolve`] is the direct accessor for code that holds a
//! [`BuildContext`].
//!
//! ```
//! use scopekit_core::{Consumer, Node, Tree};
//! use scopekit_reactive::Observable;
//!
//! let clicks = Observable::new(0u32);
//! let mut tree = Tree::new();
//! tree.mount(Node::scope(
//!     clicks.clone(),
//!     Consumer::<u32>::new(|_, _, n| Node::text(format!("clicks: {}", n.get()))),
//! ))?;
//!
//! clicks.set(3);
//! tree.flush()?;
//! assert_eq!(tree.render(), vec!["clicks: 3"]);
//! # Ok::<(), scopekit_core::ScopeResolutionError>(())
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod node;
pub mod scope;
pub mod tree;

pub use config::PipelineConfig;
pub use context::{BuildContext, resolve};
pub use error::{Result, ScopeResolutionError};
pub use node::{Build, Consumer, Node, Publisher};
pub use scope::{ScopeChain, ScopeId};
pub use tree::{ElementId, FlushReport, Tree};

pub use scopekit_reactive::{Observable, Subscription};
