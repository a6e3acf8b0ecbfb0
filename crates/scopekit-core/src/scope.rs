#![forbid(unsafe_code)]

//! Scope chain: the publications visible from one position in the tree.
//!
//! A [`ScopeChain`] is a persistent linked list of frames, innermost first.
//! Mounting a publisher pushes one frame and hands the extended chain to its
//! subtree; siblings and ancestors keep the shorter chain, so a lookup can
//! only ever see enclosing publications.
//!
//! # Invariants
//!
//! 1. A lookup for `T` returns the innermost frame whose key is exactly
//!    `TypeId::of::<Observable<T>>()`.
//! 2. Frames are immutable once pushed; clones share the tail.

use std::any::{Any, TypeId};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use scopekit_reactive::Observable;

use crate::node::Publisher;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

fn next_scope_id() -> u64 {
    NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Unique identity of one mounted publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

struct ScopeFrame {
    id: ScopeId,
    key: TypeId,
    type_name: &'static str,
    model: Rc<dyn Any>,
    parent: Option<Rc<ScopeFrame>>,
}

/// The publications enclosing one element, innermost first.
#[derive(Clone, Default)]
pub struct ScopeChain {
    head: Option<Rc<ScopeFrame>>,
}

impl ScopeChain {
    /// Chain seen by the subtree of `publisher`.
    pub(crate) fn push(&self, publisher: &Publisher) -> (ScopeId, Self) {
        let id = ScopeId(next_scope_id());
        let frame = ScopeFrame {
            id,
            key: publisher.key(),
            type_name: publisher.type_name(),
            model: publisher.erased_model(),
            parent: self.head.clone(),
        };
        (
            id,
            Self {
                head: Some(Rc::new(frame)),
            },
        )
    }

    /// Nearest publication of exactly `Observable<T>`.
    #[must_use]
    pub fn find<T: 'static>(&self) -> Option<(ScopeId, Observable<T>)> {
        let key = TypeId::of::<Observable<T>>();
        let frame = self.frames().find(|frame| frame.key == key)?;
        frame
            .model
            .downcast_ref::<Observable<T>>()
            .map(|model| (frame.id, model.clone()))
    }

    /// Number of enclosing publications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Published model type names, innermost first.
    #[must_use]
    pub fn type_names(&self) -> Vec<&'static str> {
        self.frames().map(|frame| frame.type_name).collect()
    }

    fn frames(&self) -> impl Iterator<Item = &ScopeFrame> {
        std::iter::successors(self.head.as_deref(), |&frame| frame.parent.as_deref())
    }
}

impl std::fmt::Debug for ScopeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}
