#![forbid(unsafe_code)]

//! Build contexts and the lookup accessor.
//!
//! Reading a model and registering interest in it are separate operations:
//!
//! - [`BuildContext::read`] resolves the nearest publication with no side
//!   effects (event handlers, one-shot reads).
//! - [`BuildContext::subscribe`] resolves and attaches a caller-owned
//!   callback.
//! - [`BuildContext::depend_on`] resolves and registers the region being
//!   built, so the next change to that one publication marks it dirty.
//!
//! [`resolve`] composes them behind a `rebuild_on_change` flag.

use std::any::type_name;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use scopekit_reactive::{Observable, Subscription};
use tracing::{debug, warn};

use crate::error::{Result, ScopeResolutionError};
use crate::scope::{ScopeChain, ScopeId};
use crate::tree::{DirtyQueue, ElementId};

/// Subscriptions held by one render region, keyed by publication.
///
/// Cleared before every rebuild and dropped with the region, so a region
/// never holds more than one subscription per publication.
#[derive(Debug, Default)]
pub(crate) struct Dependencies {
    subscriptions: AHashMap<ScopeId, Subscription>,
}

impl Dependencies {
    pub(crate) fn clear(&mut self) {
        self.subscriptions.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.subscriptions.len()
    }
}

/// The region under construction, when the context belongs to a build.
pub(crate) struct RegionHandle {
    pub(crate) deps: Rc<RefCell<Dependencies>>,
    pub(crate) queue: Weak<RefCell<DirtyQueue>>,
}

/// Position in the mounted tree, handed to every build.
///
/// Contexts obtained from [`Tree::context`](crate::Tree::context) are
/// detached: they can read models but have no region to rebuild.
pub struct BuildContext {
    element: ElementId,
    depth: usize,
    scope: ScopeChain,
    region: Option<RegionHandle>,
}

impl BuildContext {
    pub(crate) fn for_region(
        element: ElementId,
        depth: usize,
        scope: ScopeChain,
        region: RegionHandle,
    ) -> Self {
        Self {
            element,
            depth,
            scope,
            region: Some(region),
        }
    }

    pub(crate) fn detached(element: ElementId, depth: usize, scope: ScopeChain) -> Self {
        Self {
            element,
            depth,
            scope,
            region: None,
        }
    }

    /// Element this context is positioned at.
    #[must_use]
    pub fn element(&self) -> ElementId {
        self.element
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether [`depend_on`](Self::depend_on) can schedule rebuilds.
    #[must_use]
    pub fn is_region(&self) -> bool {
        self.region.is_some()
    }

    /// Publications visible from here, innermost first.
    #[must_use]
    pub fn scope(&self) -> &ScopeChain {
        &self.scope
    }

    /// Nearest enclosing model of type `T`, without subscribing.
    pub fn read<T: 'static>(&self) -> Result<Observable<T>> {
        self.lookup::<T>().map(|(_, model)| model)
    }

    /// Nearest enclosing model of type `T`, with `callback` attached.
    ///
    /// The caller owns the returned guard; dropping it detaches the callback.
    pub fn subscribe<T: 'static>(
        &self,
        callback: impl Fn(&T) + 'static,
    ) -> Result<Subscription> {
        let (_, model) = self.lookup::<T>()?;
        Ok(model.subscribe(callback))
    }

    /// Nearest enclosing model of type `T`; changes to it rebuild the
    /// current region.
    ///
    /// Repeated calls within one build register a single subscription.
    /// On a detached context this is a plain [`read`](Self::read).
    pub fn depend_on<T: 'static>(&self) -> Result<Observable<T>> {
        let (scope_id, model) = self.lookup::<T>()?;
        let Some(region) = &self.region else {
            debug!(
                element = self.element.get(),
                model = type_name::<T>(),
                "depend_on outside a render region; reading only"
            );
            return Ok(model);
        };

        let mut deps = region.deps.borrow_mut();
        if !deps.subscriptions.contains_key(&scope_id) {
            let queue = region.queue.clone();
            let element = self.element;
            let depth = self.depth;
            let subscription = model.subscribe(move |_| {
                if let Some(queue) = queue.upgrade() {
                    queue.borrow_mut().mark(depth, element);
                }
            });
            deps.subscriptions.insert(scope_id, subscription);
            debug!(
                element = element.get(),
                scope = scope_id.get(),
                model = type_name::<T>(),
                "region subscribed"
            );
        }
        Ok(model)
    }

    fn lookup<T: 'static>(&self) -> Result<(ScopeId, Observable<T>)> {
        self.scope.find::<T>().ok_or_else(|| {
            warn!(
                element = self.element.get(),
                requested = type_name::<T>(),
                visible = ?self.scope.type_names(),
                "scope resolution failed"
            );
            ScopeResolutionError
        })
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("element", &self.element)
            .field("depth", &self.depth)
            .field("scope", &self.scope)
            .field("region", &self.region.is_some())
            .finish()
    }
}

/// Nearest enclosing model of type `T`.
///
/// With `rebuild_on_change` the current region is rebuilt on that model's
/// next change ([`BuildContext::depend_on`]); without it the lookup has no
/// side effects ([`BuildContext::read`]). Matching is by exact type.
pub fn resolve<T: 'static>(ctx: &BuildContext, rebuild_on_change: bool) -> Result<Observable<T>> {
    if rebuild_on_change {
        ctx.depend_on::<T>()
    } else {
        ctx.read::<T>()
    }
}
