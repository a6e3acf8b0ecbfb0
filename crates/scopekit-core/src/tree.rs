#![forbid(unsafe_code)]

//! Element tree and rebuild pipeline.
//!
//! # Design
//!
//! [`Tree::mount`] inflates a [`Node`] into elements. Publishers push a
//! frame onto the scope chain handed to their subtree; regions run their
//! [`Build`](crate::Build) with a [`BuildContext`] and inflate the result
//! as their children.
//!
//! Model changes never rebuild anything directly. A region's subscription
//! callback only marks it in the dirty queue; [`Tree::flush`] later rebuilds
//! dirty regions parents first, so several changes before a flush coalesce
//! into one rebuild and a region replaced by its ancestor's rebuild is
//! dropped from the queue instead of being built twice.
//!
//! # Invariants
//!
//! 1. A region's previous subscriptions are dropped before its builder runs.
//! 2. Removing an element drops every subscription held in its subtree.
//! 3. A failed mount or rebuild leaves no partially built subtree behind.
//! 4. At most `max_rebuilds_per_flush` regions are rebuilt per flush.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::{debug, debug_span, warn};

use crate::config::PipelineConfig;
use crate::context::{BuildContext, Dependencies, RegionHandle};
use crate::error::Result;
use crate::node::{Build, Node};
use crate::scope::ScopeChain;

/// Handle to a mounted element. Ids are never reused within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Regions awaiting rebuild, ordered shallowest first.
#[derive(Debug, Default)]
pub(crate) struct DirtyQueue {
    entries: BTreeSet<(usize, ElementId)>,
}

impl DirtyQueue {
    pub(crate) fn mark(&mut self, depth: usize, element: ElementId) {
        self.entries.insert((depth, element));
    }

    fn pop(&mut self) -> Option<(usize, ElementId)> {
        self.entries.pop_first()
    }

    fn remove(&mut self, depth: usize, element: ElementId) {
        self.entries.remove(&(depth, element));
    }

    pub(crate) fn contains(&self, element: ElementId) -> bool {
        self.entries.iter().any(|(_, id)| *id == element)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

enum ElementKind {
    Empty,
    Text(String),
    Column,
    Scope,
    Region {
        build: Rc<dyn Build>,
        deps: Rc<RefCell<Dependencies>>,
        builds: u64,
    },
}

struct Element {
    parent: Option<ElementId>,
    depth: usize,
    scope: ScopeChain,
    kind: ElementKind,
    children: Vec<ElementId>,
}

/// Outcome of one [`Tree::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Regions whose builder ran.
    pub rebuilt: usize,
    /// Regions still dirty after the flush (rebuild bound reached).
    pub pending: usize,
}

/// A mounted element tree.
pub struct Tree {
    config: PipelineConfig,
    elements: AHashMap<ElementId, Element>,
    root: Option<ElementId>,
    next_id: u64,
    queue: Rc<RefCell<DirtyQueue>>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    #[must_use]
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            elements: AHashMap::new(),
            root: None,
            next_id: 0,
            queue: Rc::new(RefCell::new(DirtyQueue::default())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ── Mounting ─────────────────────────────────────────────────────

    /// Replace the mounted tree with `node`.
    ///
    /// The previous tree is torn down first. If any region fails to
    /// resolve its model the partial tree is removed and the error returned.
    pub fn mount(&mut self, node: impl Into<Node>) -> Result<ElementId> {
        self.unmount();
        match self.inflate(node.into(), None, 0, ScopeChain::default()) {
            Ok(root) => {
                debug!(root = root.get(), elements = self.elements.len(), "tree mounted");
                Ok(root)
            }
            Err(err) => {
                self.unmount();
                Err(err)
            }
        }
    }

    /// Tear down every element, releasing all subscriptions.
    pub fn unmount(&mut self) {
        if let Some(root) = self.root.take() {
            self.remove_subtree(root);
        }
    }

    fn inflate(
        &mut self,
        node: Node,
        parent: Option<ElementId>,
        depth: usize,
        scope: ScopeChain,
    ) -> Result<ElementId> {
        match node {
            Node::Empty => Ok(self.insert(parent, depth, scope, ElementKind::Empty)),
            Node::Text(text) => Ok(self.insert(parent, depth, scope, ElementKind::Text(text))),
            Node::Column(children) => {
                let id = self.insert(parent, depth, scope.clone(), ElementKind::Column);
                for child in children {
                    self.inflate(child, Some(id), depth + 1, scope.clone())?;
                }
                Ok(id)
            }
            Node::Scope(publisher) => {
                let (scope_id, inner) = scope.push(&publisher);
                let id = self.insert(parent, depth, scope, ElementKind::Scope);
                debug!(
                    element = id.get(),
                    scope = scope_id.get(),
                    model = publisher.type_name(),
                    "publication mounted"
                );
                self.inflate(publisher.into_child(), Some(id), depth + 1, inner)?;
                Ok(id)
            }
            Node::Region(build) => {
                let kind = ElementKind::Region {
                    build,
                    deps: Rc::new(RefCell::new(Dependencies::default())),
                    builds: 0,
                };
                let id = self.insert(parent, depth, scope, kind);
                self.build_region(id)?;
                Ok(id)
            }
        }
    }

    fn insert(
        &mut self,
        parent: Option<ElementId>,
        depth: usize,
        scope: ScopeChain,
        kind: ElementKind,
    ) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(
            id,
            Element {
                parent,
                depth,
                scope,
                kind,
                children: Vec::new(),
            },
        );
        match parent {
            Some(parent) => {
                if let Some(parent) = self.elements.get_mut(&parent) {
                    parent.children.push(id);
                }
            }
            None => self.root = Some(id),
        }
        id
    }

    /// Run a region's builder and inflate its output as the region's
    /// children. Stale children and subscriptions go first.
    fn build_region(&mut self, id: ElementId) -> Result<()> {
        let Some(element) = self.elements.get(&id) else {
            return Ok(());
        };
        let ElementKind::Region { build, deps, .. } = &element.kind else {
            return Ok(());
        };
        let build = Rc::clone(build);
        let deps = Rc::clone(deps);
        let depth = element.depth;
        let scope = element.scope.clone();

        self.remove_children(id);
        deps.borrow_mut().clear();

        let builds = self.bump_builds(id);
        let span = debug_span!(
            "scope.region.build",
            element = id.get(),
            depth,
            label = build.label(),
            build = builds
        );
        let _guard = span.enter();

        let ctx = BuildContext::for_region(
            id,
            depth,
            scope.clone(),
            RegionHandle {
                deps,
                queue: Rc::downgrade(&self.queue),
            },
        );
        let child = build.build(&ctx)?;
        drop(ctx);

        self.inflate(child, Some(id), depth + 1, scope)?;
        Ok(())
    }

    fn bump_builds(&mut self, id: ElementId) -> u64 {
        match self.elements.get_mut(&id).map(|e| &mut e.kind) {
            Some(ElementKind::Region { builds, .. }) => {
                *builds += 1;
                *builds
            }
            _ => 0,
        }
    }

    // ── Removal ──────────────────────────────────────────────────────

    fn remove_children(&mut self, id: ElementId) {
        let children = match self.elements.get_mut(&id) {
            Some(element) => std::mem::take(&mut element.children),
            None => return,
        };
        for child in children {
            self.remove_detached(child);
        }
    }

    fn remove_subtree(&mut self, id: ElementId) {
        let parent = self.elements.get(&id).and_then(|e| e.parent);
        if let Some(parent) = parent.and_then(|p| self.elements.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        self.remove_detached(id);
    }

    /// Remove `id` and its descendants without touching its parent's list.
    fn remove_detached(&mut self, id: ElementId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(element) = self.elements.remove(&next) else {
                continue;
            };
            if let ElementKind::Region { deps, .. } = &element.kind {
                deps.borrow_mut().clear();
                self.queue.borrow_mut().remove(element.depth, next);
            }
            stack.extend(element.children);
        }
    }

    // ── Rebuild pipeline ─────────────────────────────────────────────

    /// Rebuild every dirty region, shallowest first.
    ///
    /// A region whose rebuild fails loses its children and the error is
    /// returned. Subscriptions the region registered before failing are
    /// kept, so a later change to those models retries the build. Regions
    /// still queued stay dirty.
    pub fn flush(&mut self) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        loop {
            let next = self.queue.borrow_mut().pop();
            let Some((depth, id)) = next else {
                break;
            };
            if !self.elements.contains_key(&id) {
                continue;
            }
            if report.rebuilt >= self.config.max_rebuilds_per_flush {
                self.queue.borrow_mut().mark(depth, id);
                warn!(
                    limit = self.config.max_rebuilds_per_flush,
                    "rebuild limit reached; deferring remaining regions"
                );
                break;
            }
            if let Err(err) = self.build_region(id) {
                self.remove_children(id);
                return Err(err);
            }
            report.rebuilt += 1;
        }
        report.pending = self.queue.borrow().len();
        debug!(
            rebuilt = report.rebuilt,
            pending = report.pending,
            "flush complete"
        );
        Ok(report)
    }

    /// Number of regions waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    #[must_use]
    pub fn is_dirty(&self, id: ElementId) -> bool {
        self.queue.borrow().contains(id)
    }

    // ── Queries ──────────────────────────────────────────────────────

    #[must_use]
    pub fn root(&self) -> Option<ElementId> {
        self.root
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    #[must_use]
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.elements.get(&id).and_then(|e| e.parent)
    }

    #[must_use]
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.elements
            .get(&id)
            .map(|e| e.children.as_slice())
            .unwrap_or_default()
    }

    /// How many times a region's builder has run.
    #[must_use]
    pub fn build_count(&self, id: ElementId) -> Option<u64> {
        match &self.elements.get(&id)?.kind {
            ElementKind::Region { builds, .. } => Some(*builds),
            _ => None,
        }
    }

    /// Subscriptions currently held by a region.
    #[must_use]
    pub fn dependency_count(&self, id: ElementId) -> usize {
        match self.elements.get(&id).map(|e| &e.kind) {
            Some(ElementKind::Region { deps, .. }) => deps.borrow().len(),
            _ => 0,
        }
    }

    /// Detached context at `id`, for one-shot reads from event handlers.
    #[must_use]
    pub fn context(&self, id: ElementId) -> Option<BuildContext> {
        let element = self.elements.get(&id)?;
        Some(BuildContext::detached(id, element.depth, element.scope.clone()))
    }

    /// First text element (document order) whose text equals `text`.
    #[must_use]
    pub fn find_text(&self, text: &str) -> Option<ElementId> {
        self.walk()
            .find(|id| matches!(&self.elements[id].kind, ElementKind::Text(t) if t == text))
    }

    /// Text leaves in document order.
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        self.walk()
            .filter_map(|id| match &self.elements[&id].kind {
                ElementKind::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Pre-order traversal from the root.
    fn walk(&self) -> impl Iterator<Item = ElementId> + '_ {
        let mut stack: Vec<ElementId> = self.root.into_iter().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            if let Some(element) = self.elements.get(&id) {
                stack.extend(element.children.iter().rev());
            }
            Some(id)
        })
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.root)
            .field("elements", &self.elements.len())
            .field("pending", &self.pending())
            .field("config", &self.config)
            .finish()
    }
}
