#![forbid(unsafe_code)]

//! Declarative node descriptions: text leaves, columns, publishers and
//! render regions.
//!
//! Nodes are cheap to clone (`Rc` inside) so a consumer's static child can
//! be passed through every rebuild without being reconstructed.

use std::any::{Any, TypeId, type_name};
use std::rc::Rc;

use scopekit_reactive::Observable;

use crate::context::{BuildContext, resolve};
use crate::error::Result;

/// A render region: anything that turns a [`BuildContext`] into a subtree.
pub trait Build {
    /// Produce the region's children for the current position.
    fn build(&self, ctx: &BuildContext) -> Result<Node>;

    /// Short label used in build spans.
    fn label(&self) -> &'static str {
        "region"
    }
}

/// Description of a subtree.
#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Empty,
    Text(String),
    Column(Vec<Node>),
    Scope(Publisher),
    Region(Rc<dyn Build>),
}

impl Node {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn column(children: impl IntoIterator<Item = Node>) -> Self {
        Self::Column(children.into_iter().collect())
    }

    /// Publish `model` over `child`. Shorthand for [`Publisher::new`].
    #[must_use]
    pub fn scope<T: 'static>(model: Observable<T>, child: impl Into<Node>) -> Self {
        Self::Scope(Publisher::new(model, child))
    }

    #[must_use]
    pub fn region(build: impl Build + 'static) -> Self {
        Self::Region(Rc::new(build))
    }

    /// A region whose closure may resolve models itself.
    #[must_use]
    pub fn builder(f: impl Fn(&BuildContext) -> Result<Node> + 'static) -> Self {
        Self::region(Builder { f })
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Self::Column(children)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Column(children) => f.debug_tuple("Column").field(children).finish(),
            Self::Scope(publisher) => std::fmt::Debug::fmt(publisher, f),
            Self::Region(build) => f.debug_tuple("Region").field(&build.label()).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Makes one [`Observable<T>`] discoverable, by type, to every element in
/// its child subtree.
///
/// A publisher is a pure propagation point: it never rebuilds on change.
/// Publishing the same type again further down shadows this one for that
/// inner subtree.
#[derive(Clone)]
pub struct Publisher {
    key: TypeId,
    type_name: &'static str,
    model: Rc<dyn Any>,
    child: Box<Node>,
}

impl Publisher {
    #[must_use]
    pub fn new<T: 'static>(model: Observable<T>, child: impl Into<Node>) -> Self {
        Self {
            key: TypeId::of::<Observable<T>>(),
            type_name: type_name::<T>(),
            model: Rc::new(model),
            child: Box::new(child.into()),
        }
    }

    /// The published model, if it is an `Observable<T>`.
    #[must_use]
    pub fn model<T: 'static>(&self) -> Option<Observable<T>> {
        self.model.downcast_ref::<Observable<T>>().cloned()
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn child(&self) -> &Node {
        &self.child
    }

    pub(crate) fn key(&self) -> TypeId {
        self.key
    }

    pub(crate) fn erased_model(&self) -> Rc<dyn Any> {
        Rc::clone(&self.model)
    }

    pub(crate) fn into_child(self) -> Node {
        *self.child
    }
}

impl From<Publisher> for Node {
    fn from(publisher: Publisher) -> Self {
        Self::Scope(publisher)
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("model", &self.type_name)
            .field("child", &self.child)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

type ConsumerFn<T> = dyn Fn(&BuildContext, Option<&Node>, &Observable<T>) -> Node;

/// Render region bound to the nearest enclosing publication of
/// `Observable<T>`.
///
/// On every build the consumer resolves its model, subscribes (unless
/// [`rebuild_on_change`](Consumer::rebuild_on_change) is off) and calls the
/// builder with the context, the static child and the model. A missing
/// publication fails the build with
/// [`ScopeResolutionError`](crate::ScopeResolutionError).
pub struct Consumer<T> {
    builder: Rc<ConsumerFn<T>>,
    child: Option<Node>,
    rebuild_on_change: bool,
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            builder: Rc::clone(&self.builder),
            child: self.child.clone(),
            rebuild_on_change: self.rebuild_on_change,
        }
    }
}

impl<T: 'static> Consumer<T> {
    #[must_use]
    pub fn new(
        builder: impl Fn(&BuildContext, Option<&Node>, &Observable<T>) -> Node + 'static,
    ) -> Self {
        Self {
            builder: Rc::new(builder),
            child: None,
            rebuild_on_change: true,
        }
    }

    /// A subtree that does not depend on the model. It is handed to the
    /// builder unchanged on every build.
    #[must_use]
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.child = Some(child.into());
        self
    }

    /// Whether model changes rebuild this region (default `true`).
    #[must_use]
    pub fn rebuild_on_change(mut self, enabled: bool) -> Self {
        self.rebuild_on_change = enabled;
        self
    }
}

impl<T: 'static> Build for Consumer<T> {
    fn build(&self, ctx: &BuildContext) -> Result<Node> {
        let model = resolve::<T>(ctx, self.rebuild_on_change)?;
        Ok((self.builder)(ctx, self.child.as_ref(), &model))
    }

    fn label(&self) -> &'static str {
        type_name::<T>()
    }
}

impl<T: 'static> From<Consumer<T>> for Node {
    fn from(consumer: Consumer<T>) -> Self {
        Self::region(consumer)
    }
}

impl<T> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("model", &type_name::<T>())
            .field("child", &self.child)
            .field("rebuild_on_change", &self.rebuild_on_change)
            .finish()
    }
}

/// Closure-backed region created by [`Node::builder`].
struct Builder<F> {
    f: F,
}

impl<F> Build for Builder<F>
where
    F: Fn(&BuildContext) -> Result<Node>,
{
    fn build(&self, ctx: &BuildContext) -> Result<Node> {
        (self.f)(ctx)
    }

    fn label(&self) -> &'static str {
        "builder"
    }
}
