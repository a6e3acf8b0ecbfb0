//! Property-based tests for scope resolution over arbitrary nesting.
//!
//! 1. The subscribing lookup (`depend_on`) resolves to the innermost
//!    publication of the requested type, however deep.
//! 2. The one-shot lookup through a detached context resolves to the same
//!    publication.
//! 3. Publications of other types and plain wrappers never interfere.
//! 4. With no publication of the type, mounting fails and leaves nothing.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use scopekit_core::{Node, Observable, ScopeResolutionError, Tree};

#[derive(Debug, Clone, Copy)]
enum Layer {
    Counter,
    Label,
    Wrapper,
}

fn layer_strategy() -> impl Strategy<Value = Layer> {
    prop_oneof![
        Just(Layer::Counter),
        Just(Layer::Label),
        Just(Layer::Wrapper),
    ]
}

proptest! {
    #[test]
    fn innermost_publication_wins(layers in proptest::collection::vec(layer_strategy(), 0..24)) {
        let counters: Vec<Observable<u64>> =
            (0..layers.len()).map(|i| Observable::new(i as u64)).collect();
        let label = Observable::new(String::from("label"));
        let resolved: Rc<RefCell<Option<Observable<u64>>>> = Rc::new(RefCell::new(None));

        let resolved_clone = Rc::clone(&resolved);
        let mut node = Node::column([
            Node::builder(move |ctx| {
                let model = ctx.depend_on::<u64>()?;
                *resolved_clone.borrow_mut() = Some(model);
                Ok(Node::Empty)
            }),
            Node::text("leaf"),
        ]);
        for (i, layer) in layers.iter().enumerate().rev() {
            node = match layer {
                Layer::Counter => Node::scope(counters[i].clone(), node),
                Layer::Label => Node::scope(label.clone(), node),
                Layer::Wrapper => Node::column([node]),
            };
        }

        let expected = layers
            .iter()
            .rposition(|l| matches!(l, Layer::Counter))
            .map(|i| counters[i].clone());

        let mut tree = Tree::new();
        let mounted = tree.mount(node);

        match expected {
            Some(expected) => {
                prop_assert!(mounted.is_ok());
                let via_region = resolved.borrow().clone().expect("builder ran");
                prop_assert!(via_region.ptr_eq(&expected));
                prop_assert_eq!(expected.subscriber_count(), 1);

                let leaf = tree.find_text("leaf").expect("mounted");
                let ctx = tree.context(leaf).expect("live");
                let via_read = ctx.read::<u64>().expect("published");
                prop_assert!(via_read.ptr_eq(&expected));
                prop_assert_eq!(expected.subscriber_count(), 1);

                let total: usize = counters.iter().map(Observable::subscriber_count).sum();
                prop_assert_eq!(total, 1);
            }
            None => {
                prop_assert_eq!(mounted.unwrap_err(), ScopeResolutionError);
                prop_assert_eq!(tree.element_count(), 0);
                prop_assert_eq!(label.subscriber_count(), 0);
            }
        }
    }
}
