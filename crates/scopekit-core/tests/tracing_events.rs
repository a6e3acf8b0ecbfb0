//! Structured logging emitted by the scope pipeline.

use std::sync::{Arc, Mutex};

use scopekit_core::{Consumer, Node, Observable, PipelineConfig, Tree};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Default)]
struct Captured {
    spans: Vec<String>,
    messages: Vec<String>,
    requested: Vec<String>,
}

struct Capture {
    state: Arc<Mutex<Captured>>,
}

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::Id,
        _ctx: Context<'_, S>,
    ) {
        self.state
            .lock()
            .expect("capture lock")
            .spans
            .push(attrs.metadata().name().to_string());
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        #[derive(Default)]
        struct Fields {
            message: Option<String>,
            requested: Option<String>,
        }
        impl tracing::field::Visit for Fields {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                match field.name() {
                    "message" => self.message = Some(value.to_string()),
                    "requested" => self.requested = Some(value.to_string()),
                    _ => {}
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                let text = format!("{value:?}").trim_matches('"').to_string();
                match field.name() {
                    "message" => self.message = Some(text),
                    "requested" => self.requested = Some(text),
                    _ => {}
                }
            }
        }

        let mut fields = Fields::default();
        event.record(&mut fields);
        let mut state = self.state.lock().expect("capture lock");
        if let Some(message) = fields.message {
            state.messages.push(message);
        }
        if let Some(requested) = fields.requested {
            state.requested.push(requested);
        }
    }
}

fn capture() -> (Arc<Mutex<Captured>>, impl Subscriber + Send + Sync) {
    let state = Arc::new(Mutex::new(Captured::default()));
    let subscriber = tracing_subscriber::registry().with(Capture {
        state: Arc::clone(&state),
    });
    (state, subscriber)
}

#[test]
fn resolution_failure_logs_requested_type() {
    let (state, subscriber) = capture();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut tree = Tree::new();
    let result = tree.mount(Node::scope(
        Observable::new(0u32),
        Consumer::<u64>::new(|_, _, _| Node::Empty),
    ));
    assert!(result.is_err());

    let state = state.lock().expect("capture lock");
    assert!(
        state.messages.iter().any(|m| m == "scope resolution failed"),
        "messages: {:?}",
        state.messages
    );
    assert!(state.requested.iter().any(|r| r.contains("u64")));
}

#[test]
fn builds_run_inside_spans_and_subscriptions_are_logged() {
    let (state, subscriber) = capture();
    let _guard = tracing::subscriber::set_default(subscriber);

    let model = Observable::new(0u32);
    let mut tree = Tree::new();
    tree.mount(Node::scope(
        model.clone(),
        Consumer::<u32>::new(|_, _, n| Node::text(n.get().to_string())),
    ))
    .expect("published");
    model.set(1);
    tree.flush().expect("rebuild");

    let state = state.lock().expect("capture lock");
    let build_spans = state
        .spans
        .iter()
        .filter(|s| *s == "scope.region.build")
        .count();
    assert_eq!(build_spans, 2);
    for expected in ["publication mounted", "region subscribed", "flush complete"] {
        assert!(
            state.messages.iter().any(|m| m == expected),
            "missing {expected:?} in {:?}",
            state.messages
        );
    }
}

#[test]
fn rebuild_limit_is_reported() {
    let (state, subscriber) = capture();
    let _guard = tracing::subscriber::set_default(subscriber);

    let model = Observable::new(0u32);
    let mut tree = Tree::with_config(PipelineConfig::default().with_max_rebuilds_per_flush(2));
    tree.mount(Node::scope(
        model,
        Node::builder(|ctx| {
            let model = ctx.depend_on::<u32>()?;
            model.update(|v| *v += 1);
            Ok(Node::Empty)
        }),
    ))
    .expect("published");
    let report = tree.flush().expect("bounded");
    assert_eq!(report.pending, 1);

    let state = state.lock().expect("capture lock");
    assert!(
        state
            .messages
            .iter()
            .any(|m| m.starts_with("rebuild limit reached"))
    );
}
