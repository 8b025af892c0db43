//! Two counters sharing one provider, each re-rendering only on its own updates.
//!
//! Run with `RUST_LOG=stowaway=debug` to see store lifecycle events.

use std::cell::RefCell;
use std::rc::Rc;

use stowaway::{use_store, Element, Instance, Provider, Result, StateCell, StoreCx, StoreDefinition, Tree};
use tracing_subscriber::EnvFilter;

struct Counter {
    count: StateCell<i64>,
    step: StateCell<i64>,
    history: StateCell<Vec<i64>>,
}

impl Counter {
    fn new(cx: &StoreCx, initial: i64) -> Self {
        Self {
            count: cx.use_state(initial),
            step: cx.use_state(2),
            history: cx.use_state(vec![initial]),
        }
    }

    fn increment(&self) {
        let step = self.step.get();
        self.count.update(|count| *count += step);
        self.history.update(|history| history.push(self.count.get()));
    }

    fn decrement(&self) {
        let step = self.step.get();
        self.count.update(|count| *count -= step);
        self.history.update(|history| history.push(self.count.get()));
    }
}

type Handle = Rc<RefCell<Option<Rc<Instance<Counter>>>>>;

fn counter_view(label: &'static str, definition: &StoreDefinition<Counter>, handle: &Handle) -> Element {
    let (definition, handle) = (definition.clone(), handle.clone());
    Element::new(move |cx| {
        let counter = use_store(cx, &definition)?;
        println!("   [render] {label}: {}", counter.count.get());
        *handle.borrow_mut() = Some(counter);
        Ok(vec![])
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Counter Application ===\n");

    let odds = StoreDefinition::new(|cx| Counter::new(cx, 1));
    let evens = StoreDefinition::new(|cx| Counter::new(cx, 0));
    let (odd, even) = (Handle::default(), Handle::default());

    println!("1. Mounting provider with two stores");
    let app = Provider::new()
        .stores([&odds, &evens])
        .child(counter_view("odds", &odds, &odd))
        .child(counter_view("evens", &evens, &even));
    let mut tree = Tree::mount(app.into())?;

    let (Some(odd), Some(even)) = (odd.borrow().clone(), even.borrow().clone()) else {
        return Ok(());
    };

    println!("\n2. Incrementing odds twice");
    tree.act(|| odd.increment())?;
    tree.act(|| odd.increment())?;

    println!("\n3. Incrementing evens with a larger step");
    tree.act(|| {
        even.step.set(10);
        even.increment();
    })?;

    println!("\n4. Decrementing odds");
    tree.act(|| odd.decrement())?;

    println!("\n5. History:");
    odd.history.with(|history| println!("   odds:  {history:?}"));
    even.history.with(|history| println!("   evens: {history:?}"));

    println!("\n6. Unmounting");
    tree.unmount();
    println!("   odds listeners left: {}", odd.listener_count());

    println!("\n✓ Counter application complete!");
    Ok(())
}
