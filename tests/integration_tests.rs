//! Integration tests for Stowaway

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde_json::{json, Map, Value};
use stowaway::{
    use_container, use_published, use_store, Container, ContainerProvider, Element, Error, Instance, Provider,
    State, StateCell, StoreCx, StoreDefinition, StoreRegistry, Tree,
};

/// A counter store whose mutators step by a fixed amount.
struct Counter {
    count: StateCell<i64>,
    step: i64,
}

impl Counter {
    fn new(cx: &StoreCx, initial: i64, step: i64) -> Self {
        Self {
            count: cx.use_state(initial),
            step,
        }
    }

    fn increment(&self) {
        self.increment_by(self.step);
    }

    fn decrement(&self) {
        self.increment_by(-self.step);
    }

    fn increment_by(&self, amount: i64) {
        self.count.update(|count| *count += amount);
    }

    fn set_count(&self, count: i64) {
        self.count.set(count);
    }
}

type Slot<T> = Rc<RefCell<Option<Rc<Instance<T>>>>>;

/// A component that reads `definition`, records what it rendered and keeps
/// the instance around so the test can fire "events" at it.
fn counter_view(
    definition: &StoreDefinition<Counter>,
    renders: &Rc<Cell<usize>>,
    shown: &Rc<Cell<i64>>,
    slot: &Slot<Counter>,
) -> Element {
    let (definition, renders, shown, slot) = (definition.clone(), renders.clone(), shown.clone(), slot.clone());
    Element::new(move |cx| {
        let store = use_store(cx, &definition)?;
        renders.set(renders.get() + 1);
        shown.set(store.count.get());
        *slot.borrow_mut() = Some(store);
        Ok(vec![])
    })
}

fn take<T>(slot: &Slot<T>) -> Rc<Instance<T>> {
    slot.borrow().clone().expect("component should have rendered")
}

#[test]
fn counter_scenario() {
    let counter = StoreDefinition::new(|cx| Counter::new(cx, 0, 1));
    let (renders, shown, slot) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)), Slot::default());

    let view = counter_view(&counter, &renders, &shown, &slot);
    let mut tree = Tree::mount(Provider::new().store(&counter).child(view).into()).unwrap();
    let store = take(&slot);

    tree.act(|| store.increment()).unwrap();
    tree.act(|| store.increment()).unwrap();
    assert_eq!(store.count.get(), 2);
    assert_eq!(shown.get(), 2);

    tree.act(|| store.set_count(100)).unwrap();
    assert_eq!(shown.get(), 100);
    assert_eq!(renders.get(), 4);
}

#[test]
fn independent_stores_render_independently() {
    let odds = StoreDefinition::new(|cx| Counter::new(cx, 1, 2));
    let evens = StoreDefinition::new(|cx| Counter::new(cx, 0, 2));

    let (odd_renders, odd_shown, odd_slot) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)), Slot::default());
    let (even_renders, even_shown, even_slot) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)), Slot::default());

    let app = Provider::new().stores([&odds, &evens]).children([
        counter_view(&odds, &odd_renders, &odd_shown, &odd_slot),
        counter_view(&evens, &even_renders, &even_shown, &even_slot),
    ]);
    let mut tree = Tree::mount(app.into()).unwrap();
    let (odd, even) = (take(&odd_slot), take(&even_slot));

    assert_eq!((odd_shown.get(), even_shown.get()), (1, 0));

    tree.act(|| odd.increment()).unwrap();
    tree.act(|| odd.increment()).unwrap();
    assert_eq!((odd_shown.get(), even_shown.get()), (5, 0));

    tree.act(|| even.increment()).unwrap();
    tree.act(|| even.increment()).unwrap();
    assert_eq!((odd_shown.get(), even_shown.get()), (5, 4));

    tree.act(|| odd.decrement()).unwrap();
    tree.act(|| odd.decrement()).unwrap();
    tree.act(|| even.decrement()).unwrap();
    tree.act(|| even.decrement()).unwrap();
    assert_eq!((odd_shown.get(), even_shown.get()), (1, 0));

    tree.act(|| odd.set_count(101)).unwrap();
    tree.act(|| even.set_count(100)).unwrap();
    assert_eq!((odd_shown.get(), even_shown.get()), (101, 100));

    // One initial render plus one per change each component observed.
    assert_eq!(odd_renders.get(), 6);
    assert_eq!(even_renders.get(), 6);
}

#[test]
fn definition_runs_once_however_many_consumers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = StoreDefinition::new({
        let calls = calls.clone();
        move |cx| {
            calls.fetch_add(1, Ordering::SeqCst);
            Counter::new(cx, 0, 1)
        }
    });

    let views: Vec<Element> = (0..3)
        .map(|_| counter_view(&counter, &Rc::new(Cell::new(0)), &Rc::new(Cell::new(0)), &Slot::default()))
        .collect();
    let mut tree = Tree::mount(Provider::new().store(&counter).children(views).into()).unwrap();
    tree.rerender().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn unmounting_consumer_unsubscribes() {
    let counter = StoreDefinition::new(|cx| Counter::new(cx, 0, 1));
    let show = Rc::new(Cell::new(true));
    let slot = Slot::default();

    let view = counter_view(&counter, &Rc::new(Cell::new(0)), &Rc::new(Cell::new(0)), &slot);
    let toggle = Element::new({
        let show = show.clone();
        move |_| Ok(if show.get() { vec![view.clone()] } else { vec![] })
    });
    let mut tree = Tree::mount(Provider::new().store(&counter).child(toggle).into()).unwrap();
    let store = take(&slot);
    assert_eq!(store.listener_count(), 1);

    show.set(false);
    tree.rerender().unwrap();
    assert_eq!(store.listener_count(), 0);

    show.set(true);
    tree.rerender().unwrap();
    assert_eq!(store.listener_count(), 1);
}

#[test]
fn broken_store_fails_to_initialize() {
    let broken: StoreDefinition<Counter> = StoreDefinition::fallible(|_| None);
    let view = counter_view(&broken, &Rc::new(Cell::new(0)), &Rc::new(Cell::new(0)), &Slot::default());

    let result = Tree::mount(Provider::new().store(&broken).child(view).into());

    assert_eq!(result.err(), Some(Error::UninitializedStore));
}

#[test]
fn errors_carry_their_messages() {
    let counter = StoreDefinition::new(|cx| Counter::new(cx, 0, 1));
    let view = counter_view(&counter, &Rc::new(Cell::new(0)), &Rc::new(Cell::new(0)), &Slot::default());

    let no_provider = Tree::mount(view.clone()).err().map(|err| err.to_string());
    assert_eq!(no_provider.as_deref(), Some("You must wrap your components with a <Provider>!"));

    let no_stores = Tree::mount(Provider::new().child(view).into())
        .err()
        .map(|err| err.to_string());
    assert_eq!(
        no_stores.as_deref(),
        Some("You must provide stores list to a <Provider> for initialization!")
    );
}

#[test]
fn unrelated_providers_share_a_channel_but_not_instances() {
    StoreRegistry::scope(|| {
        let counter = StoreDefinition::new(|cx| Counter::new(cx, 0, 1));
        let (left_shown, left_slot) = (Rc::new(Cell::new(0)), Slot::default());
        let (right_shown, right_slot) = (Rc::new(Cell::new(0)), Slot::default());

        let left = Provider::new()
            .store(&counter)
            .child(counter_view(&counter, &Rc::new(Cell::new(0)), &left_shown, &left_slot));
        let right = Provider::new()
            .store(&counter)
            .child(counter_view(&counter, &Rc::new(Cell::new(0)), &right_shown, &right_slot));
        let mut tree = Tree::mount(Element::fragment(vec![left.into(), right.into()])).unwrap();

        assert_eq!(StoreRegistry::current().channel_count(), 1);

        let left_store = take(&left_slot);
        tree.act(|| left_store.increment()).unwrap();

        assert_eq!((left_shown.get(), right_shown.get()), (1, 0));
    });
}

#[test]
fn published_map_lists_provided_stores() {
    let odds = StoreDefinition::new(|cx| Counter::new(cx, 1, 2));
    let evens = StoreDefinition::new(|cx| Counter::new(cx, 0, 2));
    let listed = Rc::new(RefCell::new(Vec::new()));

    let probe = Element::new({
        let listed = listed.clone();
        move |cx| {
            *listed.borrow_mut() = use_published(cx)?.definitions();
            Ok(vec![])
        }
    });
    let _tree = Tree::mount(Provider::new().store(&odds).store(&evens).child(probe).into()).unwrap();

    assert_eq!(*listed.borrow(), vec![odds.id(), evens.id()]);
}

// Container flavour

#[derive(Clone, Debug, PartialEq)]
struct CounterState {
    count: i64,
}

impl State for CounterState {
    type Partial = CounterState;

    fn merge(&mut self, partial: CounterState) {
        *self = partial;
    }
}

fn increment(container: &Container<CounterState>, amount: i64) {
    container.update(|state| {
        Some(CounterState {
            count: state.count + amount,
        })
    });
}

/// Renders a container's count; `store` is `None` to read the default channel.
fn container_view(store: Option<Container<CounterState>>, shown: &Rc<Cell<i64>>) -> Element {
    let shown = shown.clone();
    Element::new(move |cx| {
        let (state, _, _) = use_container(cx, store.as_ref())?;
        shown.set(state.count);
        Ok(vec![])
    })
}

#[test]
fn container_with_explicit_instance() {
    let counter = Container::new(CounterState { count: 0 });
    let shown = Rc::new(Cell::new(-1));
    let mut tree = Tree::mount(container_view(Some(counter.clone()), &shown)).unwrap();
    assert_eq!(shown.get(), 0);

    tree.act(|| increment(&counter, 1)).unwrap();
    assert_eq!((counter.state().count, shown.get()), (1, 1));

    tree.act(|| increment(&counter, -1)).unwrap();
    assert_eq!((counter.state().count, shown.get()), (0, 0));

    tree.act(|| counter.set_state(CounterState { count: 100 })).unwrap();
    assert_eq!((counter.state().count, shown.get()), (100, 100));
}

#[test]
fn container_from_provider() {
    let counter = Container::new(CounterState { count: 0 });
    let shown = Rc::new(Cell::new(-1));
    let app = ContainerProvider::new(counter.clone()).child(container_view(None, &shown));
    let mut tree = Tree::mount(app.into()).unwrap();

    tree.act(|| increment(&counter, 1)).unwrap();
    assert_eq!(shown.get(), 1);

    tree.act(|| counter.setter().set(CounterState { count: 100 })).unwrap();
    assert_eq!(shown.get(), 100);
}

#[test]
fn container_listeners_follow_mount_lifecycle() {
    let counter = Container::new(CounterState { count: 0 });
    let mut tree = Tree::mount(container_view(Some(counter.clone()), &Rc::new(Cell::new(0)))).unwrap();
    assert_eq!(counter.listener_count(), 1);

    tree.rerender().unwrap();
    assert_eq!(counter.listener_count(), 1);

    tree.unmount();
    assert_eq!(counter.listener_count(), 0);
}

#[test]
fn empty_update_does_not_rerender() {
    let counter = Container::new(CounterState { count: 7 });
    let renders = Rc::new(Cell::new(0));
    let view = Element::new({
        let (counter, renders) = (counter.clone(), renders.clone());
        move |cx| {
            use_container(cx, Some(&counter))?;
            renders.set(renders.get() + 1);
            Ok(vec![])
        }
    });
    let mut tree = Tree::mount(view).unwrap();

    tree.act(|| counter.set_state(None::<CounterState>)).unwrap();
    tree.act(|| counter.update(|_| None)).unwrap();

    assert_eq!(renders.get(), 1);
    assert_eq!(counter.state().count, 7);
}

#[test]
fn container_without_instance_fails() {
    let result = Tree::mount(container_view(None, &Rc::new(Cell::new(0))));
    assert_eq!(result.err().map(|err| err.to_string()).as_deref(), Some("You must provide a store instance!"));
}

#[test]
fn json_record_container() {
    let mut initial = Map::new();
    initial.insert("amount".into(), json!(1));
    initial.insert("label".into(), json!("step"));
    let settings: Container<Map<String, Value>> = Container::new(initial);
    let shown = Rc::new(RefCell::new(Value::Null));

    let view = Element::new({
        let (settings, shown) = (settings.clone(), shown.clone());
        move |cx| {
            let (state, _, _) = use_container(cx, Some(&settings))?;
            *shown.borrow_mut() = Value::Object(state);
            Ok(vec![])
        }
    });
    let mut tree = Tree::mount(view).unwrap();

    tree.act(|| {
        let mut patch = Map::new();
        patch.insert("amount".into(), json!(5));
        settings.set_state(patch);
    })
    .unwrap();

    assert_eq!(*shown.borrow(), json!({"amount": 5, "label": "step"}));
}
