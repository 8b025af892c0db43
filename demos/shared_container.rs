//! One container shared through a `ContainerProvider`, plus a second
//! container passed explicitly.

use serde_json::{json, Map, Value};
use stowaway::{use_container, Container, ContainerProvider, Element, Result, Tree};
use tracing_subscriber::EnvFilter;

type Record = Map<String, Value>;

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings: Container<Record> = Container::new(record(json!({ "amount": 1 })));
    let counter: Container<Record> = Container::new(record(json!({ "count": 0 })));

    let view = Element::new({
        let counter = counter.clone();
        move |cx| {
            // Settings come from the provider, the counter is passed in.
            let (settings, _, _) = use_container::<Record>(cx, None)?;
            let (state, _, _) = use_container(cx, Some(&counter))?;
            println!("   [render] count = {}, amount = {}", state["count"], settings["amount"]);
            Ok(vec![])
        }
    });

    let app = ContainerProvider::new(settings.clone()).child(view);
    let mut tree = Tree::mount(app.into())?;

    let increment = {
        let (settings, counter) = (settings.clone(), counter.clone());
        move || {
            let amount = settings.read()["amount"].as_i64().unwrap_or(1);
            counter.update(|state| {
                let count = state["count"].as_i64().unwrap_or(0);
                Some(record(json!({ "count": count + amount })))
            });
        }
    };

    println!("Incrementing by 1");
    tree.act(|| increment())?;

    println!("Setting amount to 5");
    tree.act(|| settings.set_state(record(json!({ "amount": 5 }))))?;

    println!("Incrementing by 5");
    tree.act(|| increment())?;

    println!("Reset");
    tree.act(|| counter.setter().set(record(json!({ "count": 0 }))))?;

    Ok(())
}
