use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sprout_core::{deps, use_effect, use_state, Component, Element, MemoryHost, Props};
use sprout_runtime_std::{IdleLoop, IdleLoopConfig, StdRuntime};

fn counter(props: &Props) -> Element {
    let name = props.text("name").unwrap_or("counter").to_owned();
    let start = props.int("num").unwrap_or_default();
    let (count, set_count) = use_state(|| start);

    let logged = name.clone();
    use_effect(
        move || log::info!("{logged} is now {count}"),
        deps![count],
    );

    Element::host("div")
        .child(Element::host("h2").child(format!("{name}: {count}")))
        .child(
            Element::host("button")
                .prop("name", name)
                .on("onClick", move || set_count.update(|c| c + 1))
                .child("+1"),
        )
}

fn counter_element(name: &str, num: i64) -> Element {
    let mut props = Props::new();
    props.set("name", name);
    props.set("num", num);
    Element::from_component(Component::new(counter), props)
}

fn app(_: &Props) -> Element {
    Element::host("main")
        .child(Element::host("h1").child("Hello mini react!"))
        .child(counter_element("first", 10))
        .child(counter_element("second", 20))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== Sprout Counter Example ===");

    let runtime = StdRuntime::new();
    let wakes = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&wakes);
    runtime.set_frame_waker(move || {
        let wake = counted.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("frame requested ({wake})");
    });
    let mut host = MemoryHost::new();
    let container = host.create_container("root");
    let mut reconciler = runtime.reconciler(host, Default::default());
    let idle = IdleLoop::new(IdleLoopConfig::default());

    reconciler.render(Element::component(app), container);
    idle.run_requested_frames(&runtime, &mut reconciler)?;
    println!("initial render:");
    print!("{}", reconciler.host().dump_tree(container));

    let buttons: Vec<_> = reconciler
        .host()
        .descendants(container)
        .into_iter()
        .filter(|node| reconciler.host().tag(*node) == Some("button"))
        .collect();
    let [first, second] = buttons[..] else {
        return Err(format!("expected two buttons, found {}", buttons.len()).into());
    };
    for (clicks, button) in [(3, first), (1, second)] {
        for _ in 0..clicks {
            reconciler.host().dispatch(button, "click")?;
        }
        let frames = idle.run_requested_frames(&runtime, &mut reconciler)?;
        log::info!("{clicks} click(s) on {button:?} took {frames} frame(s)");
    }
    runtime.clear_frame_waker();

    println!("after clicking:");
    print!("{}", reconciler.host().dump_tree(container));
    println!("{}", reconciler.host().text_content(container));
    println!("frames requested: {}", wakes.load(Ordering::SeqCst));
    Ok(())
}
