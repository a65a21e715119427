use std::cell::{Cell, RefCell};

use sprout_core::{
    use_effect, use_state, Component, Element, HostOp, MemoryNodeId, Props, SetState, WorkStatus,
    NODE_VALUE, TEXT_ELEMENT,
};
use sprout_testing::{run_test_root, TestRoot};

thread_local! {
    static RENDERS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static SETTERS: RefCell<Vec<SetState<i64>>> = const { RefCell::new(Vec::new()) };
}

fn take_renders() -> Vec<String> {
    RENDERS.with(|renders| std::mem::take(&mut *renders.borrow_mut()))
}

fn counter(props: &Props) -> Element {
    let label = props.text("label").unwrap_or("counter").to_owned();
    let start = props.int("start").unwrap_or_default();
    RENDERS.with(|renders| renders.borrow_mut().push(label.clone()));
    let (count, set_count) = use_state(|| start);
    SETTERS.with(|setters| setters.borrow_mut().push(set_count.clone()));
    Element::host("div")
        .child(Element::host("h1").child(format!("{label}: {count}")))
        .child(
            Element::host("button")
                .prop("label", label)
                .on("onClick", move || set_count.update(|c| c + 1)),
        )
}

fn counter_element(label: &str, start: i64) -> Element {
    let mut props = Props::new();
    props.set("label", label);
    props.set("start", start);
    Element::from_component(Component::new(counter), props)
}

fn last_setter() -> SetState<i64> {
    SETTERS.with(|setters| setters.borrow().last().cloned().expect("no counter rendered"))
}

fn button_labelled(root: &TestRoot, label: &str) -> MemoryNodeId {
    root.find_by_tag("button")
        .into_iter()
        .find(|node| {
            root.host()
                .property(*node, "label")
                .and_then(|value| value.as_text())
                == Some(label)
        })
        .expect("button not found")
}

fn assert_host_mirrors_work_tree(root: &TestRoot) {
    assert_eq!(
        root.reconciler().host_nodes(),
        root.host().descendants(root.container())
    );
}

#[test]
fn scenario_a_initial_render_creates_then_inserts() {
    run_test_root(|root| {
        root.set_content(Element::host("div").child("hi")).unwrap();

        let structural: Vec<&HostOp> = root
            .ops()
            .iter()
            .filter(|op| op.is_create() || op.is_insert())
            .collect();
        let [HostOp::Create {
            node: div,
            tag: div_tag,
        }, HostOp::Create {
            node: text,
            tag: text_tag,
        }, HostOp::Insert {
            parent: first_parent,
            child: first_child,
            ..
        }, HostOp::Insert {
            parent: second_parent,
            child: second_child,
            ..
        }] = structural.as_slice()
        else {
            panic!("unexpected operations: {structural:?}");
        };
        assert_eq!(div_tag, "div");
        assert_eq!(text_tag, TEXT_ELEMENT);
        assert_eq!((first_parent, first_child), (&root.container(), div));
        assert_eq!((second_parent, second_child), (div, text));
        assert_eq!(
            root.host()
                .property(*text, NODE_VALUE)
                .map(ToString::to_string),
            Some("hi".to_owned())
        );
    });
}

#[test]
fn scenario_b_one_property_change_is_one_update() {
    run_test_root(|root| {
        root.set_content(Element::host("div").prop("title", "a").child("same"))
            .unwrap();
        root.take_ops();

        root.set_content(Element::host("div").prop("title", "b").child("same"))
            .unwrap();

        let ops = root.take_ops();
        assert_eq!(ops.iter().filter(|op| op.is_property_change()).count(), 1);
        assert!(!ops.iter().any(HostOp::is_insert));
        assert!(!ops.iter().any(HostOp::is_remove));
        assert!(!ops.iter().any(HostOp::is_create));
    });
}

#[test]
fn scenario_c_type_change_replaces_in_place() {
    run_test_root(|root| {
        let row = |middle: &str| {
            Element::host("section")
                .child(Element::host("p").child("first"))
                .child(Element::host(middle).child("middle"))
                .child(Element::host("p").child("last"))
        };
        root.set_content(row("span")).unwrap();
        let section = root.find_by_tag("section")[0];
        let old = root.host().children(section).to_vec();
        root.take_ops();

        root.set_content(row("div")).unwrap();

        let new = root.host().children(section).to_vec();
        assert_eq!(new.len(), 3);
        assert_eq!((new[0], new[2]), (old[0], old[2]));
        assert_eq!(root.host().tag(new[1]), Some("div"));
        assert_eq!(root.host().parent(old[1]), None);
        assert_eq!(root.text(), "firstmiddlelast");

        let ops = root.take_ops();
        assert_eq!(
            ops.iter().filter(|op| op.is_remove()).collect::<Vec<_>>(),
            vec![&HostOp::Remove {
                parent: section,
                child: old[1]
            }]
        );
        assert!(ops.contains(&HostOp::Insert {
            parent: section,
            child: new[1],
            before: Some(old[2]),
        }));
        assert_host_mirrors_work_tree(root);
    });
}

#[test]
fn scenario_d_event_handler_update_rerenders_only_that_component() {
    take_renders();
    run_test_root(|root| {
        root.set_content(
            Element::host("main")
                .child(counter_element("left", 10))
                .child(counter_element("right", 20)),
        )
        .unwrap();
        assert_eq!(take_renders(), vec!["left", "right"]);
        assert_eq!(root.text(), "left: 10right: 20");
        root.take_ops();

        let button = button_labelled(root, "right");
        assert_eq!(root.host().dispatch(button, "click").unwrap(), 1);
        assert!(!root.reconciler().is_idle());
        root.pump_until_idle().unwrap();

        assert_eq!(take_renders(), vec!["right"]);
        assert_eq!(root.text(), "left: 10right: 21");

        let h1_text = root.host().children(root.find_by_tag("h1")[1])[0];
        let ops = root.take_ops();
        let property_changes: Vec<&HostOp> =
            ops.iter().filter(|op| op.is_property_change()).collect();
        assert_eq!(
            property_changes,
            vec![&HostOp::SetProperty {
                node: h1_text,
                name: NODE_VALUE.into(),
                value: "right: 21".into(),
            }]
        );
        assert!(!ops.iter().any(|op| op.is_insert() || op.is_remove()));
        assert_host_mirrors_work_tree(root);
    });
}

#[test]
fn scenario_e_shrinking_children_deletes_the_tail() {
    run_test_root(|root| {
        let list = |items: &[&str]| {
            Element::host("ul").children(items.iter().map(|item| Element::host("li").child(*item)))
        };
        root.set_content(list(&["a", "b", "c"])).unwrap();
        let ul = root.find_by_tag("ul")[0];
        let old = root.host().children(ul).to_vec();
        root.take_ops();

        root.set_content(list(&["a"])).unwrap();

        assert_eq!(root.host().children(ul), &old[..1]);
        let summary = root.reconciler().last_commit();
        assert_eq!(summary.deletions, 2);
        assert_eq!(summary.placements, 0);
        let removed: Vec<MemoryNodeId> = root
            .take_ops()
            .into_iter()
            .filter_map(|op| match op {
                HostOp::Remove { parent, child } if parent == ul => Some(child),
                _ => None,
            })
            .collect();
        assert_eq!(removed, old[1..].to_vec());
        assert_host_mirrors_work_tree(root);
    });
}

#[test]
fn setting_the_current_value_schedules_nothing() {
    run_test_root(|root| {
        root.set_content(counter_element("solo", 3)).unwrap();
        let set = last_setter();

        set.set(3);
        assert!(root.reconciler().is_idle());
        assert!(!root.reconciler().runtime().needs_frame());
        assert_eq!(root.step_units(1).unwrap(), WorkStatus::Done);
    });
}

#[test]
fn state_survives_parent_rerenders() {
    run_test_root(|root| {
        let app = |title: &str| {
            Element::host("body")
                .child(Element::host("h2").child(title))
                .child(counter_element("kept", 0))
        };
        root.set_content(app("one")).unwrap();
        for _ in 0..3 {
            last_setter().update(|c| c + 1);
            root.pump_until_idle().unwrap();
        }
        assert_eq!(root.text(), "onekept: 3");

        for title in ["two", "three", "four"] {
            root.set_content(app(title)).unwrap();
        }
        assert_eq!(root.text(), "fourkept: 3");
    });
}

#[test]
fn moving_a_component_to_another_position_resets_its_state() {
    run_test_root(|root| {
        root.set_content(Element::host("div").child(counter_element("moved", 0)))
            .unwrap();
        last_setter().set(5);
        root.pump_until_idle().unwrap();
        assert_eq!(root.text(), "moved: 5");

        root.set_content(
            Element::host("div")
                .child("spacer")
                .child(counter_element("moved", 0)),
        )
        .unwrap();
        assert_eq!(root.text(), "spacermoved: 0");
    });
}

#[test]
fn work_yields_and_resumes_without_touching_the_host() {
    run_test_root(|root| {
        root.render(
            Element::host("ol").children((0..10).map(|i| Element::host("li").child(i))),
        );

        let mut slices = 0;
        while root.step_units(3).unwrap() == WorkStatus::Continue {
            slices += 1;
            if root.reconciler().phase() == sprout_core::Phase::Reconciling {
                assert!(root.host().children(root.container()).is_empty());
            }
        }
        // root, ol, 10 x (li, text)
        assert_eq!(slices, 7);
        assert_eq!(root.text(), "0123456789");
        assert_host_mirrors_work_tree(root);
    });
}

#[test]
fn effects_rerun_when_dependencies_change() {
    thread_local! {
        static OBSERVED: Cell<usize> = const { Cell::new(0) };
    }
    fn probe(props: &Props) -> Element {
        let items = props.int("items").unwrap_or_default();
        use_effect(
            move || OBSERVED.with(|observed| observed.set(items as usize)),
            sprout_core::deps![items],
        );
        Element::host("ul").children((0..items).map(|i| Element::host("li").child(i)))
    }

    run_test_root(|root| {
        let probe_element = |items: i64| {
            let mut props = Props::new();
            props.set("items", items);
            Element::from_component(Component::new(probe), props)
        };
        root.set_content(probe_element(2)).unwrap();
        assert_eq!(OBSERVED.with(Cell::get), 2);
        assert_eq!(root.find_by_tag("li").len(), 2);

        root.set_content(probe_element(4)).unwrap();
        assert_eq!(OBSERVED.with(Cell::get), 4);
        assert_eq!(root.find_by_tag("li").len(), 4);
    });
}

#[test]
fn self_update_trigger_rerenders_through_the_idle_loop() {
    use sprout_core::{schedule_self_update, MemoryHost, UpdateTrigger};
    use sprout_runtime_std::{IdleLoop, StdRuntime};

    thread_local! {
        static TICKS: Cell<i64> = const { Cell::new(0) };
        static TRIGGER: RefCell<Option<UpdateTrigger>> = const { RefCell::new(None) };
    }
    fn clock_face(_: &Props) -> Element {
        let trigger = schedule_self_update();
        TRIGGER.with(|slot| *slot.borrow_mut() = Some(trigger));
        Element::host("time").child(TICKS.with(Cell::get))
    }

    let runtime = StdRuntime::new();
    let mut host = MemoryHost::new();
    let container = host.create_container("root");
    let mut reconciler = runtime.reconciler(host, Default::default());
    let idle = IdleLoop::default();

    reconciler.render(Element::component(clock_face), container);
    idle.run_until_idle(&mut reconciler).unwrap();
    assert_eq!(reconciler.host().text_content(container), "0");
    runtime.take_frame_request();

    TICKS.with(|ticks| ticks.set(7));
    TRIGGER.with(|slot| slot.borrow().clone()).unwrap().trigger();
    assert!(runtime.take_frame_request());
    idle.run_until_idle(&mut reconciler).unwrap();
    assert_eq!(reconciler.host().text_content(container), "7");
}
