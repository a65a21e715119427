use super::*;
use crate::runtime::Runtime;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    static SETTER: RefCell<Option<SetState<i32>>> = const { RefCell::new(None) };
    static SEEN: Cell<i32> = const { Cell::new(0) };
}

fn counter(_: &Props) -> Element {
    let (count, set_count) = use_state(|| 1);
    SEEN.with(|seen| seen.set(count));
    SETTER.with(|slot| *slot.borrow_mut() = Some(set_count));
    Element::text(count)
}

fn setter() -> SetState<i32> {
    SETTER.with(|slot| slot.borrow().clone().expect("counter not rendered"))
}

fn render(runtime: &Runtime, previous: Vec<Rc<StateSlot>>) -> HookList {
    let (_, hooks) = render_component(
        &Component::new(counter),
        &Props::new(),
        InstanceId(7),
        runtime.handle(),
        previous,
    );
    hooks
}

#[test]
fn first_render_uses_initial_value() {
    let runtime = Runtime::default();
    let hooks = render(&runtime, Vec::new());
    assert_eq!(SEEN.with(Cell::get), 1);
    assert_eq!(hooks.states.len(), 1);
    assert!(hooks.effects.is_empty());
}

#[test]
fn queued_updates_fold_in_order() {
    let runtime = Runtime::default();
    let first = render(&runtime, Vec::new());

    let set = setter();
    set.update(|c| c + 1);
    set.update(|c| c * 10);
    assert!(runtime.has_pending_updates());

    let second = render(&runtime, first.state_slots());
    assert_eq!(SEEN.with(Cell::get), 20);
    // folding reads the queue; only a commit consumes it
    assert!(first.states[0].slot.has_pending());
    assert!(!second.states[0].commit());
    assert!(!first.states[0].slot.has_pending());
}

#[test]
fn uncommitted_render_leaves_the_queue_intact() {
    let runtime = Runtime::default();
    let first = render(&runtime, Vec::new());
    setter().set(6);

    let abandoned = render(&runtime, first.state_slots());
    assert_eq!(SEEN.with(Cell::get), 6);
    drop(abandoned);

    render(&runtime, first.state_slots());
    assert_eq!(SEEN.with(Cell::get), 6);
}

#[test]
fn setting_an_equal_value_queues_nothing() {
    let runtime = Runtime::default();
    let hooks = render(&runtime, Vec::new());

    setter().set(1);
    assert!(!hooks.states[0].slot.has_pending());
    assert!(!runtime.has_pending_updates());
    assert!(!runtime.needs_frame());
}

#[test]
fn duplicate_requests_are_coalesced() {
    let runtime = Runtime::default();
    let _hooks = render(&runtime, Vec::new());

    let set = setter();
    set.set(2);
    set.set(3);
    assert_eq!(runtime.take_next_update(), Some(InstanceId(7)));
    assert_eq!(runtime.take_next_update(), None);
}

#[test]
fn updater_outliving_its_cell_is_ignored() {
    let runtime = Runtime::default();
    let hooks = render(&runtime, Vec::new());
    let set = setter();
    drop(hooks);

    set.set(5);
    assert!(!runtime.has_pending_updates());
}

#[test]
fn updates_queued_during_a_render_survive_its_commit() {
    let runtime = Runtime::default();
    let first = render(&runtime, Vec::new());
    let set = setter();
    set.set(2);

    let second = render(&runtime, first.state_slots());
    assert_eq!(SEEN.with(Cell::get), 2);
    set.set(4);
    assert!(second.states[0].commit());

    render(&runtime, second.state_slots());
    assert_eq!(SEEN.with(Cell::get), 4);
}

#[test]
fn setter_from_an_earlier_render_reaches_the_live_state() {
    let runtime = Runtime::default();
    let first = render(&runtime, Vec::new());
    let early = setter();
    let second = render(&runtime, first.state_slots());
    second.states[0].commit();
    drop(first);

    early.set(9);
    assert!(second.states[0].slot.has_pending());
    render(&runtime, second.state_slots());
    assert_eq!(SEEN.with(Cell::get), 9);
}

#[test]
fn setting_back_to_the_committed_value_is_kept_when_updates_are_queued() {
    let runtime = Runtime::default();
    let first = render(&runtime, Vec::new());
    let set = setter();
    set.set(5);
    set.set(1);

    render(&runtime, first.state_slots());
    assert_eq!(SEEN.with(Cell::get), 1);
    set.set(5);
    set.set(5);
    render(&runtime, first.state_slots());
    assert_eq!(SEEN.with(Cell::get), 5);
}

#[test]
#[should_panic(expected = "hooks may only be called while a component is rendering")]
fn hooks_outside_rendering_panic() {
    let _ = use_state(|| 0);
}

#[test]
fn scope_is_released_when_a_component_panics() {
    fn exploding(_: &Props) -> Element {
        let _ = use_state(|| 0);
        panic!("boom");
    }

    let runtime = Runtime::default();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        render_component(
            &Component::new(exploding),
            &Props::new(),
            InstanceId(1),
            runtime.handle(),
            Vec::new(),
        )
    }));
    assert!(result.is_err());
    RENDER_SCOPES.with(|stack| assert!(stack.borrow().is_empty()));
}

#[test]
fn effects_are_recorded_but_not_run_during_render() {
    thread_local! {
        static RAN: Cell<bool> = const { Cell::new(false) };
    }
    fn with_effect(_: &Props) -> Element {
        use_effect(|| RAN.with(|ran| ran.set(true)), crate::deps![1, "a"]);
        Element::host("div")
    }

    let runtime = Runtime::default();
    let (_, mut hooks) = render_component(
        &Component::new(with_effect),
        &Props::new(),
        InstanceId(2),
        runtime.handle(),
        Vec::new(),
    );
    assert!(!RAN.with(Cell::get));
    assert_eq!(hooks.effects[0].deps.len(), 2);

    hooks.effects[0].run();
    assert!(RAN.with(Cell::get));
}

#[test]
fn cleanup_runs_once() {
    let calls = Rc::new(Cell::new(0));
    let counted = Rc::clone(&calls);
    let mut record = EffectRecord {
        callback: Some(Box::new(move || {
            EffectCleanup::new(move || counted.set(counted.get() + 1))
        })),
        deps: Vec::new(),
        cleanup: None,
    };
    record.run();
    record.run_cleanup();
    record.run_cleanup();
    assert_eq!(calls.get(), 1);
}

#[test]
fn deps_hash_each_element() {
    assert_eq!(crate::deps![1, "x"], crate::deps![1, "x"]);
    assert_ne!(crate::deps![1, "x"], crate::deps![2, "x"]);
    assert_eq!(crate::deps![3].len(), 1);
    assert!(crate::deps![].is_empty());
}

#[test]
fn trigger_requests_an_update_for_the_rendering_component() {
    thread_local! {
        static TRIGGER: RefCell<Option<UpdateTrigger>> = const { RefCell::new(None) };
    }
    fn triggered(_: &Props) -> Element {
        let trigger = schedule_self_update();
        TRIGGER.with(|slot| *slot.borrow_mut() = Some(trigger));
        Element::host("div")
    }

    let runtime = Runtime::default();
    render_component(
        &Component::new(triggered),
        &Props::new(),
        InstanceId(9),
        runtime.handle(),
        Vec::new(),
    );
    let trigger = TRIGGER.with(|slot| slot.borrow().clone()).expect("trigger captured");
    assert_eq!(trigger.instance(), InstanceId(9));
    trigger.trigger();
    assert!(runtime.has_pending_updates());
}
