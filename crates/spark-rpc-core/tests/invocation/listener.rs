use std::{sync::Barrier, thread};

use futures::executor::block_on;
use serde_json::json;
use spark_rpc_core::{
    ExtensionError, Invoker, InvokerLifecycleNotifier,
    rpc::LifecycleState,
    test_stubs::CountingInvoker,
};
use tracing_test::traced_test;

use super::fixtures::{address, as_invoker, call, events_for, scope};

fn notifier() -> InvokerLifecycleNotifier {
    InvokerLifecycleNotifier::new(&scope())
}

/// 引用时按激活顺序通知监听器；重复销毁只通知一次。
#[test]
fn referenced_then_destroyed_exactly_once() {
    let terminal = CountingInvoker::new("demo.Lifecycle", address("dubbo://127.0.0.1:20880/demo"));
    let notifier = notifier();

    let listened = notifier
        .on_referenced(as_invoker(&terminal))
        .expect("监听器解析成功");
    assert_eq!(listened.listener_names(), ["broken", "audit"]);
    assert_eq!(listened.state(), LifecycleState::Referenced);

    assert!(notifier.on_destroyed(&listened));
    assert!(!notifier.on_destroyed(&listened));

    assert_eq!(listened.state(), LifecycleState::Destroyed);
    assert!(terminal.is_destroyed());
    assert_eq!(
        events_for("demo.Lifecycle"),
        vec![
            ("broken", "referred"),
            ("audit", "referred"),
            ("broken", "destroyed"),
            ("audit", "destroyed"),
        ]
    );
}

/// 单个监听器失败只记录告警，其余监听器照常收到通知，生命周期转换不受影响。
#[traced_test]
#[test]
fn failing_listener_is_isolated_and_logged() {
    let terminal = CountingInvoker::new("demo.Isolation", address("dubbo://127.0.0.1:20880/demo"));
    let notifier = notifier();

    let listened = notifier
        .on_referenced(as_invoker(&terminal))
        .expect("失败的监听器不影响引用");
    notifier.on_destroyed(&listened);

    assert_eq!(
        events_for("demo.Isolation"),
        vec![
            ("broken", "referred"),
            ("audit", "referred"),
            ("broken", "destroyed"),
            ("audit", "destroyed"),
        ]
    );
    assert!(logs_contain("invoker listener failed in `referred`"));
    assert!(logs_contain("listener exploded on refer"));
    assert!(logs_contain("invoker listener failed in `destroyed`"));
    assert!(logs_contain("listener=broken"));
}

/// 显式名单可以追加未自动激活的监听器，也可以排除自动激活的监听器。
#[test]
fn explicit_listener_list_is_honoured() {
    let terminal = CountingInvoker::new(
        "demo.Explicit",
        address("dubbo://127.0.0.1:20880/demo?invoker.listener=janitor,-broken"),
    );
    let notifier = notifier();

    let listened = notifier
        .on_referenced(as_invoker(&terminal))
        .expect("监听器解析成功");
    assert_eq!(listened.listener_names(), ["audit", "janitor"]);
    notifier.on_destroyed(&listened);

    assert_eq!(
        events_for("demo.Explicit"),
        vec![
            ("audit", "referred"),
            ("audit", "destroyed"),
            ("janitor", "destroyed"),
        ]
    );
}

/// 显式点名未登记的监听器时引用失败，不触发任何回调。
#[test]
fn unknown_listener_fails_reference() {
    let terminal = CountingInvoker::new(
        "demo.Unknown",
        address("dubbo://127.0.0.1:20880/demo?invoker.listener=ghost"),
    );

    let result = notifier().on_referenced(as_invoker(&terminal));

    assert!(matches!(
        result,
        Err(ExtensionError::NotFound { name, .. }) if name == "ghost"
    ));
    assert!(events_for("demo.Unknown").is_empty());
}

/// 带生命周期的 Invoker 透传调用；通过 `Invoker::destroy` 销毁与 `on_destroyed` 等价。
#[test]
fn listened_invoker_delegates_and_destroys_through_trait() {
    let terminal = CountingInvoker::new("demo.Destroy", address("dubbo://127.0.0.1:20880/demo"));
    let notifier = notifier();
    let listened = notifier
        .on_referenced(as_invoker(&terminal))
        .expect("监听器解析成功");

    let mut invocation = call("sayHello");
    let result = block_on(listened.invoke(&mut invocation)).expect("调用成功");
    assert_eq!(result.get_value(), Some(&json!("sayHello")));
    assert!(listened.is_available());

    listened.destroy();

    assert!(!listened.is_available());
    assert!(!notifier.on_destroyed(&listened));
    let destroyed: Vec<_> = events_for("demo.Destroy")
        .into_iter()
        .filter(|(_, event)| *event == "destroyed")
        .collect();
    assert_eq!(destroyed.len(), 2);
}

/// 多个线程同时销毁时，每个监听器仍只收到一次 `destroyed`。
#[test]
fn concurrent_destroy_notifies_once() {
    let terminal = CountingInvoker::new("demo.Concurrent", address("dubbo://127.0.0.1:20880/demo"));
    let notifier = notifier();
    let listened = notifier
        .on_referenced(as_invoker(&terminal))
        .expect("监听器解析成功");

    let barrier = Barrier::new(4);
    let winners = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    notifier.on_destroyed(&listened)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("线程未崩溃"))
            .filter(|won| *won)
            .count()
    });

    assert_eq!(winners, 1);
    assert_eq!(
        events_for("demo.Concurrent")
            .iter()
            .filter(|(_, event)| *event == "destroyed")
            .count(),
        2
    );
}
