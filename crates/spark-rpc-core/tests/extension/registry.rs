use std::{
    sync::{Arc, Barrier, atomic::Ordering},
    thread,
};

use spark_rpc_core::{
    AmbiguityPolicy, ExtensionClass, ExtensionError, ExtensionScope, extension::InlineSource,
};

use super::fixtures::{
    CountingWrapper, Greeter, SLOW_BUILDS, SLOW_WRAPS, SalutationProvider, Slow, address,
    plain_greeters, scope_with,
};

/// 同一名称被 8 个线程同时首次请求时，只构造、注入、包装一次，所有线程拿到同一实例。
#[test]
fn concurrent_first_requests_share_one_instance() {
    let scope = ExtensionScope::builder()
        .point::<dyn Greeter>(|point| {
            point
                .class(ExtensionClass::new::<Slow>("greeter::Slow", |greeter| greeter))
                .class(ExtensionClass::wrapper::<CountingWrapper>(
                    "greeter::Counting",
                    CountingWrapper::new,
                    |greeter| greeter,
                ));
        })
        .source(
            InlineSource::new("race")
                .define::<dyn Greeter>("slow", "greeter::Slow")
                .define::<dyn Greeter>("counting", "greeter::Counting"),
        )
        .build()
        .expect("作用域构造成功");

    let barrier = Barrier::new(8);
    let instances: Vec<Arc<dyn Greeter>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    scope.extension::<dyn Greeter>("slow").expect("slow 可用")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("线程未崩溃"))
            .collect()
    });

    assert_eq!(SLOW_BUILDS.load(Ordering::SeqCst), 1);
    assert_eq!(SLOW_WRAPS.load(Ordering::SeqCst), 1);
    assert!(
        instances
            .windows(2)
            .all(|pair| Arc::ptr_eq(&pair[0], &pair[1]))
    );
    let greeting = instances[0]
        .greet(&address("dubbo://127.0.0.1:20880/demo"), "ann")
        .expect("问候成功");
    assert_eq!(greeting, "slow ann");
}

/// 包装器按描述符顺序套上，最后登记的位于最外层。
#[test]
fn wrappers_apply_in_registration_order() {
    let scope = scope_with(
        plain_greeters()
            .define::<dyn Greeter>("loud", "greeter::Loud")
            .define::<dyn Greeter>("bracket", "greeter::Bracket"),
    );

    let foo = scope.extension::<dyn Greeter>("foo").expect("foo 可用");
    let greeting = foo
        .greet(&address("dubbo://127.0.0.1:20880/demo"), "ann")
        .expect("问候成功");

    assert_eq!(greeting, "[hello ann!]");
    let registry = scope.registry::<dyn Greeter>().expect("注册表存在");
    assert!(!registry.has_extension("loud").expect("装载成功"));
    assert_eq!(
        registry.supported_extensions().expect("装载成功"),
        vec!["bar", "foo"]
    );
}

/// 扩展点类型的属性取自作用域内的自适应实例，普通类型取自外部提供者。
#[test]
fn injection_consults_self_registry_then_external_providers() {
    let provider = SalutationProvider::new(false);
    let scope = ExtensionScope::builder()
        .point::<dyn Greeter>(super::fixtures::greeter_classes)
        .point::<dyn super::fixtures::Locator>(super::fixtures::locator_classes)
        .source(
            InlineSource::new("app")
                .define::<dyn Greeter>("polite", "greeter::Polite")
                .define::<dyn super::fixtures::Locator>("zone", "locator::Zone"),
        )
        .provider(provider.clone())
        .build()
        .expect("作用域构造成功");

    let polite = scope.extension::<dyn Greeter>("polite").expect("polite 可用");
    let greeting = polite
        .greet(&address("dubbo://10.0.0.8:20880/demo?locator=zone"), "ann")
        .expect("问候成功");

    assert_eq!(greeting, "good day ann @ zone:10.0.0.8");
    // 扩展点类型只由自注册提供者回答，外部提供者只看到 `Salutation` 的查找。
    assert_eq!(provider.lookups.load(Ordering::SeqCst), 1);
}

/// 所有提供者都没有结果时属性保持未设置，构造照常完成。
#[test]
fn injection_miss_leaves_property_unset() {
    let scope =
        scope_with(InlineSource::new("app").define::<dyn Greeter>("polite", "greeter::Polite"));

    let polite = scope.extension::<dyn Greeter>("polite").expect("polite 可用");
    let greeting = polite
        .greet(&address("dubbo://127.0.0.1:20880/demo"), "ann")
        .expect("问候成功");

    assert_eq!(greeting, "hi ann");
}

/// 外部提供者报告多候选时，默认策略让实例化失败；`TryNext` 则继续查找并最终留空。
#[test]
fn ambiguous_provider_follows_policy() {
    let build = |policy| {
        ExtensionScope::builder()
            .point::<dyn Greeter>(super::fixtures::greeter_classes)
            .source(InlineSource::new("app").define::<dyn Greeter>("polite", "greeter::Polite"))
            .provider(SalutationProvider::new(true))
            .ambiguity(policy)
            .build()
            .expect("作用域构造成功")
    };

    let strict = build(AmbiguityPolicy::FailFast);
    match strict.extension::<dyn Greeter>("polite") {
        Err(ExtensionError::AmbiguousProvider {
            provider,
            candidates,
            name,
            ..
        }) => {
            assert_eq!(provider, "salutations");
            assert_eq!(candidates, 2);
            assert_eq!(name.as_deref(), Some("salutation"));
        }
        other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
    }
    assert!(
        strict
            .registry::<dyn Greeter>()
            .expect("注册表存在")
            .loaded_extension("polite")
            .is_none()
    );

    let lenient = build(AmbiguityPolicy::TryNext);
    let polite = lenient.extension::<dyn Greeter>("polite").expect("polite 可用");
    assert_eq!(
        polite
            .greet(&address("dubbo://127.0.0.1:20880/demo"), "ann")
            .expect("问候成功"),
        "hi ann"
    );
}

/// 自省接口：默认名、`"true"` 别名、已缓存实例与未知名称。
#[test]
fn introspection_reports_names_and_cached_instances() {
    let scope = scope_with(plain_greeters());
    let registry = scope.registry::<dyn Greeter>().expect("注册表存在");

    assert_eq!(registry.point_name(), "greeter");
    assert_eq!(registry.default_name(), Some("foo"));
    assert!(registry.has_extension("bar").expect("装载成功"));
    assert!(registry.loaded_extension("foo").is_none());

    let by_alias = registry.extension("true").expect("默认别名可用");
    let default = registry
        .default_extension()
        .expect("装载成功")
        .expect("声明了默认名");
    assert!(Arc::ptr_eq(&by_alias, &default));
    assert!(registry.loaded_extension("foo").is_some());

    assert_eq!(
        registry.extension("missing").map(|_| ()),
        Err(ExtensionError::NotFound {
            point: "greeter".to_owned(),
            name: "missing".to_owned(),
        })
    );
    assert!(matches!(
        registry.extension(""),
        Err(ExtensionError::NotFound { .. })
    ));
}

/// 未在作用域中登记的扩展点类型返回 `UnknownPoint`。
#[test]
fn unregistered_point_is_reported() {
    let scope = ExtensionScope::builder()
        .point::<dyn Greeter>(super::fixtures::greeter_classes)
        .build()
        .expect("作用域构造成功");

    assert!(matches!(
        scope.registry::<dyn super::fixtures::Locator>(),
        Err(ExtensionError::UnknownPoint { point }) if point == "locator"
    ));
}

/// 同一实现标识登记两次时构造失败。
#[test]
fn duplicate_identifier_is_rejected_at_build() {
    let result = ExtensionScope::builder()
        .point::<dyn Greeter>(super::fixtures::greeter_classes)
        .point::<dyn Greeter>(|point| {
            point.class(ExtensionClass::new::<super::fixtures::Foo>(
                "greeter::Foo",
                |greeter| greeter,
            ));
        })
        .build();

    assert!(matches!(result, Err(ExtensionError::Load { point, .. }) if point == "greeter"));
}

/// 销毁后作用域、已取得的注册表句柄与自适应实例都拒绝继续工作；重复销毁无副作用。
#[test]
fn destroyed_scope_rejects_every_access() {
    let scope = scope_with(plain_greeters());
    let registry = scope.registry::<dyn Greeter>().expect("注册表存在");
    let adaptive = scope
        .adaptive_extension::<dyn Greeter>()
        .expect("自适应实例可用");
    registry.extension("foo").expect("foo 可用");

    scope.destroy();
    scope.destroy();

    assert!(scope.is_destroyed());
    assert!(matches!(
        scope.extension::<dyn Greeter>("foo"),
        Err(ExtensionError::ScopeDestroyed)
    ));
    assert!(matches!(
        registry.extension("foo"),
        Err(ExtensionError::ScopeDestroyed)
    ));
    assert!(registry.loaded_extension("foo").is_none());
    assert_eq!(
        adaptive.greet(&address("dubbo://127.0.0.1:20880/demo"), "ann"),
        Err(ExtensionError::ScopeDestroyed)
    );
    assert_eq!(scope.preload(), Err(ExtensionError::ScopeDestroyed));
}
