use std::sync::Arc;

use spark_rpc_core::{
    ExtensionError, ExtensionPoint, ExtensionScope, extension::InlineSource,
};

use super::fixtures::{Greeter, Locator, Transporter, address, plain_greeters, scope_with};

/// 地址携带 `greeter=bar` 时派发到 `bar`；缺少该键时回退到默认的 `foo`。
#[test]
fn dispatches_on_address_key_then_default() {
    let scope = scope_with(plain_greeters());
    let adaptive = scope
        .adaptive_extension::<dyn Greeter>()
        .expect("自适应实例可用");

    let to_bar = adaptive
        .greet(&address("dubbo://127.0.0.1:20880/demo?greeter=bar"), "ann")
        .expect("派发成功");
    let to_default = adaptive
        .greet(&address("dubbo://127.0.0.1:20880/demo"), "ann")
        .expect("派发成功");

    assert_eq!(to_bar, "bar ann");
    assert_eq!(to_default, "hello ann");
    let again = scope
        .adaptive_extension::<dyn Greeter>()
        .expect("自适应实例可用");
    assert!(Arc::ptr_eq(&adaptive, &again));
}

/// 方法级参数 `greet.greeter` 优先于接口级参数。
#[test]
fn method_scoped_parameter_wins() {
    let scope = scope_with(plain_greeters());
    let adaptive = scope
        .adaptive_extension::<dyn Greeter>()
        .expect("自适应实例可用");

    let greeting = adaptive
        .greet(
            &address("dubbo://127.0.0.1:20880/demo?greeter=foo&greet.greeter=bar"),
            "ann",
        )
        .expect("派发成功");

    assert_eq!(greeting, "bar ann");
}

/// 既无参数又无默认名时，取得自适应实例成功，调用时才报告 `NoMatchingExtension`。
#[test]
fn unresolvable_dispatch_fails_only_on_invoke() {
    let scope = scope_with(InlineSource::new("app").define::<dyn Locator>("zone", "locator::Zone"));
    let adaptive = scope
        .adaptive_extension::<dyn Locator>()
        .expect("取得自适应实例不依赖地址");

    assert_eq!(
        adaptive.locate(&address("dubbo://127.0.0.1:20880/demo")),
        Err(ExtensionError::NoMatchingExtension {
            point: "locator".to_owned(),
            keys: vec!["locator".to_owned()],
            method: None,
        })
    );
    assert_eq!(
        adaptive
            .locate(&address("dubbo://10.1.1.1:20880/demo?locator=zone"))
            .expect("派发成功"),
        "zone:10.1.1.1"
    );
}

/// 参数指向未登记的名称时返回 `NotFound`，而不是回退到默认实现。
#[test]
fn unknown_name_in_address_is_not_found() {
    let scope = scope_with(plain_greeters());
    let adaptive = scope
        .adaptive_extension::<dyn Greeter>()
        .expect("自适应实例可用");

    assert!(matches!(
        adaptive.greet(&address("dubbo://127.0.0.1:20880/demo?greeter=baz"), "ann"),
        Err(ExtensionError::NotFound { name, .. }) if name == "baz"
    ));
}

/// `protocol` 键读取地址协议；显式参数键排在它之前。
#[test]
fn protocol_key_reads_address_scheme() {
    let scope = scope_with(
        InlineSource::new("app")
            .define::<dyn Transporter>("tcp", "transporter::Tcp")
            .define::<dyn Transporter>("quic", "transporter::Quic"),
    );
    let adaptive = scope
        .adaptive_extension::<dyn Transporter>()
        .expect("自适应实例可用");

    assert_eq!(
        adaptive
            .connect(&address("quic://127.0.0.1:443/demo"))
            .expect("派发成功"),
        "quic"
    );
    assert_eq!(
        adaptive
            .connect(&address("quic://127.0.0.1:443/demo?transporter=tcp"))
            .expect("派发成功"),
        "tcp"
    );
}

/// 描述符登记的手写自适应类优先于生成的派发器。
#[test]
fn registered_adaptive_class_takes_precedence() {
    let scope = scope_with(
        InlineSource::new("app")
            .define::<dyn Locator>("zone", "locator::Zone")
            .define::<dyn Locator>("manual", "locator::Manual"),
    );
    let adaptive = scope
        .adaptive_extension::<dyn Locator>()
        .expect("自适应实例可用");

    assert_eq!(
        adaptive
            .locate(&address("dubbo://127.0.0.1:20880/demo?locator=zone"))
            .expect("手写实现不派发"),
        "manual"
    );
    let registry = scope.registry::<dyn Locator>().expect("注册表存在");
    assert_eq!(registry.supported_extensions().expect("装载成功"), vec!["zone"]);
}

trait Stamp: Send + Sync {}

impl ExtensionPoint for dyn Stamp {
    const NAME: &'static str = "stamp";
}

/// 既没有手写自适应类、也没有派发器的扩展点返回 `AdaptiveUnavailable`。
#[test]
fn point_without_adaptive_support_is_reported() {
    let scope = ExtensionScope::builder()
        .point::<dyn Stamp>(|_| {})
        .build()
        .expect("作用域构造成功");

    assert!(matches!(
        scope.adaptive_extension::<dyn Stamp>(),
        Err(ExtensionError::AdaptiveUnavailable { point }) if point == "stamp"
    ));
}
