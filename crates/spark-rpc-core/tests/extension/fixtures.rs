//! 扩展点测试夹具：问候器、定位器、传输器三个扩展点及其实现。

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use spark_rpc_core::{
    CallAddress, ExtensionClass, ExtensionPoint, ExtensionResult, Injectable, Injector,
    extension::{AdaptiveDispatcher, ExtensionScope, InlineSource, PointSetup},
    provider::{LookupOutcome, LookupRequest, ObjectProvider, ProvidedObject, TypeKey},
};

/// 带默认实现与自适应派发的扩展点。
pub trait Greeter: Send + Sync {
    fn greet(&self, address: &CallAddress, who: &str) -> ExtensionResult<String>;
}

impl ExtensionPoint for dyn Greeter {
    const NAME: &'static str = "greeter";
    const DEFAULT: Option<&'static str> = Some("foo");
    const ADAPTIVE_KEYS: &'static [&'static str] = &["greeter"];

    fn adaptive(dispatcher: AdaptiveDispatcher<Self>) -> Option<Arc<Self>> {
        Some(Arc::new(AdaptiveGreeter { dispatcher }))
    }
}

struct AdaptiveGreeter {
    dispatcher: AdaptiveDispatcher<dyn Greeter>,
}

impl Greeter for AdaptiveGreeter {
    fn greet(&self, address: &CallAddress, who: &str) -> ExtensionResult<String> {
        self.dispatcher
            .resolve_for_method(address, "greet")?
            .greet(address, who)
    }
}

#[derive(Default)]
pub struct Foo;

impl Injectable for Foo {}

impl Greeter for Foo {
    fn greet(&self, _: &CallAddress, who: &str) -> ExtensionResult<String> {
        Ok(format!("hello {who}"))
    }
}

#[derive(Default)]
pub struct Bar;

impl Injectable for Bar {}

impl Greeter for Bar {
    fn greet(&self, _: &CallAddress, who: &str) -> ExtensionResult<String> {
        Ok(format!("bar {who}"))
    }
}

/// 外部容器提供的普通类型。
pub struct Salutation(pub &'static str);

/// 需要注入的实现：`salutation` 来自外部提供者，`locator` 来自自注册提供者。
#[derive(Default)]
pub struct Polite {
    salutation: Option<Arc<Salutation>>,
    locator: Option<Arc<dyn Locator>>,
}

impl Injectable for Polite {
    fn inject(&mut self, injector: &Injector<'_>) -> ExtensionResult<()> {
        if let Some(salutation) = injector.resolve::<Salutation>("salutation")? {
            self.salutation = Some(salutation);
        }
        if let Some(locator) = injector.resolve::<dyn Locator>("locator")? {
            self.locator = Some(locator);
        }
        Ok(())
    }
}

impl Greeter for Polite {
    fn greet(&self, address: &CallAddress, who: &str) -> ExtensionResult<String> {
        let salutation = self.salutation.as_ref().map_or("hi", |s| s.0);
        match &self.locator {
            Some(locator) => Ok(format!("{salutation} {who} @ {}", locator.locate(address)?)),
            None => Ok(format!("{salutation} {who}")),
        }
    }
}

pub struct Loud {
    inner: Arc<dyn Greeter>,
}

impl Loud {
    pub fn new(inner: Arc<dyn Greeter>) -> Self {
        Self { inner }
    }
}

impl Injectable for Loud {}

impl Greeter for Loud {
    fn greet(&self, address: &CallAddress, who: &str) -> ExtensionResult<String> {
        Ok(format!("{}!", self.inner.greet(address, who)?))
    }
}

pub struct Bracket {
    inner: Arc<dyn Greeter>,
}

impl Bracket {
    pub fn new(inner: Arc<dyn Greeter>) -> Self {
        Self { inner }
    }
}

impl Injectable for Bracket {}

impl Greeter for Bracket {
    fn greet(&self, address: &CallAddress, who: &str) -> ExtensionResult<String> {
        Ok(format!("[{}]", self.inner.greet(address, who)?))
    }
}

/// 只在并发测试中使用的计数实现与包装器。
pub static SLOW_BUILDS: AtomicUsize = AtomicUsize::new(0);
pub static SLOW_WRAPS: AtomicUsize = AtomicUsize::new(0);

pub struct Slow;

impl Default for Slow {
    fn default() -> Self {
        SLOW_BUILDS.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        Slow
    }
}

impl Injectable for Slow {}

impl Greeter for Slow {
    fn greet(&self, _: &CallAddress, who: &str) -> ExtensionResult<String> {
        Ok(format!("slow {who}"))
    }
}

pub struct CountingWrapper {
    inner: Arc<dyn Greeter>,
}

impl CountingWrapper {
    pub fn new(inner: Arc<dyn Greeter>) -> Self {
        SLOW_WRAPS.fetch_add(1, Ordering::SeqCst);
        Self { inner }
    }
}

impl Injectable for CountingWrapper {}

impl Greeter for CountingWrapper {
    fn greet(&self, address: &CallAddress, who: &str) -> ExtensionResult<String> {
        self.inner.greet(address, who)
    }
}

/// 登记问候器的普通实现与两个包装器。
pub fn greeter_classes(point: &mut PointSetup<dyn Greeter>) {
    point
        .class(ExtensionClass::new::<Foo>("greeter::Foo", |greeter| greeter))
        .class(ExtensionClass::new::<Bar>("greeter::Bar", |greeter| greeter))
        .class(ExtensionClass::new::<Polite>("greeter::Polite", |greeter| greeter))
        .class(ExtensionClass::wrapper::<Loud>("greeter::Loud", Loud::new, |greeter| greeter))
        .class(ExtensionClass::wrapper::<Bracket>(
            "greeter::Bracket",
            Bracket::new,
            |greeter| greeter,
        ));
}

/// 有自适应派发但没有默认实现的扩展点。
pub trait Locator: Send + Sync {
    fn locate(&self, address: &CallAddress) -> ExtensionResult<String>;
}

impl ExtensionPoint for dyn Locator {
    const NAME: &'static str = "locator";
    const ADAPTIVE_KEYS: &'static [&'static str] = &["locator"];

    fn adaptive(dispatcher: AdaptiveDispatcher<Self>) -> Option<Arc<Self>> {
        Some(Arc::new(AdaptiveLocator { dispatcher }))
    }
}

struct AdaptiveLocator {
    dispatcher: AdaptiveDispatcher<dyn Locator>,
}

impl Locator for AdaptiveLocator {
    fn locate(&self, address: &CallAddress) -> ExtensionResult<String> {
        self.dispatcher.resolve(address)?.locate(address)
    }
}

#[derive(Default)]
pub struct Zone;

impl Injectable for Zone {}

impl Locator for Zone {
    fn locate(&self, address: &CallAddress) -> ExtensionResult<String> {
        Ok(format!("zone:{}", address.host()))
    }
}

/// 描述符登记的手写自适应实现。
#[derive(Default)]
pub struct ManualLocator;

impl Injectable for ManualLocator {}

impl Locator for ManualLocator {
    fn locate(&self, _: &CallAddress) -> ExtensionResult<String> {
        Ok("manual".to_owned())
    }
}

pub fn locator_classes(point: &mut PointSetup<dyn Locator>) {
    point
        .class(ExtensionClass::new::<Zone>("locator::Zone", |locator| locator))
        .class(ExtensionClass::adaptive::<ManualLocator>(
            "locator::Manual",
            |locator| locator,
        ));
}

/// 以地址协议作为第二个派发键的扩展点。
pub trait Transporter: Send + Sync {
    fn connect(&self, address: &CallAddress) -> ExtensionResult<&'static str>;
}

impl ExtensionPoint for dyn Transporter {
    const NAME: &'static str = "transporter";
    const ADAPTIVE_KEYS: &'static [&'static str] = &["transporter", "protocol"];

    fn adaptive(dispatcher: AdaptiveDispatcher<Self>) -> Option<Arc<Self>> {
        Some(Arc::new(AdaptiveTransporter { dispatcher }))
    }
}

struct AdaptiveTransporter {
    dispatcher: AdaptiveDispatcher<dyn Transporter>,
}

impl Transporter for AdaptiveTransporter {
    fn connect(&self, address: &CallAddress) -> ExtensionResult<&'static str> {
        self.dispatcher.resolve(address)?.connect(address)
    }
}

#[derive(Default)]
pub struct Tcp;

impl Injectable for Tcp {}

impl Transporter for Tcp {
    fn connect(&self, _: &CallAddress) -> ExtensionResult<&'static str> {
        Ok("tcp")
    }
}

#[derive(Default)]
pub struct Quic;

impl Injectable for Quic {}

impl Transporter for Quic {
    fn connect(&self, _: &CallAddress) -> ExtensionResult<&'static str> {
        Ok("quic")
    }
}

pub fn transporter_classes(point: &mut PointSetup<dyn Transporter>) {
    point
        .class(ExtensionClass::new::<Tcp>("transporter::Tcp", |t| t))
        .class(ExtensionClass::new::<Quic>("transporter::Quic", |t| t));
}

/// 外部提供者：按名称提供 [`Salutation`]，可配置为返回多候选。
pub struct SalutationProvider {
    pub ambiguous: bool,
    pub lookups: AtomicUsize,
}

impl SalutationProvider {
    pub fn new(ambiguous: bool) -> Arc<Self> {
        Arc::new(Self {
            ambiguous,
            lookups: AtomicUsize::new(0),
        })
    }
}

impl ObjectProvider for SalutationProvider {
    fn name(&self) -> &str {
        "salutations"
    }

    fn lookup(&self, request: &LookupRequest<'_>) -> LookupOutcome {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if request.type_key() != TypeKey::of::<Salutation>() {
            return LookupOutcome::NotFound;
        }
        if self.ambiguous {
            return LookupOutcome::Ambiguous { candidates: 2 };
        }
        LookupOutcome::Found(ProvidedObject::new(Arc::new(Salutation("good day"))))
    }
}

pub fn address(raw: &str) -> CallAddress {
    CallAddress::parse(raw).expect("测试地址合法")
}

/// 登记全部测试扩展点并挂上给定来源。
pub fn scope_with(source: InlineSource) -> ExtensionScope {
    ExtensionScope::builder()
        .point::<dyn Greeter>(greeter_classes)
        .point::<dyn Locator>(locator_classes)
        .point::<dyn Transporter>(transporter_classes)
        .source(source)
        .build()
        .expect("作用域构造成功")
}

/// 只含 `foo`、`bar` 两个普通问候器的来源。
pub fn plain_greeters() -> InlineSource {
    InlineSource::new("plain")
        .define::<dyn Greeter>("foo", "greeter::Foo")
        .define::<dyn Greeter>("bar", "greeter::Bar")
}
