//! Basic example of the Weft bean container.
//!
//! Wires an SMTP-flavored application: configuration placeholders,
//! a trait-bound mail service behind a logging advice proxy, qualified
//! zone beans and a prototype scratch buffer.

use std::any::Any;
use std::result::Result;
use std::sync::Arc;

use weft_container::prelude::*;

// === Configuration bean ===

#[derive(Default)]
struct SmtpConfig {
    host: String,
    port: u16,
}

// === Mail service behind a trait ===

trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str) -> Result<(), BoxError>;
}

struct SmtpMailer {
    config: Option<Arc<SmtpConfig>>,
}

impl SmtpMailer {
    fn deliver(&self, to: &str, subject: &str) -> Result<(), BoxError> {
        let config = self.config.as_ref().ok_or("mailer not wired")?;
        println!(
            "[smtp {}:{}] sending {subject:?} to {to}",
            config.host, config.port
        );
        Ok(())
    }
}

/// Advice-aware proxy: every `send` call routes through the engine.
struct MailerProxy {
    inner: Arc<SmtpMailer>,
    engine: Arc<AdviceEngine>,
}

impl Mailer for MailerProxy {
    fn send(&self, to: &str, subject: &str) -> Result<(), BoxError> {
        let invocation = Invocation::new("SmtpMailer", "send").with_tags(&["metric"]);
        let inner = self.inner.clone();
        let (to, subject) = (to.to_string(), subject.to_string());
        let result = self.engine.invoke(&invocation, move || {
            inner.deliver(&to, &subject)?;
            Ok(Box::new(()) as Box<dyn Any + Send>)
        });
        downcast_return::<()>(result)
    }
}

// === Qualified zone beans ===

struct Zone(&'static str);

// === A consumer pulling it all together ===

#[derive(Default)]
struct UserService {
    mailer: Option<Arc<dyn Mailer>>,
    zone: Option<Arc<Zone>>,
}

impl UserService {
    fn register(&self, email: &str) -> Result<(), BoxError> {
        let zone = self.zone.as_ref().ok_or("zone not wired")?;
        println!("registering {email} in zone {}", zone.0);
        self.mailer
            .as_ref()
            .ok_or("mailer not wired")?
            .send(email, "welcome aboard")
    }
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter("weft=debug")
        .init();

    let container = Container::builder()
        .property_source(MapPropertySource::parse(
            "app",
            "# mail settings\nsmtp.host = smtp.example.com\n",
        ))
        .property_source(EnvPropertySource)
        // Logs every mailer call before it runs.
        .advice(Advice::before(
            Pointcut::execution("SmtpMailer", "*"),
            |invocation| {
                println!(">> entering {}", invocation.signature());
                Ok(())
            },
        ))
        // Measures every invocation tagged "metric", wherever it lives.
        .advice(Advice::around(
            Pointcut::tag("metric"),
            |invocation, proceed| {
                let started = std::time::Instant::now();
                let result = proceed.proceed();
                println!("<< {} took {:?}", invocation.signature(), started.elapsed());
                result
            },
        ))
        .bean(
            BeanDefinition::builder::<SmtpConfig>("smtpConfig")
                .construct(SmtpConfig::default)
                .value("host", "${smtp.host}", |c: &mut SmtpConfig, v: String| {
                    c.host = v
                })
                .value("port", "${smtp.port:25}", |c: &mut SmtpConfig, v: u16| {
                    c.port = v
                })
                .expose_properties(|c: &SmtpConfig, name| match name {
                    "host" => Some(c.host.clone()),
                    "port" => Some(c.port.to_string()),
                    _ => None,
                }),
        )
        .bean(
            BeanDefinition::builder::<SmtpMailer>("mailService")
                .construct(|| SmtpMailer { config: None })
                .inject("config", |m: &mut SmtpMailer, c: Arc<SmtpConfig>| {
                    m.config = Some(c)
                })
                .bind_with_advice(|inner: Arc<SmtpMailer>, engine| {
                    Arc::new(MailerProxy { inner, engine }) as Arc<dyn Mailer>
                }),
        )
        .bean(
            BeanDefinition::builder::<Zone>("zoneParis")
                .qualifier("paris")
                .primary()
                .construct(|| Zone("UTC+01:00")),
        )
        .bean(
            BeanDefinition::builder::<Zone>("zoneTokyo")
                .qualifier("tokyo")
                .construct(|| Zone("UTC+09:00")),
        )
        .bean(
            BeanDefinition::builder::<UserService>("userService")
                .construct(UserService::default)
                .inject("mailer", |s: &mut UserService, m: Arc<dyn Mailer>| {
                    s.mailer = Some(m)
                })
                .inject("zone", |s: &mut UserService, z: Arc<Zone>| {
                    s.zone = Some(z)
                }),
        )
        .build()?;

    let service: Arc<UserService> = container.get_instance()?;
    service.register("ada@example.com")?;

    let tokyo: Arc<Zone> = container.get_qualified("tokyo")?;
    println!("tokyo zone: {}", tokyo.0);

    container.shutdown();
    Ok(())
}
