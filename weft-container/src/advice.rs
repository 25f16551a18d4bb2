//! Advice weaving — cross-cutting behavior around method invocations.
//!
//! Proxies are explicit decorator types: a wrapper implements the same
//! capability trait as its target and routes every call through
//! [`AdviceEngine::invoke`], passing an [`Invocation`] descriptor and a
//! proceed closure that runs the real method. No runtime code generation
//! is involved; pointcuts are plain data evaluated per call.
//!
//! # Ordering
//! When several advices match one invocation:
//! all `before` (registration order) → target, wrapped by any `around`
//! (first registered outermost) → `after_returning` / `after_throwing`
//! (registration order) → `after` (registration order).
//! A `before` error skips the target, `after` and `after_returning`;
//! `after_throwing` still sees it. An `around` fully controls the
//! target: not calling proceed skips it, calling it twice runs it twice.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::BoxError;

/// Outcome of (the rest of) an intercepted method invocation.
///
/// The return value is type-erased so one engine serves every method
/// signature; [`downcast_return`] recovers the concrete type.
pub type MethodResult = std::result::Result<Box<dyn Any + Send>, BoxError>;

/// Recovers a typed return value from a [`MethodResult`].
///
/// # Errors
/// Propagates the invocation error, or reports a mismatch when the
/// proxy and target disagree about the return type.
pub fn downcast_return<R: 'static>(result: MethodResult) -> std::result::Result<R, BoxError> {
    result.and_then(|boxed| {
        boxed
            .downcast::<R>()
            .map(|b| *b)
            .map_err(|_| BoxError::from("advice return type mismatch"))
    })
}

/// Describes one proxied method invocation.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    target: &'a str,
    method: &'a str,
    tags: &'a [&'a str],
}

impl<'a> Invocation<'a> {
    /// `target` is the bean's short type name, `method` the method name.
    pub fn new(target: &'a str, method: &'a str) -> Self {
        Self {
            target,
            method,
            tags: &[],
        }
    }

    /// Attaches marker tags, the data equivalent of marker annotations.
    pub fn with_tags(mut self, tags: &'a [&'a str]) -> Self {
        self.tags = tags;
        self
    }

    pub fn target(&self) -> &str {
        self.target
    }

    pub fn method(&self) -> &str {
        self.method
    }

    pub fn tags(&self) -> &[&str] {
        self.tags
    }

    /// `Target::method`, for log lines.
    pub fn signature(&self) -> String {
        format!("{}::{}", self.target, self.method)
    }
}

/// Selects which invocations an advice applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pointcut {
    /// Matches target type name and method name, `*` wildcards allowed.
    Execution {
        type_pattern: String,
        method_pattern: String,
    },
    /// Matches any invocation carrying the tag.
    Tag(String),
}

impl Pointcut {
    /// `Pointcut::execution("UserService", "*")` matches every method
    /// of `UserService`.
    pub fn execution(type_pattern: impl Into<String>, method_pattern: impl Into<String>) -> Self {
        Pointcut::Execution {
            type_pattern: type_pattern.into(),
            method_pattern: method_pattern.into(),
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Pointcut::Tag(tag.into())
    }

    pub fn matches(&self, invocation: &Invocation<'_>) -> bool {
        match self {
            Pointcut::Execution {
                type_pattern,
                method_pattern,
            } => {
                wildcard_match(type_pattern, invocation.target())
                    && wildcard_match(method_pattern, invocation.method())
            }
            Pointcut::Tag(tag) => invocation.tags().contains(&tag.as_str()),
        }
    }
}

/// `*` matches any run of characters, everything else matches literally.
fn wildcard_match(pattern: &str, input: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let input: Vec<char> = input.chars().collect();

    let (mut p, mut i) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while i < input.len() {
        if p < pattern.len() && (pattern[p] == input[i]) {
            p += 1;
            i += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, i));
            p += 1;
        } else if let Some((star_p, star_i)) = star {
            // Backtrack: let the last '*' swallow one more character
            p = star_p + 1;
            i = star_i + 1;
            star = Some((star_p, star_i + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Handle an `around` advice uses to run the rest of the invocation.
///
/// Not calling [`proceed`](Proceed::proceed) skips the target entirely;
/// calling it more than once re-executes it.
pub struct Proceed<'a> {
    inner: &'a mut dyn FnMut() -> MethodResult,
}

impl Proceed<'_> {
    pub fn proceed(&mut self) -> MethodResult {
        (self.inner)()
    }
}

type BeforeFn = Arc<dyn Fn(&Invocation<'_>) -> std::result::Result<(), BoxError> + Send + Sync>;
type AfterFn = Arc<dyn Fn(&Invocation<'_>) + Send + Sync>;
type AfterReturningFn = Arc<dyn Fn(&Invocation<'_>, &(dyn Any + Send)) + Send + Sync>;
type AfterThrowingFn = Arc<dyn Fn(&Invocation<'_>, &BoxError) + Send + Sync>;
type AroundFn = Arc<dyn Fn(&Invocation<'_>, &mut Proceed<'_>) -> MethodResult + Send + Sync>;

enum Handler {
    Before(BeforeFn),
    After(AfterFn),
    AfterReturning(AfterReturningFn),
    AfterThrowing(AfterThrowingFn),
    Around(AroundFn),
}

/// The kind of an advice, in invocation-order terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceKind {
    Before,
    After,
    AfterReturning,
    AfterThrowing,
    Around,
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdviceKind::Before => write!(f, "before"),
            AdviceKind::After => write!(f, "after"),
            AdviceKind::AfterReturning => write!(f, "after_returning"),
            AdviceKind::AfterThrowing => write!(f, "after_throwing"),
            AdviceKind::Around => write!(f, "around"),
        }
    }
}

/// One unit of cross-cutting behavior: a pointcut plus a handler.
pub struct Advice {
    pointcut: Pointcut,
    handler: Handler,
}

impl Advice {
    /// Runs before the target; an error prevents the target from running.
    pub fn before(
        pointcut: Pointcut,
        f: impl Fn(&Invocation<'_>) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            pointcut,
            handler: Handler::Before(Arc::new(f)),
        }
    }

    /// Runs after the target, whether it returned or failed.
    pub fn after(pointcut: Pointcut, f: impl Fn(&Invocation<'_>) + Send + Sync + 'static) -> Self {
        Self {
            pointcut,
            handler: Handler::After(Arc::new(f)),
        }
    }

    /// Runs only when the target returned normally.
    pub fn after_returning(
        pointcut: Pointcut,
        f: impl Fn(&Invocation<'_>, &(dyn Any + Send)) + Send + Sync + 'static,
    ) -> Self {
        Self {
            pointcut,
            handler: Handler::AfterReturning(Arc::new(f)),
        }
    }

    /// Runs only when the target (or a `before` advice) failed.
    pub fn after_throwing(
        pointcut: Pointcut,
        f: impl Fn(&Invocation<'_>, &BoxError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            pointcut,
            handler: Handler::AfterThrowing(Arc::new(f)),
        }
    }

    /// Fully controls the target through the [`Proceed`] handle.
    pub fn around(
        pointcut: Pointcut,
        f: impl Fn(&Invocation<'_>, &mut Proceed<'_>) -> MethodResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            pointcut,
            handler: Handler::Around(Arc::new(f)),
        }
    }

    pub fn kind(&self) -> AdviceKind {
        match self.handler {
            Handler::Before(_) => AdviceKind::Before,
            Handler::After(_) => AdviceKind::After,
            Handler::AfterReturning(_) => AdviceKind::AfterReturning,
            Handler::AfterThrowing(_) => AdviceKind::AfterThrowing,
            Handler::Around(_) => AdviceKind::Around,
        }
    }

    pub fn pointcut(&self) -> &Pointcut {
        &self.pointcut
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advice")
            .field("kind", &self.kind())
            .field("pointcut", &self.pointcut)
            .finish()
    }
}

/// Dispatches matched advice around proxied method invocations.
///
/// Registration order is preserved and determines execution order
/// within each kind.
#[derive(Default)]
pub struct AdviceEngine {
    advices: Vec<Advice>,
}

impl AdviceEngine {
    pub fn new(advices: Vec<Advice>) -> Self {
        Self { advices }
    }

    /// An engine with no advice; `invoke` degenerates to the target call.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.advices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advices.is_empty()
    }

    /// Runs a proxied invocation through all matching advice.
    pub fn invoke(
        &self,
        invocation: &Invocation<'_>,
        mut target: impl FnMut() -> MethodResult,
    ) -> MethodResult {
        let matched: Vec<&Advice> = self
            .advices
            .iter()
            .filter(|advice| advice.pointcut.matches(invocation))
            .collect();

        if matched.is_empty() {
            return target();
        }

        trace!(
            signature = %invocation.signature(),
            matched = matched.len(),
            "Dispatching advice"
        );

        for advice in &matched {
            if let Handler::Before(before) = &advice.handler {
                if let Err(error) = before(invocation) {
                    for advice in &matched {
                        if let Handler::AfterThrowing(after_throwing) = &advice.handler {
                            after_throwing(invocation, &error);
                        }
                    }
                    return Err(error);
                }
            }
        }

        let arounds: Vec<&AroundFn> = matched
            .iter()
            .filter_map(|advice| match &advice.handler {
                Handler::Around(around) => Some(around),
                _ => None,
            })
            .collect();

        let outcome = run_around_chain(&arounds, invocation, &mut target);

        match &outcome {
            Ok(value) => {
                for advice in &matched {
                    if let Handler::AfterReturning(after_returning) = &advice.handler {
                        after_returning(invocation, value.as_ref());
                    }
                }
            }
            Err(error) => {
                for advice in &matched {
                    if let Handler::AfterThrowing(after_throwing) = &advice.handler {
                        after_throwing(invocation, error);
                    }
                }
            }
        }

        for advice in &matched {
            if let Handler::After(after) = &advice.handler {
                after(invocation);
            }
        }

        outcome
    }
}

impl fmt::Debug for AdviceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceEngine")
            .field("advices", &self.advices.len())
            .finish()
    }
}

/// Nests `around` advices, first registered outermost, target innermost.
fn run_around_chain(
    arounds: &[&AroundFn],
    invocation: &Invocation<'_>,
    target: &mut dyn FnMut() -> MethodResult,
) -> MethodResult {
    match arounds.split_first() {
        None => target(),
        Some((outer, rest)) => {
            let mut next = || run_around_chain(rest, invocation, &mut *target);
            let mut proceed = Proceed { inner: &mut next };
            outer(invocation, &mut proceed)
        }
    }
}
