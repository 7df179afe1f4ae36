//! 弹性模块：带指数退避与抖动的有界重试调用器。
//!
//! # Resilience Module
//!
//! Completion services fail transiently: networks drop, providers rate-limit,
//! and models occasionally return nothing. [`RetryingInvoker`] wraps a
//! [`CompletionService`](crate::provider::CompletionService) and turns those
//! failures into a bounded number of attempts.
//!
//! | Failure | Handling |
//! |---------|----------|
//! | network, timeout, rate limit, 5xx, malformed/empty body | retried with backoff |
//! | authentication, permission | fail on first attempt, `InvocationErrorKind::Configuration` |
//! | bad request, unknown model, request too large | fail on first attempt, `InvocationErrorKind::Rejected` |
//! | attempts exhausted | `InvocationErrorKind::Exhausted` with the last cause |
//!
//! Delay before retry `i` is `min(base * 2^i, max) + jitter`, where jitter is
//! uniform in `[0, max_jitter]`. A server `retry-after` hint replaces the
//! exponential term. Every attempt is bounded by the request timeout, so an
//! invocation always terminates.

mod retry;

pub use retry::{InvocationRequest, RetryPolicy, RetryState, RetryingInvoker};
