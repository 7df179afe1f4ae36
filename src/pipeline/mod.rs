//! 流水线模块：缓存查询、带重试的调用、解析与缓存回填的组合。
//!
//! # Generation Pipeline
//!
//! ```text
//! CheckCache ──hit──► Parse ─────────────────────────► Return
//!     │
//!    miss ──► Invoke (retry) ──ok──► Parse ──► StoreCache ──► Return
//!                  │
//!                failed ──► fallback record + InvocationError ──► Return
//! ```
//!
//! With `use_cache = false` both cache steps are skipped. Raw text is cached,
//! never the parsed record. Identical concurrent misses are not coalesced:
//! each one invokes and writes the same value.

mod orchestrator;
mod request;

pub use orchestrator::{InvocationDefaults, PipelineOrchestrator};
pub use request::{PipelineOutcome, PipelineRequest, Prompt, TextOutcome};
