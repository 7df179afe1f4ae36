//! 响应缓存模块：按提示词与模型缓存原始回复文本，避免重复调用。
//!
//! # Response Cache Module
//!
//! Generation requests are expensive and slow, so raw response text is kept
//! under a key derived from the exact prompt and model id. A later identical
//! request is answered from the store without touching the provider.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`KeyDeriver`] | Deterministic `(prompt, model)` → [`CacheKey`] |
//! | [`ResponseCache`] | Best-effort get/set with statistics |
//! | [`CacheBackend`] | Trait for storage backends |
//! | [`DiskCache`] | One file per key, survives restarts |
//! | [`MemoryCache`] | In-process LRU |
//! | [`NullCache`] | Stores nothing |
//!
//! ## Example
//!
//! ```rust,no_run
//! use smartstudy::cache::{KeyDeriver, ResponseCache};
//!
//! # async fn demo() {
//! let cache = ResponseCache::disk("./response_cache");
//! let key = KeyDeriver::new().derive("Explain recursion", "llama-3.3-70b-versatile");
//! if cache.get(&key).await.is_none() {
//!     cache.set(&key, "Recursion is ...").await;
//! }
//! # }
//! ```
//!
//! Entries never expire; [`ResponseCache::clear`] is the only eviction for
//! the disk backend.

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, CacheEntry, DiskCache, MemoryCache, NullCache};
pub use key::{CacheKey, KeyDeriver};
pub use manager::{CacheConfig, CacheStats, ResponseCache};
