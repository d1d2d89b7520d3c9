//! `svm-runtime`: host-side binding to the SVM execution engine.
//!
//! The engine is reached through the [`Engine`] trait, a one-to-one image
//! of its C ABI. On top of it this crate provides:
//!
//! - **Adapter:** copy-then-free handling of the engine's uniform result
//!   envelope and decoding of the receipts it returns
//! - **`Svm`:** the idempotent, mutex-guarded process initialization
//! - **`Runtime`:** a session handle owning one engine runtime, with the
//!   Open / Commit / Rewind layer state machine
//! - **`MemEngine`:** an in-process engine implementing the same ABI,
//!   used for tests and for hosts running without the native library
//!
//! With the `native` feature, `NativeEngine` links the prebuilt `libsvm`.
//!
//! The primary entry points are [`Svm::init`] and [`Svm::new_runtime`].

pub mod error;
pub mod config;
pub mod ffi;
pub mod engine;
pub mod adapter;
pub mod svm;
pub mod runtime;
pub mod mem_engine;

pub use error::SvmError;
pub use config::SvmConfig;
pub use engine::Engine;
#[cfg(feature = "native")]
pub use engine::NativeEngine;
pub use svm::Svm;
pub use runtime::Runtime;
pub use mem_engine::MemEngine;

pub use svm_primitives as primitives;
