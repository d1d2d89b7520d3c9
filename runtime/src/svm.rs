//! Process-level entry point.
//!
//! `Svm` drives an engine's one-time initialization. Runtimes can only be
//! created after [`Svm::init`] has succeeded; further `init` calls are
//! no-ops, whatever configuration they carry. The initialized flag belongs
//! to the engine, so every `Svm` over the same engine shares it.

use std::path::Path;
use std::sync::{Arc, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::adapter::{check_abi_len, expect_ok};
use crate::config::SvmConfig;
use crate::engine::Engine;
use crate::error::SvmError;
use crate::mem_engine::MemEngine;
use crate::runtime::Runtime;

pub struct Svm {
    engine: Arc<dyn Engine>,
}

impl Svm {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    fn init_flag(&self) -> MutexGuard<'_, bool> {
        self.engine
            .init_flag()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// An `Svm` backed by a fresh [`MemEngine`].
    pub fn in_process() -> Self {
        Self::new(Arc::new(MemEngine::new()))
    }

    /// The process-wide `Svm` backed by the linked `libsvm`.
    #[cfg(feature = "native")]
    pub fn native() -> &'static Svm {
        use std::sync::OnceLock;

        static NATIVE: OnceLock<Svm> = OnceLock::new();
        NATIVE.get_or_init(|| Svm::new(Arc::new(crate::engine::NativeEngine)))
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Initialize the engine once.
    ///
    /// The lock is held across the engine call, so concurrent callers wait
    /// for the first one and then return without touching the engine. A
    /// failed attempt leaves the engine uninitialized.
    pub fn init(&self, config: &SvmConfig) -> Result<(), SvmError> {
        let mut initialized = self.init_flag();
        if *initialized {
            debug!("SVM already initialized");
            return Ok(());
        }

        config.validate()?;
        let path = config.path_bytes();
        check_abi_len("path", path.len())?;
        expect_ok(self.engine.as_ref(), self.engine.init(config.in_memory, &path))?;

        *initialized = true;
        info!(in_memory = config.in_memory, path = ?config.path, "SVM initialized");
        Ok(())
    }

    /// Shorthand for [`Svm::init`] with an ad-hoc configuration.
    pub fn init_with(&self, in_memory: bool, path: impl AsRef<Path>) -> Result<(), SvmError> {
        let config = if in_memory {
            SvmConfig::in_memory()
        } else {
            SvmConfig::persistent(path.as_ref())
        };
        self.init(&config)
    }

    pub fn is_initialized(&self) -> bool {
        *self.init_flag()
    }

    /// Allocate a new runtime.
    pub fn new_runtime(&self) -> Result<Runtime, SvmError> {
        if !self.is_initialized() {
            return Err(SvmError::NotInitialized);
        }

        let mut raw = None;
        let res = self.engine.runtime_create(&mut raw);
        if let Err(err) = expect_ok(self.engine.as_ref(), res) {
            if let Some(raw) = raw {
                self.engine.runtime_destroy(raw);
            }
            return Err(err);
        }
        let raw =
            raw.ok_or_else(|| SvmError::Protocol("engine returned a null runtime".into()))?;

        let runtime = Runtime::open_session(Arc::clone(&self.engine), raw)?;
        debug!(
            layer = runtime.current_layer(),
            live = self.runtimes_count(),
            "runtime created"
        );
        Ok(runtime)
    }

    /// Number of runtimes currently allocated by the engine.
    pub fn runtimes_count(&self) -> u64 {
        self.engine.runtimes_count()
    }
}

impl std::fmt::Debug for Svm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Svm")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
