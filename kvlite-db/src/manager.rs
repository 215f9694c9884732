// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Lazily created, shared store connection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kvlite_engine::{EngineBinding, EngineConfig, OpenMode, Sqlite3, StoreUri};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Lifecycle state of a [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle; the next acquire initializes
    Uninitialized,
    /// An acquire is initializing the engine or opening the store
    Initializing,
    /// A handle is cached and shared
    Ready,
}

/// Owns the single shared handle to one store.
///
/// The engine module is loaded at most once per manager; a failed load is not
/// remembered, so the next acquire retries. Closing releases the handle but
/// keeps the loaded module for the next open.
pub struct ConnectionManager<B: EngineBinding> {
    binding: B,
    store: StoreUri,
    mode: OpenMode,
    module: OnceCell<B::Module>,
    handle: Mutex<Option<Arc<B::Handle>>>,
    /// Held for the whole of an initialization so concurrent acquirers queue
    /// behind it instead of opening a second handle.
    init_gate: tokio::sync::Mutex<()>,
}

impl<B: EngineBinding> ConnectionManager<B> {
    pub fn new(binding: B, store: StoreUri, mode: OpenMode) -> Self {
        Self {
            binding,
            store,
            mode,
            module: OnceCell::new(),
            handle: Mutex::new(None),
            init_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn store(&self) -> &StoreUri {
        &self.store
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The loaded engine module, if initialization has succeeded.
    pub fn module(&self) -> Option<&B::Module> {
        self.module.get()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<B::Handle>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Option<Arc<B::Handle>> {
        self.slot().clone()
    }

    pub fn state(&self) -> ConnectionState {
        if self.slot().is_some() {
            ConnectionState::Ready
        } else if self.init_gate.try_lock().is_err() {
            ConnectionState::Initializing
        } else {
            ConnectionState::Uninitialized
        }
    }

    /// Return the shared handle, initializing the engine and opening the
    /// store on first use.
    ///
    /// On failure nothing is cached and a later call starts over.
    pub async fn get_database(&self) -> Result<Arc<B::Handle>> {
        if let Some(handle) = self.current() {
            return Ok(handle);
        }

        let _gate = self.init_gate.lock().await;
        // Whoever held the gate before us may have finished the job.
        if let Some(handle) = self.current() {
            return Ok(handle);
        }

        let module = self
            .module
            .get_or_try_init(|| async {
                debug!("Loading and initializing engine module");
                let module = self.binding.init().await?;
                info!("Running SQLite3 version {}", self.binding.version(&module));
                Ok::<_, kvlite_engine::Error>(module)
            })
            .await
            .map_err(|e| {
                error!("Engine initialization failed: {e}");
                Error::from_init(e)
            })?;

        let handle = Arc::new(self.binding.open(module, &self.store, self.mode)?);
        if self.store.is_persistent() {
            match self.binding.storage_size(module, Some(self.store.name())) {
                Ok(size) => info!("DB size: {size}"),
                Err(e) => warn!("Failed to read storage size of {}: {e}", self.store),
            }
        }
        debug!("Opened shared handle for {}", self.store);

        *self.slot() = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Close and forget the shared handle. Does nothing when none is open.
    ///
    /// Clones of the handle held elsewhere are closed too.
    pub fn close_db(&self) -> Result<()> {
        let Some(handle) = self.slot().take() else {
            return Ok(());
        };
        debug!("Closing shared handle for {}", self.store);
        self.binding.close(&handle)?;
        Ok(())
    }
}

impl ConnectionManager<Sqlite3> {
    /// Manager for a SQLite store.
    pub fn sqlite(config: EngineConfig, store: StoreUri, mode: OpenMode) -> Self {
        Self::new(Sqlite3::new(config), store, mode)
    }
}

impl Default for ConnectionManager<Sqlite3> {
    /// `file:local?vfs=kvvfs`, opened with `ct`.
    fn default() -> Self {
        Self::sqlite(
            EngineConfig::default(),
            StoreUri::local(),
            OpenMode::create_traced(),
        )
    }
}

impl<B: EngineBinding> Drop for ConnectionManager<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close_db() {
            warn!("Failed to close {} on drop: {e}", self.store);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::future::Future;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use kvlite_engine::Error as EngineError;
    use tokio::sync::Notify;

    #[derive(Debug)]
    struct FakeHandle {
        serial: usize,
        closed: AtomicBool,
    }

    #[derive(Default)]
    struct FakeEngine {
        inits: AtomicUsize,
        opens: AtomicUsize,
        closes: AtomicUsize,
        fail_init: AtomicBool,
        unknown_failure: AtomicBool,
        fail_close: AtomicBool,
        init_delay: Option<Duration>,
        release: Option<Arc<Notify>>,
    }

    impl EngineBinding for FakeEngine {
        type Module = ();
        type Handle = FakeHandle;

        fn init(&self) -> impl Future<Output = kvlite_engine::Result<()>> + Send {
            self.inits.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail_init.load(Ordering::SeqCst);
            let unknown = self.unknown_failure.load(Ordering::SeqCst);
            let delay = self.init_delay;
            let release = self.release.clone();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if let Some(release) = release {
                    release.notified().await;
                }
                if unknown {
                    return Err(EngineError::Unknown("unknown error".into()));
                }
                if fail {
                    return Err(EngineError::initialization("LinkError", "module missing"));
                }
                Ok(())
            }
        }

        fn version(&self, _module: &()) -> String {
            "fake".into()
        }

        fn open(&self, _module: &(), _store: &StoreUri, _mode: OpenMode) -> kvlite_engine::Result<FakeHandle> {
            Ok(FakeHandle {
                serial: self.opens.fetch_add(1, Ordering::SeqCst),
                closed: AtomicBool::new(false),
            })
        }

        fn storage_size(&self, _module: &(), _area: Option<&str>) -> kvlite_engine::Result<u64> {
            Ok(0)
        }

        fn close(&self, handle: &FakeHandle) -> kvlite_engine::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            handle.closed.store(true, Ordering::SeqCst);
            if self.fail_close.load(Ordering::SeqCst) {
                return Err(EngineError::Closed);
            }
            Ok(())
        }
    }

    fn manager(engine: FakeEngine) -> ConnectionManager<FakeEngine> {
        ConnectionManager::new(engine, StoreUri::local(), OpenMode::create_traced())
    }

    #[tokio::test]
    async fn repeated_acquire_returns_same_handle() {
        let m = manager(FakeEngine::default());
        assert_eq!(m.state(), ConnectionState::Uninitialized);

        let a = m.get_database().await.unwrap();
        let b = m.get_database().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(m.state(), ConnectionState::Ready);
        assert_eq!(m.binding().inits.load(Ordering::SeqCst), 1);
        assert_eq!(m.binding().opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquirers_share_one_initialization() {
        let m = Arc::new(manager(FakeEngine {
            init_delay: Some(Duration::from_millis(20)),
            ..Default::default()
        }));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let m = Arc::clone(&m);
                tokio::spawn(async move { m.get_database().await.unwrap() })
            })
            .collect();
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert_eq!(m.binding().inits.load(Ordering::SeqCst), 1);
        assert_eq!(m.binding().opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn state_is_initializing_while_init_is_in_flight() {
        let release = Arc::new(Notify::new());
        let m = Arc::new(manager(FakeEngine {
            release: Some(Arc::clone(&release)),
            ..Default::default()
        }));

        let pending = tokio::spawn({
            let m = Arc::clone(&m);
            async move { m.get_database().await.map(|h| h.serial) }
        });
        while m.state() != ConnectionState::Initializing {
            tokio::task::yield_now().await;
        }

        release.notify_one();
        assert_eq!(pending.await.unwrap().unwrap(), 0);
        assert_eq!(m.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn failed_init_caches_nothing_and_retries() {
        let m = manager(FakeEngine::default());
        m.binding().fail_init.store(true, Ordering::SeqCst);

        match m.get_database().await {
            Err(Error::Initialization { name, message }) => {
                assert_eq!(name, "LinkError");
                assert_eq!(message, "module missing");
            }
            other => panic!("expected initialization error, got {other:?}"),
        }
        assert_eq!(m.state(), ConnectionState::Uninitialized);
        assert!(m.module().is_none());

        m.binding().fail_init.store(false, Ordering::SeqCst);
        m.get_database().await.unwrap();
        assert_eq!(m.binding().inits.load(Ordering::SeqCst), 2);
        assert_eq!(m.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn unrecognized_failure_still_surfaces() {
        let m = manager(FakeEngine::default());
        m.binding().unknown_failure.store(true, Ordering::SeqCst);
        assert!(matches!(m.get_database().await, Err(Error::Unknown(_))));
        assert_eq!(m.state(), ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_reopen_gives_fresh_handle() {
        let m = manager(FakeEngine::default());
        m.close_db().unwrap();

        let first = m.get_database().await.unwrap();
        m.close_db().unwrap();
        m.close_db().unwrap();
        assert!(first.closed.load(Ordering::SeqCst));
        assert_eq!(m.state(), ConnectionState::Uninitialized);
        assert_eq!(m.binding().closes.load(Ordering::SeqCst), 1);

        let second = m.get_database().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.serial, 1);
        // The module is loaded once; only the store is reopened.
        assert_eq!(m.binding().inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_failure_propagates_and_forgets_handle() {
        let m = manager(FakeEngine::default());
        m.get_database().await.unwrap();
        m.binding().fail_close.store(true, Ordering::SeqCst);

        assert!(matches!(
            m.close_db(),
            Err(Error::Engine(EngineError::Closed))
        ));
        assert_eq!(m.state(), ConnectionState::Uninitialized);
        m.close_db().unwrap();
    }

    #[tokio::test]
    async fn drop_closes_open_handle() {
        let m = manager(FakeEngine::default());
        let handle = m.get_database().await.unwrap();
        drop(m);
        assert!(handle.closed.load(Ordering::SeqCst));
    }
}
