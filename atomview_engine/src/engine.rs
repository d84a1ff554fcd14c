/// AtomView Engine - process-wide logger and optional device registration
///
/// The engine keeps exactly two pieces of global state: the active logger
/// and an optional registered graphics device. Frame index and fence
/// counters belong to the `FrameSynchronizer` owned by the `Renderer`.

use std::sync::{OnceLock, RwLock, Arc, Mutex};
use std::time::SystemTime;
use crate::graphics_device::GraphicsDevice;
use crate::error::{Result, Error};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

struct EngineState {
    graphics_device: RwLock<Option<Arc<Mutex<dyn GraphicsDevice>>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            graphics_device: RwLock::new(None),
        }
    }
}

// ===== PUBLIC API =====

/// Engine facade
///
/// # Example
///
/// ```no_run
/// use atomview_engine::atomview::Engine;
///
/// Engine::initialize()?;
/// // Engine::create_graphics_device(VulkanGraphicsDevice::new(&window, &config)?)?;
/// let device = Engine::graphics_device()?;
/// Engine::shutdown();
/// # Ok::<(), atomview_engine::atomview::Error>(())
/// ```
pub struct Engine;

impl Engine {
    fn log_and_return_error(error: Error) -> Error {
        crate::engine_error!("atomview::Engine", "{}", error);
        error
    }

    fn state() -> Result<&'static EngineState> {
        ENGINE_STATE.get().ok_or_else(|| {
            Self::log_and_return_error(Error::InitializationFailed(
                "Engine not initialized. Call Engine::initialize() first.".to_string(),
            ))
        })
    }

    /// Initialize the engine. Idempotent.
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(EngineState::new);
        Ok(())
    }

    /// Drop the registered graphics device, if any
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut device) = state.graphics_device.write() {
                *device = None;
            }
        }
    }

    /// Register a graphics device as the process-wide device
    ///
    /// # Errors
    ///
    /// - The engine is not initialized
    /// - A device is already registered
    pub fn create_graphics_device<D: GraphicsDevice + 'static>(device: D) -> Result<()> {
        Self::register_graphics_device(Arc::new(Mutex::new(device)))
    }

    /// Register an already shared graphics device
    pub fn register_graphics_device(device: Arc<Mutex<dyn GraphicsDevice>>) -> Result<()> {
        let state = Self::state()?;
        let mut lock = state.graphics_device.write().map_err(|_| {
            Self::log_and_return_error(Error::BackendError("GraphicsDevice lock poisoned".to_string()))
        })?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(Error::InitializationFailed(
                "GraphicsDevice already exists. Call Engine::destroy_graphics_device() first."
                    .to_string(),
            )));
        }

        *lock = Some(device);
        crate::engine_info!("atomview::Engine", "GraphicsDevice registered");
        Ok(())
    }

    /// Get the registered graphics device
    pub fn graphics_device() -> Result<Arc<Mutex<dyn GraphicsDevice>>> {
        let state = Self::state()?;
        let lock = state.graphics_device.read().map_err(|_| {
            Self::log_and_return_error(Error::BackendError("GraphicsDevice lock poisoned".to_string()))
        })?;

        lock.clone().ok_or_else(|| {
            Self::log_and_return_error(Error::InitializationFailed(
                "GraphicsDevice not created. Call Engine::create_graphics_device() first.".to_string(),
            ))
        })
    }

    /// Unregister the graphics device. The device itself is destroyed once
    /// the last `Arc` (typically held by a `Renderer`) goes away.
    pub fn destroy_graphics_device() -> Result<()> {
        let state = Self::state()?;
        let mut lock = state.graphics_device.write().map_err(|_| {
            Self::log_and_return_error(Error::BackendError("GraphicsDevice lock poisoned".to_string()))
        })?;

        *lock = None;
        crate::engine_info!("atomview::Engine", "GraphicsDevice unregistered");
        Ok(())
    }

    #[cfg(test)]
    pub fn reset_for_testing() {
        Self::shutdown();
    }

    // ===== LOGGING API =====

    /// Replace the active logger
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Restore the `DefaultLogger`
    pub fn reset_logger() {
        Self::set_logger(DefaultLogger);
    }

    /// Log without location. Used by `engine_trace!` .. `engine_warn!`.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }

    /// Log with file:line. Used by `engine_error!` and the `engine_err!` family.
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }

    fn dispatch(entry: LogEntry) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&entry);
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
