//! V8 sandbox built on `deno_core`.
//!
//! Each run gets a brand new isolate with no extensions, so there is no op
//! that reaches the file system, network, process or environment. A watchdog
//! thread terminates the isolate once the budget elapses; a near-heap-limit
//! callback does the same when memory runs out.

use std::cell::RefCell;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use deno_core::error::JsError;
use deno_core::{serde_v8, v8, JsRuntime, RuntimeOptions};
use tracing::{debug, warn};

use super::{ExecutionStats, Sandbox, SandboxConfig, SandboxFailure};
use crate::harness::{Program, RawError, RawRecord, StackFrame, PRELUDE_SCRIPT, PROGRAM_SCRIPT};

struct HeapGuard {
    handle: v8::IsolateHandle,
    triggered: Arc<AtomicBool>,
}

thread_local! {
    static HEAP_GUARD: RefCell<Option<HeapGuard>> = const { RefCell::new(None) };
}

/// Clears this thread's heap guard when a run ends, however it ends
struct HeapGuardReset;

impl Drop for HeapGuardReset {
    fn drop(&mut self) {
        HEAP_GUARD.with(|guard| guard.borrow_mut().take());
    }
}

extern "C" fn near_heap_limit(_data: *mut c_void, current_limit: usize, _initial: usize) -> usize {
    HEAP_GUARD.with(|guard| {
        if let Some(guard) = guard.borrow().as_ref() {
            if !guard.triggered.swap(true, Ordering::SeqCst) {
                guard.handle.terminate_execution();
            }
        }
    });
    // Room for the termination to unwind past one more large allocation
    current_limit.saturating_mul(2)
}

/// Sandbox running programs in fresh V8 isolates
pub struct V8Sandbox {
    config: SandboxConfig,
    stats: Arc<Mutex<ExecutionStats>>,
}

impl V8Sandbox {
    /// Create a new sandbox with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SandboxConfig::default())
    }

    /// Create a new sandbox with custom configuration
    #[must_use]
    pub fn with_config(config: SandboxConfig) -> Self {
        Self {
            config,
            stats: Arc::new(Mutex::new(ExecutionStats::default())),
        }
    }

    fn execute_sandboxed(&self, program: &Program) -> Result<Vec<RawRecord>, SandboxFailure> {
        let start = Instant::now();

        let create_params = v8::CreateParams::default().heap_limits(0, self.config.max_heap_bytes);
        let mut runtime = JsRuntime::new(RuntimeOptions {
            create_params: Some(create_params),
            ..Default::default()
        });

        let heap_triggered = Arc::new(AtomicBool::new(false));
        let _reset = HeapGuardReset;
        HEAP_GUARD.with(|guard| {
            *guard.borrow_mut() = Some(HeapGuard {
                handle: runtime.v8_isolate().thread_safe_handle(),
                triggered: Arc::clone(&heap_triggered),
            });
        });
        runtime
            .v8_isolate()
            .add_near_heap_limit_callback(near_heap_limit, std::ptr::null_mut());

        // One budget covers the prelude, user code and every assertion
        let watchdog_handle = runtime.v8_isolate().thread_safe_handle();
        let timed_out = Arc::new(AtomicBool::new(false));
        let watchdog_flag = Arc::clone(&timed_out);
        let budget = Duration::from_millis(self.config.timeout_ms);
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let watchdog = std::thread::Builder::new()
            .name("jsjudge-watchdog".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(budget) {
                    watchdog_flag.store(true, Ordering::SeqCst);
                    watchdog_handle.terminate_execution();
                }
            })
            .map_err(|e| SandboxFailure::Runtime(format!("failed to start watchdog: {e}")))?;

        let outcome = match runtime.execute_script(PRELUDE_SCRIPT, program.prelude().to_string().into()) {
            Ok(_) => runtime.execute_script(PROGRAM_SCRIPT, program.text().to_string().into()),
            Err(e) => Err(e),
        };

        // The watchdog must be gone before the isolate is dropped
        let _ = cancel_tx.send(());
        if watchdog.join().is_err() {
            warn!("sandbox watchdog panicked");
        }

        let result = if heap_triggered.load(Ordering::SeqCst) {
            Err(SandboxFailure::HeapExhausted {
                limit_bytes: self.config.max_heap_bytes,
            })
        } else {
            match outcome {
                Err(_) if timed_out.load(Ordering::SeqCst) => Err(SandboxFailure::Timeout {
                    timeout_ms: self.config.timeout_ms,
                }),
                Err(e) => Err(classify_error(&e, program)),
                Ok(value) => {
                    let _ = runtime.v8_isolate().cancel_terminate_execution();
                    let scope = &mut runtime.handle_scope();
                    let local = v8::Local::new(scope, &value);
                    serde_v8::from_v8::<Vec<RawRecord>>(scope, local)
                        .map_err(|e| SandboxFailure::MalformedOutput(e.to_string()))
                        .and_then(|records| check_count(records, program.assertion_count()))
                }
            }
        };

        let duration = start.elapsed();
        debug!(
            duration_ms = duration.as_millis() as u64,
            ok = result.is_ok(),
            "sandbox run finished"
        );

        if let Ok(mut stats) = self.stats.lock() {
            stats.duration_ms = duration.as_millis() as u64;
            stats.success = result.is_ok();
        }

        result
    }
}

impl Default for V8Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox for V8Sandbox {
    fn run(&self, program: &Program) -> Result<Vec<RawRecord>, SandboxFailure> {
        self.execute_sandboxed(program)
    }

    fn timeout_ms(&self) -> u64 {
        self.config.timeout_ms
    }

    fn last_execution_stats(&self) -> ExecutionStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }
}

fn check_count(records: Vec<RawRecord>, expected: usize) -> Result<Vec<RawRecord>, SandboxFailure> {
    if records.len() == expected {
        Ok(records)
    } else {
        Err(SandboxFailure::MalformedOutput(format!(
            "expected {expected} records, got {}",
            records.len()
        )))
    }
}

/// Sort an escaped exception into tamper signal, script error or host error
fn classify_error(error: &deno_core::error::AnyError, program: &Program) -> SandboxFailure {
    let Some(js) = error.downcast_ref::<JsError>() else {
        return SandboxFailure::Runtime(error.to_string());
    };

    let token = &program.identifiers().tamper_token;
    if js.message.as_deref() == Some(token.as_str()) || js.exception_message.contains(token.as_str()) {
        warn!("harness bookkeeping was interfered with by submitted code");
        return SandboxFailure::Tampered;
    }

    SandboxFailure::Thrown(raw_error(js))
}

fn raw_error(js: &JsError) -> RawError {
    let frame = js.frames.first().and_then(|f| {
        Some(StackFrame {
            file: f.file_name.clone()?,
            line: f.line_number?,
            column: f.column_number?,
        })
    });
    let message = js.message.clone().or_else(|| {
        js.exception_message
            .strip_prefix("Uncaught ")
            .map(str::to_string)
    });
    RawError {
        name: js.name.clone(),
        message,
        frame,
    }
}
