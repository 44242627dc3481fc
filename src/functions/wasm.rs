//! # WASM Runtime
//!
//! Runs `wasm` implementations with wasmtime. Modules get no imports, so
//! they cannot reach the filesystem, network or clock.
//!
//! ABI:
//!
//! - `memory`: exported linear memory
//! - `alloc(len: i32) -> i32`: reserve `len` bytes for the input document
//! - `process(ptr: i32, len: i32) -> i64`: read the input JSON object at
//!   `ptr`, return `(out_ptr << 32) | out_len` of the output JSON object
//!
//! Execution is bounded by fuel, a memory limiter and an epoch deadline that
//! a watchdog thread trips when the wall-clock budget runs out.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};
use wasmtime::{Config, Engine, Linker, Module, ResourceLimiter, Store, Trap};

use super::errors::{FunctionError, FunctionResult};
use super::invoker::{parse_outputs, Invokable};
use super::runtime::RuntimeConfig;

const REQUIRED_EXPORTS: [&str; 3] = ["memory", "alloc", "process"];

/// Tables are not part of the ABI; keep them small
const MAX_TABLE_ELEMENTS: usize = 10_000;

/// Store state enforcing the memory budget
struct MemoryGuard {
    max_bytes: usize,
    exceeded: bool,
}

impl ResourceLimiter for MemoryGuard {
    fn memory_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        if desired > self.max_bytes {
            self.exceeded = true;
            return Ok(false);
        }
        Ok(true)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        Ok(desired <= MAX_TABLE_ELEMENTS)
    }
}

/// A compiled wasm implementation
#[derive(Clone)]
pub struct WasmModule {
    engine: Engine,
    module: Module,
}

impl std::fmt::Debug for WasmModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmModule").finish_non_exhaustive()
    }
}

impl WasmModule {
    /// Compile WebAssembly text (leading `(`) or base64-encoded binary
    pub fn compile(payload: &str) -> FunctionResult<Self> {
        let trimmed = payload.trim();
        let bytes = if trimmed.starts_with('(') {
            trimmed.as_bytes().to_vec()
        } else {
            STANDARD.decode(trimmed).map_err(|e| {
                FunctionError::CompilationError(format!("wasm payload is not valid base64: {}", e))
            })?
        };

        let mut config = Config::new();
        config.consume_fuel(true);
        config.epoch_interruption(true);
        let engine = Engine::new(&config)
            .map_err(|e| FunctionError::Internal(format!("wasm engine: {:#}", e)))?;
        let module = Module::new(&engine, &bytes)
            .map_err(|e| FunctionError::CompilationError(format!("{:#}", e)))?;

        for name in REQUIRED_EXPORTS {
            if module.get_export(name).is_none() {
                return Err(FunctionError::CompilationError(format!(
                    "wasm module must export '{}'",
                    name
                )));
            }
        }

        Ok(Self { engine, module })
    }

    fn invoke(&self, store: &mut Store<MemoryGuard>, input: &[u8]) -> wasmtime::Result<Vec<u8>> {
        let linker = Linker::new(&self.engine);
        let instance = linker.instantiate(&mut *store, &self.module)?;

        let memory = instance
            .get_memory(&mut *store, "memory")
            .ok_or_else(|| wasmtime::Error::msg("export 'memory' is not a memory"))?;
        let alloc = instance.get_typed_func::<i32, i32>(&mut *store, "alloc")?;
        let process = instance.get_typed_func::<(i32, i32), i64>(&mut *store, "process")?;

        let len = i32::try_from(input.len())
            .map_err(|_| wasmtime::Error::msg("input document exceeds 2 GiB"))?;
        let ptr = alloc.call(&mut *store, len)?;
        memory.write(&mut *store, ptr as u32 as usize, input)?;

        let packed = process.call(&mut *store, (ptr, len))? as u64;
        let out_ptr = (packed >> 32) as usize;
        let out_len = (packed & 0xffff_ffff) as usize;
        if out_ptr.saturating_add(out_len) > memory.data_size(&*store) {
            return Err(wasmtime::Error::msg(format!(
                "output range {}..{} is outside linear memory",
                out_ptr,
                out_ptr.saturating_add(out_len)
            )));
        }

        let mut output = vec![0u8; out_len];
        memory.read(&*store, out_ptr, &mut output)?;
        Ok(output)
    }
}

impl Invokable for WasmModule {
    fn call(
        &self,
        inputs: &BTreeMap<String, Value>,
        config: &RuntimeConfig,
    ) -> FunctionResult<Map<String, Value>> {
        let input = serde_json::to_vec(inputs)
            .map_err(|e| FunctionError::Internal(format!("encode inputs: {}", e)))?;

        let mut store = Store::new(
            &self.engine,
            MemoryGuard {
                max_bytes: config.max_memory_bytes,
                exceeded: false,
            },
        );
        store.limiter(|guard| guard as &mut dyn ResourceLimiter);
        store
            .set_fuel(config.wasm_fuel)
            .map_err(|e| FunctionError::Internal(format!("{:#}", e)))?;
        store.set_epoch_deadline(1);

        let (done, watch) = mpsc::channel::<()>();
        let engine = self.engine.clone();
        let timeout = config.timeout();
        let watchdog = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = watch.recv_timeout(timeout) {
                engine.increment_epoch();
            }
        });

        let result = self.invoke(&mut store, &input);
        drop(done);
        let _ = watchdog.join();

        match result {
            Ok(output) => parse_outputs(&output),
            Err(err) => Err(classify(err, store.data().exceeded, config)),
        }
    }
}

fn classify(err: wasmtime::Error, memory_exceeded: bool, config: &RuntimeConfig) -> FunctionError {
    if memory_exceeded {
        return FunctionError::ResourceExhausted(format!(
            "wasm memory limit of {} bytes",
            config.max_memory_bytes
        ));
    }
    match err.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => FunctionError::ResourceExhausted(format!(
            "wasm fuel budget of {} exhausted",
            config.wasm_fuel
        )),
        Some(Trap::Interrupt) => FunctionError::Timeout(config.timeout_ms),
        _ => FunctionError::InvocationFailure(format!("{:#}", err)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use serde_json::json;

    const ECHO: &str = r#"
        (module
          (memory (export "memory") 1)
          (func (export "alloc") (param i32) (result i32) (i32.const 1024))
          (func (export "process") (param $ptr i32) (param $len i32) (result i64)
            (i64.or
              (i64.shl (i64.extend_i32_u (local.get $ptr)) (i64.const 32))
              (i64.extend_i32_u (local.get $len)))))
    "#;

    const CONSTANT: &str = r#"
        (module
          (memory (export "memory") 1)
          (data (i32.const 8) "{\"y\":[{\"value\":6}]}")
          (func (export "alloc") (param i32) (result i32) (i32.const 1024))
          (func (export "process") (param i32 i32) (result i64)
            (i64.or (i64.shl (i64.const 8) (i64.const 32)) (i64.const 19))))
    "#;

    const SPIN: &str = r#"
        (module
          (memory (export "memory") 1)
          (func (export "alloc") (param i32) (result i32) (i32.const 0))
          (func (export "process") (param i32 i32) (result i64)
            (loop $spin (br $spin))
            (i64.const 0)))
    "#;

    const TRAP: &str = r#"
        (module
          (memory (export "memory") 1)
          (func (export "alloc") (param i32) (result i32) (i32.const 0))
          (func (export "process") (param i32 i32) (result i64) unreachable))
    "#;

    const HUNGRY: &str = r#"
        (module
          (memory (export "memory") 16)
          (func (export "alloc") (param i32) (result i32) (i32.const 0))
          (func (export "process") (param i32 i32) (result i64) (i64.const 0)))
    "#;

    fn inputs() -> BTreeMap<String, Value> {
        BTreeMap::from([("x".to_string(), json!([{"value": 3}]))])
    }

    #[test]
    fn test_echo_round_trips_inputs() {
        let module = WasmModule::compile(ECHO).unwrap();
        let outputs = module.call(&inputs(), &RuntimeConfig::default()).unwrap();
        assert_eq!(outputs["x"], json!([{"value": 3}]));
    }

    #[test]
    fn test_constant_output() {
        let module = WasmModule::compile(CONSTANT).unwrap();
        let outputs = module.call(&inputs(), &RuntimeConfig::default()).unwrap();
        assert_eq!(outputs["y"], json!([{"value": 6}]));
    }

    #[test]
    fn test_fuel_exhaustion() {
        let module = WasmModule::compile(SPIN).unwrap();
        let config = RuntimeConfig {
            wasm_fuel: 10_000,
            ..RuntimeConfig::default()
        };
        let err = module.call(&inputs(), &config).unwrap_err();
        assert!(matches!(err, FunctionError::ResourceExhausted(_)));
    }

    #[test]
    fn test_timeout_interrupts() {
        let module = WasmModule::compile(SPIN).unwrap();
        let config = RuntimeConfig {
            wasm_fuel: u64::MAX,
            ..RuntimeConfig::default()
        }
        .with_timeout(Duration::from_millis(50));
        let err = module.call(&inputs(), &config).unwrap_err();
        assert!(matches!(err, FunctionError::Timeout(50)));
    }

    #[test]
    fn test_memory_limit() {
        let module = WasmModule::compile(HUNGRY).unwrap();
        let config = RuntimeConfig {
            max_memory_bytes: 64 * 1024,
            ..RuntimeConfig::default()
        };
        let err = module.call(&inputs(), &config).unwrap_err();
        assert!(matches!(err, FunctionError::ResourceExhausted(_)));
    }

    #[test]
    fn test_trap_is_invocation_failure() {
        let module = WasmModule::compile(TRAP).unwrap();
        let err = module.call(&inputs(), &RuntimeConfig::default()).unwrap_err();
        assert!(matches!(err, FunctionError::InvocationFailure(_)));
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            WasmModule::compile("not base64!!").unwrap_err(),
            FunctionError::CompilationError(_)
        ));
        assert!(matches!(
            WasmModule::compile("(module (func").unwrap_err(),
            FunctionError::CompilationError(_)
        ));
        // Valid empty module, missing the ABI exports
        let err = WasmModule::compile("AGFzbQEAAAA=").unwrap_err();
        assert!(err.to_string().contains("memory"));
    }
}
