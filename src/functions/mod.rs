//! # Functions
//!
//! Function definitions with typed input/output slot bindings, and the
//! engine that invokes them.
//!
//! Supported implementation kinds:
//!
//! - `interpreted-script`: built-in transform-script interpreter
//! - `wasm`: WebAssembly module, sandboxed by wasmtime
//! - `external`: child process speaking JSON over stdin/stdout

pub mod engine;
pub mod errors;
pub mod external;
pub mod function;
pub mod invoker;
pub mod runtime;
pub mod script;
pub mod wasm;

pub use engine::{output_table_name, ExecutionEngine};
pub use errors::{FunctionError, FunctionResult};
pub use external::ExternalProgram;
pub use function::{FunctionDef, ImplementationKind};
pub use invoker::{Implementation, Invokable};
pub use runtime::RuntimeConfig;
pub use script::{Script, ScriptLimits};
pub use wasm::WasmModule;
