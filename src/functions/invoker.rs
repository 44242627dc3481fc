//! # Function Invoker
//!
//! Dispatch from `implementation_kind` to a runnable implementation.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::errors::{FunctionError, FunctionResult};
use super::external::ExternalProgram;
use super::function::{FunctionDef, ImplementationKind};
use super::runtime::RuntimeConfig;
use super::script::Script;
use super::wasm::WasmModule;

/// Capability to run an implementation on slot rows
pub trait Invokable {
    /// Call with input slot to rows; returns output slot to rows
    fn call(
        &self,
        inputs: &BTreeMap<String, Value>,
        config: &RuntimeConfig,
    ) -> FunctionResult<Map<String, Value>>;
}

/// A prepared implementation, one variant per supported kind
#[derive(Debug, Clone)]
pub enum Implementation {
    Script(Script),
    Wasm(WasmModule),
    External(ExternalProgram),
}

impl Implementation {
    /// Compile or resolve the payload of `function`
    pub fn prepare(function: &FunctionDef) -> FunctionResult<Self> {
        let kind = function.kind().ok_or_else(|| {
            FunctionError::UnsupportedImplementation(function.implementation_kind.clone())
        })?;

        match kind {
            ImplementationKind::Script => {
                let script = Script::compile(&function.implementation)?;
                script.check_inputs(function.input_schemas.keys())?;
                Ok(Implementation::Script(script))
            }
            ImplementationKind::Wasm => {
                WasmModule::compile(&function.implementation).map(Implementation::Wasm)
            }
            ImplementationKind::External => {
                ExternalProgram::from_function(function).map(Implementation::External)
            }
        }
    }

    pub fn kind(&self) -> ImplementationKind {
        match self {
            Implementation::Script(_) => ImplementationKind::Script,
            Implementation::Wasm(_) => ImplementationKind::Wasm,
            Implementation::External(_) => ImplementationKind::External,
        }
    }
}

impl Invokable for Script {
    fn call(
        &self,
        inputs: &BTreeMap<String, Value>,
        config: &RuntimeConfig,
    ) -> FunctionResult<Map<String, Value>> {
        self.run(inputs, config.script_limits())
    }
}

impl Invokable for Implementation {
    fn call(
        &self,
        inputs: &BTreeMap<String, Value>,
        config: &RuntimeConfig,
    ) -> FunctionResult<Map<String, Value>> {
        match self {
            Implementation::Script(script) => script.call(inputs, config),
            Implementation::Wasm(module) => module.call(inputs, config),
            Implementation::External(program) => program.call(inputs, config),
        }
    }
}

/// Decode an outputs document produced by a sandboxed implementation
pub(super) fn parse_outputs(bytes: &[u8]) -> FunctionResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(outputs)) => Ok(outputs),
        Ok(_) => Err(FunctionError::InvocationFailure(
            "outputs must be a JSON object of output slots".into(),
        )),
        Err(e) => Err(FunctionError::InvocationFailure(format!(
            "outputs are not valid JSON: {}",
            e
        ))),
    }
}
