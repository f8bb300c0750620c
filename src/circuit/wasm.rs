//! wasmer-backed bridge to a circom witness calculator module.

use std::time::Instant;

use tracing::{debug, error, info};
use wasmer::{
    imports, AsStoreMut, Function, FunctionEnv, FunctionEnvMut, Instance, Module, RuntimeError,
    Store, Value,
};

use super::{
    hooks::{CircuitFault, DiagnosticBuffer, HostHooks},
    shared_memory::{read_message, read_window_value, WordChannel},
    CircuitRuntime,
};
use crate::error::{Result, WitnessError, COMPILE_HINT};

/// A compiled module together with the store that owns its engine.
pub struct CompiledModule {
    store: Store,
    module: Module,
}

#[derive(Clone)]
struct ModuleExports {
    get_version: Function,
    get_field_num_len32: Function,
    get_raw_prime: Function,
    get_witness_size: Function,
    init: Function,
    get_message_char: Function,
    read_shared_rw_memory: Function,
}

impl ModuleExports {
    fn from_instance(instance: &Instance) -> Result<Self> {
        let func = |name: &'static str| {
            instance
                .exports
                .get_function(name)
                .cloned()
                .map_err(|_| WitnessError::MissingExport(name))
        };

        Ok(Self {
            get_version: func("getVersion")?,
            get_field_num_len32: func("getFieldNumLen32")?,
            get_raw_prime: func("getRawPrime")?,
            get_witness_size: func("getWitnessSize")?,
            init: func("init")?,
            get_message_char: func("getMessageChar")?,
            read_shared_rw_memory: func("readSharedRWMemory")?,
        })
    }
}

fn call_u32(
    store: &mut impl AsStoreMut,
    func: &Function,
    name: &'static str,
    args: &[Value],
) -> Result<u32> {
    let results = func.call(store, args).map_err(WitnessError::from_trap)?;
    match results.first() {
        Some(Value::I32(value)) => Ok(*value as u32),
        _ => Err(WitnessError::UnexpectedReturn(name)),
    }
}

/// Word channel over any store handle, so host callbacks can drain the module re-entrantly.
struct StoreChannel<'a, S: AsStoreMut> {
    exports: &'a ModuleExports,
    store: &'a mut S,
}

impl<S: AsStoreMut> WordChannel for StoreChannel<'_, S> {
    fn field_num_len32(&mut self) -> Result<u32> {
        call_u32(
            &mut *self.store,
            &self.exports.get_field_num_len32,
            "getFieldNumLen32",
            &[],
        )
    }

    fn read_shared_rw_memory(&mut self, index: u32) -> Result<u32> {
        call_u32(
            &mut *self.store,
            &self.exports.read_shared_rw_memory,
            "readSharedRWMemory",
            &[Value::I32(index as i32)],
        )
    }

    fn message_char(&mut self) -> Result<u32> {
        call_u32(
            &mut *self.store,
            &self.exports.get_message_char,
            "getMessageChar",
            &[],
        )
    }
}

struct HostEnv<H> {
    exports: Option<ModuleExports>,
    hooks: H,
}

fn into_runtime_error(err: WitnessError) -> RuntimeError {
    match err {
        WitnessError::Trap(trap) => trap,
        // keep the fault typed so `from_trap` can recover it after the unwind
        WitnessError::Fault(fault) => RuntimeError::user(Box::new(fault)),
        other => RuntimeError::new(other.to_string()),
    }
}

fn with_channel<'e, H: HostHooks, T>(
    env: &mut FunctionEnvMut<'e, HostEnv<H>>,
    f: impl FnOnce(&mut StoreChannel<'_, FunctionEnvMut<'e, HostEnv<H>>>) -> Result<T>,
) -> std::result::Result<T, RuntimeError> {
    let exports = env.data().exports.clone().ok_or_else(|| {
        RuntimeError::new("circuit module called the host before instantiation finished")
    })?;
    let mut channel = StoreChannel {
        exports: &exports,
        store: env,
    };
    f(&mut channel).map_err(into_runtime_error)
}

fn exception_handler<H: HostHooks>(
    mut env: FunctionEnvMut<HostEnv<H>>,
    code: i32,
) -> std::result::Result<(), CircuitFault> {
    Err(env.data_mut().hooks.on_fault(code as u32))
}

fn print_error_message<H: HostHooks>(
    mut env: FunctionEnvMut<HostEnv<H>>,
) -> std::result::Result<(), RuntimeError> {
    let message = with_channel(&mut env, |channel| read_message(channel))?;
    env.data_mut().hooks.on_drain_error(&message);
    Ok(())
}

fn write_buffer_message<H: HostHooks>(
    mut env: FunctionEnvMut<HostEnv<H>>,
) -> std::result::Result<(), RuntimeError> {
    let message = with_channel(&mut env, |channel| read_message(channel))?;
    env.data_mut().hooks.on_drain_log(&message);
    Ok(())
}

fn show_shared_rw_memory<H: HostHooks>(
    mut env: FunctionEnvMut<HostEnv<H>>,
) -> std::result::Result<(), RuntimeError> {
    let value = with_channel(&mut env, |channel| read_window_value(channel))?;
    env.data_mut().hooks.on_dump_memory(&value);
    Ok(())
}

/// A running circuit module with host hooks installed.
pub struct ModuleBridge<H: HostHooks = DiagnosticBuffer> {
    store: Store,
    // keeps the instance alive for the exported functions
    _instance: Instance,
    exports: ModuleExports,
    env: FunctionEnv<HostEnv<H>>,
}

impl ModuleBridge<DiagnosticBuffer> {
    /// Compiles and instantiates `bytes` with a fresh [`DiagnosticBuffer`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let compiled = Self::compile(bytes)?;
        Self::instantiate(compiled, DiagnosticBuffer::new())
    }
}

impl<H: HostHooks> ModuleBridge<H> {
    pub fn compile(bytes: &[u8]) -> Result<CompiledModule> {
        let t0 = Instant::now();
        let store = Store::default();
        let module = Module::new(&store, bytes).map_err(|source| {
            error!(%source, "failed to compile circuit module");
            error!("{}", COMPILE_HINT);
            WitnessError::Compile {
                source,
                hint: COMPILE_HINT,
            }
        })?;
        info!(
            elapsed_ms = t0.elapsed().as_millis(),
            bytes = bytes.len(),
            "Compiled circuit module"
        );
        Ok(CompiledModule { store, module })
    }

    pub fn instantiate(compiled: CompiledModule, hooks: H) -> Result<Self> {
        let CompiledModule { mut store, module } = compiled;
        let env = FunctionEnv::new(
            &mut store,
            HostEnv {
                exports: None,
                hooks,
            },
        );

        let import_object = imports! {
            "runtime" => {
                "exceptionHandler" => Function::new_typed_with_env(&mut store, &env, exception_handler::<H>),
                "printErrorMessage" => Function::new_typed_with_env(&mut store, &env, print_error_message::<H>),
                "writeBufferMessage" => Function::new_typed_with_env(&mut store, &env, write_buffer_message::<H>),
                "showSharedRWMemory" => Function::new_typed_with_env(&mut store, &env, show_shared_rw_memory::<H>),
            }
        };

        let instance = Instance::new(&mut store, &module, &import_object).map_err(Box::new)?;
        let exports = ModuleExports::from_instance(&instance)?;
        env.as_mut(&mut store).exports = Some(exports.clone());
        debug!("Instantiated circuit module");

        Ok(Self {
            store,
            _instance: instance,
            exports,
            env,
        })
    }

    pub fn hooks(&self) -> &H {
        &self.env.as_ref(&self.store).hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.env.as_mut(&mut self.store).hooks
    }

    fn channel(&mut self) -> StoreChannel<'_, Store> {
        StoreChannel {
            exports: &self.exports,
            store: &mut self.store,
        }
    }
}

impl<H: HostHooks> WordChannel for ModuleBridge<H> {
    fn field_num_len32(&mut self) -> Result<u32> {
        self.channel().field_num_len32()
    }

    fn read_shared_rw_memory(&mut self, index: u32) -> Result<u32> {
        self.channel().read_shared_rw_memory(index)
    }

    fn message_char(&mut self) -> Result<u32> {
        self.channel().message_char()
    }
}

impl<H: HostHooks> CircuitRuntime for ModuleBridge<H> {
    fn version(&mut self) -> Result<u32> {
        call_u32(
            &mut self.store,
            &self.exports.get_version,
            "getVersion",
            &[],
        )
    }

    fn stage_raw_prime(&mut self) -> Result<()> {
        self.exports
            .get_raw_prime
            .call(&mut self.store, &[])
            .map_err(WitnessError::from_trap)?;
        Ok(())
    }

    fn witness_size(&mut self) -> Result<u32> {
        call_u32(
            &mut self.store,
            &self.exports.get_witness_size,
            "getWitnessSize",
            &[],
        )
    }

    fn init(&mut self, sanity_check: bool) -> Result<()> {
        debug!(sanity_check, "Calling circuit init");
        self.exports
            .init
            .call(&mut self.store, &[Value::I32(sanity_check as i32)])
            .map_err(WitnessError::from_trap)?;
        Ok(())
    }
}
