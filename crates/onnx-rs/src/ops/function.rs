//! Implementation functions and their compiled-kernel caches.
//!
//! An [`OpFunction`] is the backend-level counterpart of an ONNX operator version. It
//! declares the keyword parameters it accepts ([`ParamSchema`]) and knows how to compile a
//! kernel for one static signature: the call-ready attributes plus the dtype/shape of each
//! positional input. Compiled kernels are memoized in a bounded LRU cache so repeated calls
//! with the same signature skip validation and tap-table construction.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::backend::hashing::hash_value;
use crate::backend::spec::TensorSpec;
use crate::config::{RuntimeConfig, DEFAULT_KERNEL_CACHE_CAPACITY};
use crate::error::{OnnxError, OnnxResult};
use crate::onnx::{AttrsDict, ParamSchema};
use crate::tensor::{Tensor, Value};

/// Number of positional inputs an implementation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range { min: usize, max: usize },
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range { min, max } => (min..=max).contains(&count),
        }
    }

    fn check(self, op: &str, count: usize) -> OnnxResult<()> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(OnnxError::Arity {
                op: op.to_string(),
                expected: self.to_string(),
                actual: count,
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::Range { min, max } => write!(f, "between {min} and {max}"),
        }
    }
}

/// Static signature a kernel is compiled for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub attrs: AttrsDict,
    pub inputs: Vec<Option<TensorSpec>>,
}

impl KernelKey {
    pub fn new(attrs: AttrsDict, inputs: &[Value]) -> Self {
        Self {
            attrs,
            inputs: inputs.iter().map(Value::spec).collect(),
        }
    }

    pub fn input(&self, index: usize) -> Option<&TensorSpec> {
        self.inputs.get(index).and_then(Option::as_ref)
    }
}

type KernelFn = dyn Fn(&[Value]) -> OnnxResult<Vec<Tensor>> + Send + Sync;

/// Kernel specialized to one [`KernelKey`].
pub struct CompiledKernel {
    fingerprint: u64,
    run: Box<KernelFn>,
}

impl CompiledKernel {
    pub fn new<F>(key: &KernelKey, run: F) -> Self
    where
        F: Fn(&[Value]) -> OnnxResult<Vec<Tensor>> + Send + Sync + 'static,
    {
        Self {
            fingerprint: hash_value(key),
            run: Box::new(run),
        }
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn run(&self, inputs: &[Value]) -> OnnxResult<Vec<Tensor>> {
        (self.run)(inputs)
    }
}

impl fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("fingerprint", &format_args!("{:016x}", self.fingerprint))
            .finish()
    }
}

/// Validates a static signature and builds its kernel. Unsupported modes fail here, before
/// any computation runs.
pub type CompileFn = fn(&KernelKey) -> OnnxResult<CompiledKernel>;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_KERNEL_CACHE_CAPACITY) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

pub struct OpFunction {
    name: &'static str,
    arity: Arity,
    params: ParamSchema,
    compile: CompileFn,
    cache: Mutex<LruCache<KernelKey, Arc<CompiledKernel>>>,
    compiles: AtomicUsize,
}

impl OpFunction {
    /// Builds a function whose cache capacity follows [`RuntimeConfig::global`].
    pub fn new(name: &'static str, arity: Arity, params: ParamSchema, compile: CompileFn) -> Self {
        Self::with_cache_capacity(
            name,
            arity,
            params,
            compile,
            RuntimeConfig::global().kernel_cache_capacity,
        )
    }

    pub fn with_cache_capacity(
        name: &'static str,
        arity: Arity,
        params: ParamSchema,
        compile: CompileFn,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            name,
            arity,
            params,
            compile,
            cache: Mutex::new(LruCache::new(capacity)),
            compiles: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn params(&self) -> ParamSchema {
        self.params
    }

    /// Runs the function on positional inputs with call-ready static attributes.
    pub fn call(&self, inputs: &[Value], attrs: &AttrsDict) -> OnnxResult<Vec<Tensor>> {
        self.arity.check(self.name, inputs.len())?;
        let kernel = self.kernel_for(KernelKey::new(attrs.clone(), inputs))?;
        kernel.run(inputs)
    }

    /// Returns the compiled kernel for `key`, compiling on a miss.
    pub fn kernel_for(&self, key: KernelKey) -> OnnxResult<Arc<CompiledKernel>> {
        if let Some(kernel) = self.cache.lock().expect("kernel cache poisoned").get(&key) {
            tracing::trace!(function = self.name, fingerprint = kernel.fingerprint(), "kernel cache hit");
            return Ok(Arc::clone(kernel));
        }

        let compiled = Arc::new((self.compile)(&key)?);
        self.compiles.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            function = self.name,
            fingerprint = compiled.fingerprint(),
            "kernel cache miss, compiled"
        );

        let mut cache = self.cache.lock().expect("kernel cache poisoned");
        if let Some(existing) = cache.get(&key) {
            return Ok(Arc::clone(existing));
        }
        cache.put(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Total compilations performed, including ones that lost an insertion race.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }

    pub fn cached_variants(&self) -> usize {
        self.cache.lock().expect("kernel cache poisoned").len()
    }
}

impl fmt::Debug for OpFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field(
                "params",
                &self.params.iter().map(|p| p.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
