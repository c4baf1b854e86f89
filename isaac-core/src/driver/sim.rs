//! A host-memory stand-in for a real OpenCL/CUDA driver. It never executes
//! generated device source — that's the out-of-scope collaborator's job —
//! but it does faithfully record compiled programs and bound kernel
//! arguments, which is everything the core's own tests need to assert on.

use super::{Backend, Buffer, BufferHandle, CommandQueue, Context, Event, Kernel, NDRange, Program, Workspace};
use crate::cache::ProgramCache;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct SimBuffer {
    bytes: usize,
    backend: Backend,
}

impl Buffer for SimBuffer {
    fn size_bytes(&self) -> usize {
        self.bytes
    }
    fn backend(&self) -> Backend {
        self.backend
    }
}

#[derive(Debug)]
pub struct SimContext {
    backend: Backend,
    workspace: Workspace,
}

impl Context for SimContext {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn allocate(&self, bytes: usize) -> Result<BufferHandle> {
        Ok(Arc::new(SimBuffer { bytes, backend: self.backend }))
    }

    fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn workspace_buffer(&self, bytes: usize) -> Result<BufferHandle> {
        let backend = self.backend;
        self.workspace.ensure(bytes, move |n| Ok(Arc::new(SimBuffer { bytes: n, backend })))
    }
}

#[derive(Debug)]
pub struct SimProgram {
    source: String,
}

impl Program for SimProgram {
    fn kernel(&self, name: &str) -> Result<Box<dyn Kernel>> {
        if !self.source.contains(name) {
            return Err(Error::RuntimeError(format!(
                "kernel `{name}` not found in compiled program"
            )));
        }
        Ok(Box::new(SimKernel { args: Vec::new() }))
    }
}

#[derive(Debug, Clone)]
pub enum BoundArg {
    Size(i64),
    Buffer(usize),
    ScalarBytes(Vec<u8>),
}

pub struct SimKernel {
    pub args: Vec<(u32, BoundArg)>,
}

impl fmt::Debug for SimKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimKernel").field("args", &self.args.len()).finish()
    }
}

impl Kernel for SimKernel {
    fn set_size_arg(&mut self, index: u32, value: i64) -> Result<()> {
        self.args.push((index, BoundArg::Size(value)));
        Ok(())
    }

    fn set_buffer_arg(&mut self, index: u32, buffer: &BufferHandle) -> Result<()> {
        self.args.push((index, BoundArg::Buffer(buffer.size_bytes())));
        Ok(())
    }

    fn set_scalar_arg_bytes(&mut self, index: u32, bytes: &[u8]) -> Result<()> {
        self.args.push((index, BoundArg::ScalarBytes(bytes.to_vec())));
        Ok(())
    }
}

#[derive(Debug)]
pub struct SimEvent {
    millis: f64,
}

impl Event for SimEvent {
    fn elapsed_ms(&self) -> f64 {
        self.millis
    }
}

pub struct SimQueue {
    backend: Backend,
    context: Arc<SimContext>,
    cache: ProgramCache,
    compiled: Mutex<HashMap<String, Arc<dyn Program>>>,
}

impl fmt::Debug for SimQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimQueue").field("backend", &self.backend).finish()
    }
}

impl CommandQueue for SimQueue {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn context(&self) -> Arc<dyn Context> {
        self.context.clone()
    }

    fn compile(&self, source: &str) -> Result<Arc<dyn Program>> {
        let mut compiled = self.compiled.lock().unwrap();
        if let Some(p) = compiled.get(source) {
            return Ok(p.clone());
        }
        let program: Arc<dyn Program> = Arc::new(SimProgram { source: source.to_string() });
        compiled.insert(source.to_string(), program.clone());
        Ok(program)
    }

    fn enqueue(&self, _kernel: &dyn Kernel, _global: NDRange, _local: NDRange) -> Result<Box<dyn Event>> {
        Ok(Box::new(SimEvent { millis: 0.0 }))
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    fn program_cache(&self) -> &ProgramCache {
        &self.cache
    }
}

pub struct SimBackend;

impl SimBackend {
    pub fn new_queue(backend: Backend) -> (Arc<SimContext>, Arc<SimQueue>) {
        let context = Arc::new(SimContext { backend, workspace: Workspace::new() });
        let queue = Arc::new(SimQueue {
            backend,
            context: context.clone(),
            cache: ProgramCache::new(),
            compiled: Mutex::new(HashMap::new()),
        });
        (context, queue)
    }
}
