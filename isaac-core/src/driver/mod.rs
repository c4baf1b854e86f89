//! The driver-facing collaborator boundary (spec.md §6). The real core
//! never talks to an OpenCL or CUDA runtime directly — it compiles source
//! text, sets kernel arguments by index, and enqueues on a queue through
//! these traits. A production build would provide bindings equivalent to
//! `ocl`/`cudarc`; this crate ships a `sim` backend so the rest of the core
//! is testable without a GPU, matching the spec's framing of the driver as
//! an external, swappable collaborator.

mod sim;
pub mod workspace;

pub use sim::{BoundArg, SimBackend, SimBuffer, SimContext, SimKernel, SimProgram, SimQueue};
pub use workspace::Workspace;

use crate::error::Result;
use isaac_types::NumericType;
use std::fmt;
use std::sync::Arc;

/// Which of the two host-side compute APIs a handle is bound to (§2, §6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    OpenClLike,
    CudaLike,
}

impl Backend {
    /// Device-appropriate spelling of floating-point infinity, used by
    /// reduction neutral elements (§4.1, §4.3.3).
    pub fn infinity_spelling(self, dtype: NumericType) -> String {
        match self {
            Backend::OpenClLike => "INFINITY".to_string(),
            Backend::CudaLike => format!("infinity<{}>()", dtype.device_name()),
        }
    }

    /// The token substitution table (§4.3, §9 "one emitter, two backends").
    pub fn keyword(self, token: Keyword) -> &'static str {
        match (self, token) {
            (Backend::OpenClLike, Keyword::Kernel) => "__kernel",
            (Backend::CudaLike, Keyword::Kernel) => "extern \"C\" __global__",
            (Backend::OpenClLike, Keyword::Global) => "__global",
            (Backend::CudaLike, Keyword::Global) => "",
            (Backend::OpenClLike, Keyword::Local) => "__local",
            (Backend::CudaLike, Keyword::Local) => "__shared__",
            (Backend::OpenClLike, Keyword::LocalIdx0) => "get_local_id(0)",
            (Backend::CudaLike, Keyword::LocalIdx0) => "threadIdx.x",
            (Backend::OpenClLike, Keyword::LocalIdx1) => "get_local_id(1)",
            (Backend::CudaLike, Keyword::LocalIdx1) => "threadIdx.y",
            (Backend::OpenClLike, Keyword::GlobalIdx0) => "get_global_id(0)",
            (Backend::CudaLike, Keyword::GlobalIdx0) => "(blockIdx.x*blockDim.x+threadIdx.x)",
            (Backend::OpenClLike, Keyword::GlobalIdx1) => "get_global_id(1)",
            (Backend::CudaLike, Keyword::GlobalIdx1) => "(blockIdx.y*blockDim.y+threadIdx.y)",
            (Backend::OpenClLike, Keyword::GlobalSize0) => "get_global_size(0)",
            (Backend::CudaLike, Keyword::GlobalSize0) => "(gridDim.x*blockDim.x)",
            (Backend::OpenClLike, Keyword::GlobalSize1) => "get_global_size(1)",
            (Backend::CudaLike, Keyword::GlobalSize1) => "(gridDim.y*blockDim.y)",
            (Backend::OpenClLike, Keyword::GroupId0) => "get_group_id(0)",
            (Backend::CudaLike, Keyword::GroupId0) => "blockIdx.x",
            (Backend::OpenClLike, Keyword::GroupId1) => "get_group_id(1)",
            (Backend::CudaLike, Keyword::GroupId1) => "blockIdx.y",
            (Backend::OpenClLike, Keyword::LocalBarrier) => "barrier(CLK_LOCAL_MEM_FENCE)",
            (Backend::CudaLike, Keyword::LocalBarrier) => "__syncthreads()",
            (Backend::OpenClLike, Keyword::SizeT) => "uint",
            (Backend::CudaLike, Keyword::SizeT) => "unsigned int",
            (Backend::OpenClLike, Keyword::Mad) => "mad",
            (Backend::CudaLike, Keyword::Mad) => "fma",
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub enum Keyword {
    Kernel,
    Global,
    Local,
    LocalIdx0,
    LocalIdx1,
    GlobalIdx0,
    GlobalIdx1,
    GlobalSize0,
    GlobalSize1,
    GroupId0,
    GroupId1,
    LocalBarrier,
    SizeT,
    Mad,
}

/// The global/local work-item layout for a kernel launch (§6).
#[derive(Copy, Clone, Debug, Default)]
pub struct NDRange {
    pub dims: [usize; 3],
}

impl NDRange {
    pub fn one_d(n: usize) -> Self {
        NDRange { dims: [n, 1, 1] }
    }
    pub fn two_d(n0: usize, n1: usize) -> Self {
        NDRange { dims: [n0, n1, 1] }
    }
}

/// Reference-counted handle onto device memory, shared by sub-views (§3).
pub trait Buffer: fmt::Debug + Send + Sync {
    fn size_bytes(&self) -> usize;
    fn backend(&self) -> Backend;
}

pub type BufferHandle = Arc<dyn Buffer>;

pub trait Context: fmt::Debug + Send + Sync {
    fn backend(&self) -> Backend;
    fn allocate(&self, bytes: usize) -> Result<BufferHandle>;
    /// The single growable scratch buffer shared by temporaries and
    /// kernel-internal workspaces (§5, §9).
    fn workspace(&self) -> &Workspace;

    /// Returns the context's workspace buffer, growing it to at least
    /// `bytes` first if needed (§4.3.3-5, §9).
    fn workspace_buffer(&self, bytes: usize) -> Result<BufferHandle>;
}

pub trait Program: fmt::Debug {
    fn kernel(&self, name: &str) -> Result<Box<dyn Kernel>>;
}

pub trait Kernel {
    fn set_size_arg(&mut self, index: u32, value: i64) -> Result<()>;
    fn set_buffer_arg(&mut self, index: u32, buffer: &BufferHandle) -> Result<()>;
    fn set_scalar_arg_bytes(&mut self, index: u32, bytes: &[u8]) -> Result<()>;
}

pub trait Event: fmt::Debug {
    /// Elapsed device time in milliseconds, used by tuning-mode timing
    /// (§4.4) and the predictor's external training (out of scope here).
    fn elapsed_ms(&self) -> f64;
}

pub trait CommandQueue: fmt::Debug {
    fn backend(&self) -> Backend;
    fn context(&self) -> Arc<dyn Context>;
    /// Compiles concatenated candidate source under this program's full set
    /// of kernel-name suffixes (§4.4 step 2).
    fn compile(&self, source: &str) -> Result<Arc<dyn Program>>;
    fn enqueue(
        &self,
        kernel: &dyn Kernel,
        global: NDRange,
        local: NDRange,
    ) -> Result<Box<dyn Event>>;
    fn synchronize(&self) -> Result<()>;
    /// Per-queue compiled-program cache (§4.5); single-writer discipline,
    /// all writes happen from the dispatcher on the owning thread (§5).
    fn program_cache(&self) -> &crate::cache::ProgramCache;
}
