//! # dnnop
//!
//! Scaffolding for tensor operators that delegate their work to a
//! math-kernel library.
//!
//! A concrete operator implements [`DnnKernel::run_on_device`]: it binds its
//! input and output buffers into the [`Resources`] array, (re)creates its
//! [`Primitive`] when input shapes change, and calls
//! [`DnnOperatorBase::execute_primitive`]. [`DnnOperator`] wraps the kernel
//! and implements the engine-facing [`Operator`] trait, signaling the
//! operator's event exactly once per run and attaching operator context to
//! every failure.
//!
//! ## Usage
//!
//! ```rust
//! use dnnop::prelude::*;
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `dnnop-core` | Errors, events, device options, operator definitions, workspaces |
//! | `dnnop` | Device context, typed buffers, primitives and the operator adapter |

pub mod context;
pub mod memory;
pub mod operator;
pub mod primitive;

pub use context::DnnContext;
pub use memory::{DnnMemory, MemoryData};
pub use operator::{DnnKernel, DnnOperator, DnnOperatorBase, InputSizeCache};
pub use primitive::{
    check_status, Primitive, PrimitiveWrapper, Resource, Resources, Status, RESOURCE_NUMBER,
};

/// Re-export core types.
pub use dnnop_core::{bail, enforce};
pub use dnnop_core::{
    ArgValue, Argument, Blob, DType, DeviceContext, DeviceOption, DeviceType, Error, Event,
    EventStatus, Operator, OperatorBase, OperatorDef, Result, Shape, WithDType, Workspace,
};

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::{
        Argument, DeviceContext, DeviceOption, DnnContext, DnnKernel, DnnMemory, DnnOperator,
        DnnOperatorBase, Error, Event, EventStatus, Operator, OperatorDef, Primitive, Resource,
        Resources, Result, Shape, Status, Workspace,
    };
}
