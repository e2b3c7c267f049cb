//! # dnnop-core
//!
//! Framework-side types the dnnop operator adapter plugs into.
//!
//! This crate provides:
//! - [`Error`] / [`Result`]: the single error type and the `bail!`/`enforce!` macros
//! - [`Event`]: completion/failure signal of one operator invocation
//! - [`DeviceOption`] / [`DeviceContext`]: where an operator runs and how it talks to that device
//! - [`OperatorDef`] / [`Argument`]: operator definitions and their configuration
//! - [`Workspace`] / [`Blob`]: named, type-erased operator inputs and outputs
//! - [`OperatorBase`] / [`Operator`]: shared operator state and the engine-facing trait
//! - [`Shape`] / [`DType`]: buffer dimensions and element types

pub mod argument;
pub mod device;
pub mod dtype;
pub mod error;
pub mod event;
pub mod operator;
pub mod operator_def;
pub mod shape;
pub mod workspace;

pub use argument::{ArgValue, Argument, FromArgValue};
pub use device::{DeviceContext, DeviceOption, DeviceType};
pub use dtype::{DType, WithDType};
pub use error::{Error, Result};
pub use event::{Event, EventStatus};
pub use operator::{Operator, OperatorBase};
pub use operator_def::OperatorDef;
pub use shape::Shape;
pub use workspace::{Blob, Workspace};
