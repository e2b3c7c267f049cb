use std::sync::{Arc, Weak};

use crate::device::DeviceOption;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::operator_def::OperatorDef;
use crate::workspace::{Blob, Workspace};

// Operator - What the execution engine sees of every operator
//
// OperatorBase holds the backend-independent state: the resolved input and
// output blobs, the definition kept for diagnostics, and a non-owning
// reference to the event the engine handed out for this operator.
//
// The Operator trait is the polymorphic surface the engine drives. Every
// backend implements it; the stream id parameter exists so that one engine
// can dispatch to synchronous and stream-based backends alike.

/// Backend-independent operator state.
#[derive(Debug)]
pub struct OperatorBase {
    op_type: String,
    name: String,
    device_option: DeviceOption,
    inputs: Vec<Blob>,
    outputs: Vec<Blob>,
    debug_def: Option<Arc<OperatorDef>>,
    event: Option<Weak<Event>>,
}

impl OperatorBase {
    /// Resolve `def`'s blobs in `ws`. Inputs must already exist; outputs are
    /// created on demand.
    pub fn new(def: &OperatorDef, ws: &mut Workspace) -> Result<Self> {
        let inputs = def
            .inputs()
            .iter()
            .map(|name| {
                ws.get_blob(name)
                    .ok_or_else(|| Error::BlobNotFound { name: name.clone() })
            })
            .collect::<Result<Vec<_>>>()?;
        let outputs = def.outputs().iter().map(|name| ws.create_blob(name)).collect();
        Ok(OperatorBase {
            op_type: def.op_type().to_string(),
            name: def.name().to_string(),
            device_option: def.device_option(),
            inputs,
            outputs,
            debug_def: Some(Arc::new(def.clone())),
            event: None,
        })
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Operator name, falling back to its type when unnamed.
    pub fn debug_name(&self) -> &str {
        if self.name.is_empty() {
            &self.op_type
        } else {
            &self.name
        }
    }

    pub fn device_option(&self) -> &DeviceOption {
        &self.device_option
    }

    pub fn input_size(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_size(&self) -> usize {
        self.outputs.len()
    }

    pub fn input_blob(&self, idx: usize) -> Result<&Blob> {
        self.inputs.get(idx).ok_or(Error::IndexOutOfBounds {
            kind: "input",
            idx,
            len: self.inputs.len(),
        })
    }

    pub fn output_blob(&self, idx: usize) -> Result<&Blob> {
        self.outputs.get(idx).ok_or(Error::IndexOutOfBounds {
            kind: "output",
            idx,
            len: self.outputs.len(),
        })
    }

    /// Typed read access to input `idx`.
    pub fn input<T: Clone + 'static>(&self, idx: usize) -> Result<T> {
        self.input_blob(idx)?.get::<T>()
    }

    /// Typed access to output `idx`, default-initialising the blob when it
    /// is empty or holds another type.
    pub fn output<T: Clone + Default + Send + Sync + 'static>(&self, idx: usize) -> Result<T> {
        self.output_blob(idx)?.get_mutable::<T>()
    }

    pub fn has_debug_def(&self) -> bool {
        self.debug_def.is_some()
    }

    pub fn debug_def(&self) -> Option<&Arc<OperatorDef>> {
        self.debug_def.as_ref()
    }

    pub fn set_debug_def(&mut self, def: Arc<OperatorDef>) {
        self.debug_def = Some(def);
    }

    /// Drop the retained definition (engines do this to save memory).
    pub fn clear_debug_def(&mut self) {
        self.debug_def = None;
    }

    /// Associate the engine-owned `event` with this operator. Only a weak
    /// reference is kept.
    pub fn set_event(&mut self, event: &Arc<Event>) {
        self.event = Some(Arc::downgrade(event));
    }

    pub fn disable_event(&mut self) {
        self.event = None;
    }

    /// The associated event, if one was set and the engine still holds it.
    pub fn event(&self) -> Option<Arc<Event>> {
        self.event.as_ref().and_then(Weak::upgrade)
    }

    pub fn has_event(&self) -> bool {
        self.event().is_some()
    }
}

/// The interface the execution engine drives.
pub trait Operator: Send {
    fn base(&self) -> &OperatorBase;

    fn base_mut(&mut self) -> &mut OperatorBase;

    /// Run the operator. `Ok(false)` is a recoverable failure; `Err` aborts
    /// the current execution. Either way the associated event is signaled.
    fn run(&mut self, stream_id: i32) -> Result<bool>;

    /// Block until `event` is done with its pending work.
    fn wait_event(&self, event: &Event, stream_id: i32) -> Result<()>;

    /// Wait on each of `events` in order.
    fn wait_events(&self, events: &[&Event], stream_id: i32) -> Result<()>;

    /// Record the associated event, failing it when `err_msg` is given.
    /// Without an associated event this does nothing.
    fn record_event(&self, err_msg: Option<&str>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def() -> OperatorDef {
        OperatorDef::new("Copy")
            .with_name("copy1")
            .with_input("X")
            .with_output("Y")
    }

    #[test]
    fn test_missing_input_blob() {
        let mut ws = Workspace::new();
        let err = OperatorBase::new(&def(), &mut ws).unwrap_err();
        assert!(matches!(err, Error::BlobNotFound { ref name } if name == "X"));
    }

    #[test]
    fn test_outputs_are_created() {
        let mut ws = Workspace::new();
        ws.create_blob("X").reset(5u32).unwrap();
        let op = OperatorBase::new(&def(), &mut ws).unwrap();
        assert!(ws.has_blob("Y"));
        assert_eq!(op.input::<u32>(0).unwrap(), 5);
        assert_eq!(op.output::<u32>(0).unwrap(), 0);
        assert_eq!(op.debug_name(), "copy1");
    }

    #[test]
    fn test_index_out_of_bounds() {
        let mut ws = Workspace::new();
        ws.create_blob("X").reset(5u32).unwrap();
        let op = OperatorBase::new(&def(), &mut ws).unwrap();
        assert!(matches!(
            op.input::<u32>(1),
            Err(Error::IndexOutOfBounds {
                kind: "input",
                idx: 1,
                len: 1
            })
        ));
        assert!(matches!(
            op.output::<u32>(3),
            Err(Error::IndexOutOfBounds { kind: "output", .. })
        ));
    }

    #[test]
    fn test_event_is_not_owned() {
        let mut ws = Workspace::new();
        ws.create_blob("X").reset(5u32).unwrap();
        let mut op = OperatorBase::new(&def(), &mut ws).unwrap();
        assert!(!op.has_event());
        let ev = Arc::new(Event::new(&DeviceOption::mkldnn()));
        op.set_event(&ev);
        assert_eq!(op.event().map(|e| e.id()), Some(ev.id()));
        drop(ev);
        assert!(op.event().is_none());
    }

    #[test]
    fn test_debug_def() {
        let mut ws = Workspace::new();
        ws.create_blob("X").reset(5u32).unwrap();
        let mut op = OperatorBase::new(&def(), &mut ws).unwrap();
        assert!(op.has_debug_def());
        op.clear_debug_def();
        assert!(op.debug_def().is_none());

        let renamed = Arc::new(def().with_name("copy2"));
        op.set_debug_def(Arc::clone(&renamed));
        assert!(op.has_debug_def());
        assert_eq!(op.debug_def().map(|d| d.name()), Some("copy2"));
        // The resolved name is fixed at construction.
        assert_eq!(op.debug_name(), "copy1");
    }

    #[test]
    fn test_arity() {
        let mut ws = Workspace::new();
        ws.create_blob("A").reset(1u32).unwrap();
        ws.create_blob("B").reset(2u32).unwrap();
        let sum = OperatorDef::new("Sum")
            .with_input("A")
            .with_input("B")
            .with_output("C");
        let op = OperatorBase::new(&sum, &mut ws).unwrap();
        assert_eq!(op.input_size(), 2);
        assert_eq!(op.output_size(), 1);
        assert_eq!(op.input_blob(1).unwrap().name(), "B");
        assert_eq!(op.op_type(), "Sum");
        assert_eq!(op.debug_name(), "Sum");
    }

    #[test]
    fn test_disable_event() {
        let mut ws = Workspace::new();
        ws.create_blob("X").reset(5u32).unwrap();
        let mut op = OperatorBase::new(&def(), &mut ws).unwrap();
        let ev = Arc::new(Event::new(&DeviceOption::mkldnn()));
        op.set_event(&ev);
        assert!(op.has_event());
        op.disable_event();
        assert!(!op.has_event());
        assert!(op.event().is_none());
    }
}
