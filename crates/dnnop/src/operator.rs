use std::fmt;

use dnnop_core::{
    DeviceContext, Event, Operator, OperatorBase, OperatorDef, Result, Shape, WithDType, Workspace,
};

use crate::context::DnnContext;
use crate::memory::DnnMemory;
use crate::primitive::{check_status, PrimitiveWrapper, Resources};

// DnnOperator - Adapter between the execution engine and kernel primitives
//
// A concrete operator is a DnnKernel: it only implements `run_on_device`,
// which configures the primitive and resources held in DnnOperatorBase and
// calls `execute_primitive`. DnnOperator owns both and implements the
// engine-facing Operator trait, so every kernel gets the same run protocol:
//
//   run_on_device -> Ok(true)  => event set finished,  run returns Ok(true)
//   run_on_device -> Ok(false) => event failed(diag),  run returns Ok(false)
//   run_on_device -> Err(e)    => e += diag, event failed(e), run returns Err(e)
//
// An error raised while signaling the event gets the same diag appended.
//
// where diag is the "Error from operator: ..." text from `error_msg`.
//
// Kernels run synchronously on the calling thread, so the stream id taken by
// run/wait_event/wait_events is ignored.
//
// USAGE:
//   struct Relu;
//   impl DnnKernel<f32> for Relu {
//       fn run_on_device(&mut self, op: &mut DnnOperatorBase<f32>) -> Result<bool> { .. }
//   }
//   let mut op = DnnOperator::new(&def, &mut ws, Relu)?;
//   op.base_mut().set_event(&event);
//   op.run(0)?;

/// Shapes of the inputs seen on the previous run, one entry per input slot.
///
/// Kernels use it to decide when their primitives must be rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSizeCache {
    sizes: Vec<Shape>,
}

impl InputSizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Shape> {
        self.sizes.get(slot)
    }

    /// Store `shape` for `slot`, growing the cache as needed. Returns
    /// whether the slot was empty or held a different shape.
    pub fn check_and_update(&mut self, slot: usize, shape: &Shape) -> bool {
        if slot >= self.sizes.len() {
            self.sizes.resize(slot + 1, Shape::default());
            self.sizes[slot] = shape.clone();
            return true;
        }
        if &self.sizes[slot] == shape {
            return false;
        }
        self.sizes[slot] = shape.clone();
        true
    }

    pub fn clear(&mut self) {
        self.sizes.clear();
    }
}

/// State shared by every math-kernel operator: framework operator state, the
/// device context, the primitive, its resource bindings, the input-size cache
/// and a scratch output buffer.
pub struct DnnOperatorBase<T: WithDType, C: DeviceContext = DnnContext> {
    base: OperatorBase,
    context: C,
    primitive: PrimitiveWrapper<T>,
    input_size_cache: InputSizeCache,
    buffer: DnnMemory<T>,
    resources: Resources<T>,
}

impl<T: WithDType, C: DeviceContext + fmt::Debug> fmt::Debug for DnnOperatorBase<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnnOperatorBase")
            .field("base", &self.base)
            .field("context", &self.context)
            .field("primitive", &self.primitive)
            .field("input_size_cache", &self.input_size_cache)
            .field("resources", &self.resources)
            .finish()
    }
}

impl<T: WithDType, C: DeviceContext> DnnOperatorBase<T, C> {
    fn new(def: &OperatorDef, ws: &mut Workspace) -> Result<Self> {
        let base = OperatorBase::new(def, ws)?;
        let context = C::new(&def.device_option())?;
        Ok(DnnOperatorBase {
            base,
            context,
            primitive: PrimitiveWrapper::new(),
            input_size_cache: InputSizeCache::new(),
            buffer: DnnMemory::default(),
            resources: Resources::new(),
        })
    }

    /// Framework-side operator state.
    pub fn operator(&self) -> &OperatorBase {
        &self.base
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Typed buffer stored in input blob `idx`.
    pub fn input(&self, idx: usize) -> Result<DnnMemory<T>> {
        self.base.input::<DnnMemory<T>>(idx)
    }

    /// Typed buffer stored in output blob `idx`; the blob is given an empty
    /// buffer if it does not hold one yet.
    pub fn output(&self, idx: usize) -> Result<DnnMemory<T>> {
        self.base.output::<DnnMemory<T>>(idx)
    }

    pub fn primitive(&self) -> &PrimitiveWrapper<T> {
        &self.primitive
    }

    pub fn primitive_mut(&mut self) -> &mut PrimitiveWrapper<T> {
        &mut self.primitive
    }

    pub fn resources(&self) -> &Resources<T> {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources<T> {
        &mut self.resources
    }

    pub fn input_size_cache(&self) -> &InputSizeCache {
        &self.input_size_cache
    }

    pub fn input_size_cache_mut(&mut self) -> &mut InputSizeCache {
        &mut self.input_size_cache
    }

    /// Compare input `idx`'s current shape against the cache and update it.
    pub fn input_dims_changed(&mut self, idx: usize) -> Result<bool> {
        let shape = self.input(idx)?.shape()?;
        Ok(self.input_size_cache.check_and_update(idx, &shape))
    }

    /// Scratch buffer for operators with a single output.
    pub fn buffer(&self) -> &DnnMemory<T> {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut DnnMemory<T> {
        &mut self.buffer
    }

    /// Execute the primitive against the current resource bindings.
    ///
    /// Bindings are not validated here; a primitive reports missing or
    /// mismatched resources through its status, which becomes an
    /// `Error::Kernel`. The associated event is not touched.
    pub fn execute_primitive(&self) -> Result<()> {
        tracing::trace!(
            primitive = self.primitive.name().unwrap_or("<null>"),
            "execute primitive"
        );
        check_status(self.primitive.execute(&self.resources), "dnnExecute")
    }

    /// Diagnostic attached to every failure of this operator.
    pub fn error_msg(&self) -> String {
        match self.base.debug_def() {
            Some(def) => format!("Error from operator: {}", def.debug_string()),
            None => "Error from operator: no op def".to_string(),
        }
    }

    fn record_event(&self, err_msg: Option<&str>) -> Result<()> {
        match self.base.event() {
            Some(event) => self.context.record(&event, err_msg),
            None => Ok(()),
        }
    }
}

/// The hook every math-kernel operator implements.
pub trait DnnKernel<T: WithDType, C: DeviceContext = DnnContext>: Send {
    /// Do the work. `Ok(true)` on success, `Ok(false)` on a recoverable
    /// failure, `Err` for precondition and kernel failures.
    fn run_on_device(&mut self, op: &mut DnnOperatorBase<T, C>) -> Result<bool>;
}

/// A math-kernel operator: kernel `K` driven through the shared run protocol.
pub struct DnnOperator<T: WithDType, K, C: DeviceContext = DnnContext> {
    state: DnnOperatorBase<T, C>,
    kernel: K,
}

impl<T, K, C> DnnOperator<T, K, C>
where
    T: WithDType,
    K: DnnKernel<T, C>,
    C: DeviceContext,
{
    /// Build the operator for `def`, resolving its blobs in `ws` and creating
    /// its device context from the definition's device option.
    pub fn new(def: &OperatorDef, ws: &mut Workspace, kernel: K) -> Result<Self> {
        Ok(DnnOperator {
            state: DnnOperatorBase::new(def, ws)?,
            kernel,
        })
    }

    pub fn state(&self) -> &DnnOperatorBase<T, C> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DnnOperatorBase<T, C> {
        &mut self.state
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }
}

impl<T, K, C> Operator for DnnOperator<T, K, C>
where
    T: WithDType,
    K: DnnKernel<T, C>,
    C: DeviceContext,
{
    fn base(&self) -> &OperatorBase {
        &self.state.base
    }

    fn base_mut(&mut self) -> &mut OperatorBase {
        &mut self.state.base
    }

    fn run(&mut self, _stream_id: i32) -> Result<bool> {
        let span = tracing::debug_span!(
            "dnn_run",
            op = %self.state.base.debug_name(),
            dtype = %T::DTYPE
        );
        let _enter = span.enter();

        match self.kernel.run_on_device(&mut self.state) {
            Ok(true) => {
                if let Some(event) = self.state.base.event() {
                    event
                        .set_finished(None)
                        .map_err(|e| e.append_message(self.state.error_msg()))?;
                }
                tracing::debug!("finished");
                Ok(true)
            }
            Ok(false) => {
                let msg = self.state.error_msg();
                tracing::warn!(error = %msg, "run_on_device reported failure");
                self.state
                    .record_event(Some(&msg))
                    .map_err(|e| e.append_message(msg))?;
                Ok(false)
            }
            Err(err) => {
                let err = err.append_message(self.state.error_msg());
                let text = err.to_string();
                tracing::error!(error = %text, "run_on_device failed");
                if let Err(record_err) = self.state.record_event(Some(&text)) {
                    tracing::error!(error = %record_err, "could not fail the event");
                }
                Err(err)
            }
        }
    }

    fn wait_event(&self, event: &Event, _stream_id: i32) -> Result<()> {
        self.state.context.wait_event(event)
    }

    fn wait_events(&self, events: &[&Event], _stream_id: i32) -> Result<()> {
        let mut first_err = None;
        for event in events {
            if let Err(err) = self.state.context.wait_event(event) {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record_event(&self, err_msg: Option<&str>) -> Result<()> {
        self.state.record_event(err_msg)
    }
}
