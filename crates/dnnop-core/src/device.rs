use std::fmt;

use crate::error::Result;
use crate::event::Event;

// Device - Device options and the per-operator device context
//
// An OperatorDef carries a DeviceOption telling the engine where the operator
// runs. Each backend turns that option into a DeviceContext, the handle an
// operator uses to wait on and record events against its device queue.
//
// Operator adapters are generic over the DeviceContext they drive.

/// Kind of compute device, numbered as in the serialized net format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    #[default]
    Cpu,
    Cuda,
    Mkldnn,
}

impl DeviceType {
    /// Numeric id used in serialized definitions.
    pub fn proto_id(&self) -> i32 {
        match self {
            DeviceType::Cpu => 0,
            DeviceType::Cuda => 1,
            DeviceType::Mkldnn => 2,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceType::Cpu => "CPU",
            DeviceType::Cuda => "CUDA",
            DeviceType::Mkldnn => "MKLDNN",
        };
        write!(f, "{}", s)
    }
}

/// Where an operator runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceOption {
    pub device_type: DeviceType,
    pub device_id: i32,
    pub numa_node_id: Option<i32>,
    pub random_seed: Option<u32>,
}

impl DeviceOption {
    pub fn new(device_type: DeviceType) -> Self {
        Self {
            device_type,
            ..Default::default()
        }
    }

    /// Host CPU.
    pub fn cpu() -> Self {
        Self::new(DeviceType::Cpu)
    }

    /// Host CPU through the math-kernel library.
    pub fn mkldnn() -> Self {
        Self::new(DeviceType::Mkldnn)
    }

    pub fn with_device_id(mut self, device_id: i32) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_numa_node(mut self, numa_node_id: i32) -> Self {
        self.numa_node_id = Some(numa_node_id);
        self
    }

    pub fn with_random_seed(mut self, seed: u32) -> Self {
        self.random_seed = Some(seed);
        self
    }
}

/// Per-operator handle to a device queue.
///
/// Contexts are owned by exactly one operator. Wait and record are expected
/// to be called from the thread that runs the operator.
pub trait DeviceContext: Sized + Send {
    /// Build a context for the given device option. Fails when the option
    /// names a device this context cannot drive.
    fn new(option: &DeviceOption) -> Result<Self>;

    /// The device type this context drives.
    fn device_type(&self) -> DeviceType;

    /// Block until `event` no longer has pending work on its device.
    fn wait_event(&self, event: &Event) -> Result<()>;

    /// Record `event` on this context's queue, or fail it with `err_msg`.
    fn record(&self, event: &Event, err_msg: Option<&str>) -> Result<()>;
}
