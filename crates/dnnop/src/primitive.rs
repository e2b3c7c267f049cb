use std::fmt;

use dnnop_core::{Error, Result, WithDType};

use crate::memory::DnnMemory;

// Primitive - Opaque kernel plans and the resource array they execute on
//
// The math-kernel library exposes each optimized computation as a primitive:
// a plan created once for fixed layouts and then executed any number of times
// against a resource array. The array has one slot per resource kind the
// library defines; a primitive reads and writes the slots it was built for.
//
// Execution reports a library Status instead of an error. `check_status`
// turns a non-success status into an `Error::Kernel`, which operators
// propagate as a fatal error.

/// Number of slots in a resource array.
pub const RESOURCE_NUMBER: usize = 32;

const MULTIPLE_SRC_BASE: usize = 16;
const MULTIPLE_DST_BASE: usize = 24;
const MULTIPLE_SLOTS: usize = 8;

/// Resource kinds a primitive can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Src,
    Dst,
    Filter,
    Bias,
    DiffSrc,
    DiffFilter,
    DiffBias,
    DiffDst,
    Workspace,
    /// k-th source of a multi-input primitive (k < 8).
    MultipleSrc(usize),
    /// k-th destination of a multi-output primitive (k < 8).
    MultipleDst(usize),
}

impl Resource {
    /// Source of a conversion primitive.
    pub const FROM: Resource = Resource::Src;
    /// Destination of a conversion primitive.
    pub const TO: Resource = Resource::Dst;
    pub const SCALE_SHIFT: Resource = Resource::Filter;
    pub const MEAN: Resource = Resource::Bias;
    pub const DIFF_SCALE_SHIFT: Resource = Resource::DiffFilter;
    pub const VARIANCE: Resource = Resource::DiffBias;

    /// Slot index in the resource array.
    pub fn index(&self) -> Result<usize> {
        let idx = match *self {
            Resource::Src => 0,
            Resource::Dst => 1,
            Resource::Filter => 2,
            Resource::Bias => 3,
            Resource::DiffSrc => 4,
            Resource::DiffFilter => 5,
            Resource::DiffBias => 6,
            Resource::DiffDst => 7,
            Resource::Workspace => 8,
            Resource::MultipleSrc(k) | Resource::MultipleDst(k) if k >= MULTIPLE_SLOTS => {
                return Err(Error::IndexOutOfBounds {
                    kind: "multiple resource",
                    idx: k,
                    len: MULTIPLE_SLOTS,
                })
            }
            Resource::MultipleSrc(k) => MULTIPLE_SRC_BASE + k,
            Resource::MultipleDst(k) => MULTIPLE_DST_BASE + k,
        };
        Ok(idx)
    }
}

/// Status code returned by kernel calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const INCORRECT_INPUT_PARAMETER: Status = Status(-1);
    pub const UNEXPECTED_NULL_POINTER: Status = Status(-2);
    pub const MEMORY_ERROR: Status = Status(-3);
    pub const UNSUPPORTED_DIMENSION: Status = Status(-4);
    pub const UNIMPLEMENTED: Status = Status(-127);

    pub fn is_success(&self) -> bool {
        *self == Status::SUCCESS
    }

    /// Symbolic name of the status code.
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "E_SUCCESS",
            -1 => "E_INCORRECT_INPUT_PARAMETER",
            -2 => "E_UNEXPECTED_NULL_POINTER",
            -3 => "E_MEMORY_ERROR",
            -4 => "E_UNSUPPORTED_DIMENSION",
            -127 => "E_UNIMPLEMENTED",
            _ => "E_UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// Promote a non-success kernel status to a fatal error.
pub fn check_status(status: Status, call: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    tracing::error!(call = call, status = %status, "kernel call failed");
    Err(Error::Kernel {
        call: call.to_string(),
        code: status.0,
        name: status.name(),
    })
}

/// Fixed-size array of buffer bindings, indexed by `Resource`.
pub struct Resources<T: WithDType> {
    slots: [Option<DnnMemory<T>>; RESOURCE_NUMBER],
}

impl<T: WithDType> Default for Resources<T> {
    fn default() -> Self {
        Resources {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<T: WithDType> fmt::Debug for Resources<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect();
        f.debug_struct("Resources").field("bound", &bound).finish()
    }
}

impl<T: WithDType> Resources<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `memory` to `resource`, replacing any previous binding.
    pub fn bind(&mut self, resource: Resource, memory: &DnnMemory<T>) -> Result<()> {
        self.slots[resource.index()?] = Some(memory.clone());
        Ok(())
    }

    pub fn unbind(&mut self, resource: Resource) -> Result<()> {
        self.slots[resource.index()?] = None;
        Ok(())
    }

    /// The buffer bound to `resource`, if any.
    pub fn get(&self, resource: Resource) -> Option<&DnnMemory<T>> {
        resource
            .index()
            .ok()
            .and_then(|idx| self.slots[idx].as_ref())
    }

    /// The buffer bound to `resource`, or the status a kernel reports for a
    /// missing binding.
    pub fn require(&self, resource: Resource) -> std::result::Result<&DnnMemory<T>, Status> {
        self.get(resource).ok_or(Status::UNEXPECTED_NULL_POINTER)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// A pre-configured kernel computation.
pub trait Primitive<T: WithDType>: Send {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Run the computation against `resources`.
    fn execute(&self, resources: &Resources<T>) -> Status;
}

/// Optional owned primitive. Executing an empty wrapper reports
/// `Status::UNEXPECTED_NULL_POINTER`, as the library does for a null handle.
pub struct PrimitiveWrapper<T: WithDType> {
    primitive: Option<Box<dyn Primitive<T>>>,
}

impl<T: WithDType> Default for PrimitiveWrapper<T> {
    fn default() -> Self {
        PrimitiveWrapper { primitive: None }
    }
}

impl<T: WithDType> fmt::Debug for PrimitiveWrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveWrapper")
            .field("primitive", &self.name())
            .finish()
    }
}

impl<T: WithDType> PrimitiveWrapper<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held primitive.
    pub fn reset(&mut self, primitive: impl Primitive<T> + 'static) {
        self.primitive = Some(Box::new(primitive));
    }

    pub fn clear(&mut self) {
        self.primitive = None;
    }

    pub fn is_set(&self) -> bool {
        self.primitive.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.primitive.as_deref().map(|p| p.name())
    }

    pub fn execute(&self, resources: &Resources<T>) -> Status {
        match &self.primitive {
            Some(p) => p.execute(resources),
            None => Status::UNEXPECTED_NULL_POINTER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fill(f32);

    impl Primitive<f32> for Fill {
        fn name(&self) -> &str {
            "fill"
        }

        fn execute(&self, resources: &Resources<f32>) -> Status {
            let dst = match resources.require(Resource::Dst) {
                Ok(dst) => dst,
                Err(status) => return status,
            };
            match dst.write() {
                Ok(mut guard) => {
                    guard.as_mut_slice().iter_mut().for_each(|v| *v = self.0);
                    Status::SUCCESS
                }
                Err(_) => Status::MEMORY_ERROR,
            }
        }
    }

    #[test]
    fn test_resource_indices() {
        assert_eq!(Resource::Src.index().unwrap(), 0);
        assert_eq!(Resource::FROM, Resource::Src);
        assert_eq!(Resource::TO.index().unwrap(), 1);
        assert_eq!(Resource::Workspace.index().unwrap(), 8);
        assert_eq!(Resource::MultipleSrc(3).index().unwrap(), 19);
        assert_eq!(Resource::MultipleDst(7).index().unwrap(), 31);
        assert!(Resource::MultipleSrc(8).index().is_err());
    }

    #[test]
    fn test_bind_and_clear() {
        let mut res = Resources::<f32>::new();
        let m = DnnMemory::new(2);
        res.bind(Resource::Src, &m).unwrap();
        res.bind(Resource::MultipleSrc(1), &m).unwrap();
        assert_eq!(res.bound_count(), 2);
        assert!(res.get(Resource::Src).unwrap().same_storage(&m));
        assert_eq!(
            res.require(Resource::Dst).unwrap_err(),
            Status::UNEXPECTED_NULL_POINTER
        );
        res.unbind(Resource::Src).unwrap();
        assert_eq!(res.bound_count(), 1);
        res.clear();
        assert_eq!(res.bound_count(), 0);
    }

    #[test]
    fn test_status_names() {
        assert_eq!(Status::SUCCESS.name(), "E_SUCCESS");
        assert_eq!(Status(-4).to_string(), "E_UNSUPPORTED_DIMENSION (-4)");
        assert_eq!(Status(7).name(), "E_UNKNOWN");
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(Status::SUCCESS, "dnnExecute").is_ok());
        let err = check_status(Status::MEMORY_ERROR, "dnnExecute").unwrap_err();
        assert!(matches!(err, Error::Kernel { code: -3, .. }));
        assert_eq!(
            err.to_string(),
            "kernel call dnnExecute failed with status E_MEMORY_ERROR (-3)"
        );
    }

    #[test]
    fn test_wrapper_execute() {
        let mut prim = PrimitiveWrapper::<f32>::new();
        let mut res = Resources::new();
        assert_eq!(prim.execute(&res), Status::UNEXPECTED_NULL_POINTER);

        prim.reset(Fill(2.5));
        assert_eq!(prim.name(), Some("fill"));
        assert_eq!(prim.execute(&res), Status::UNEXPECTED_NULL_POINTER);

        let out = DnnMemory::new(3);
        res.bind(Resource::Dst, &out).unwrap();
        assert_eq!(prim.execute(&res), Status::SUCCESS);
        assert_eq!(out.to_vec().unwrap(), vec![2.5; 3]);

        prim.clear();
        assert!(!prim.is_set());
    }
}
