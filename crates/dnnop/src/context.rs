use dnnop_core::{DeviceContext, DeviceOption, DeviceType, Event, Error, Result};

// DnnContext - Device context for math-kernel operators
//
// Kernel primitives run synchronously on the calling host thread, so there is
// no device to switch to and only one logical stream. Waiting and recording
// pass straight through to the event.

/// Context of an operator running through the math-kernel library.
#[derive(Debug, Clone)]
pub struct DnnContext {
    option: DeviceOption,
}

impl DnnContext {
    pub fn option(&self) -> &DeviceOption {
        &self.option
    }
}

impl DeviceContext for DnnContext {
    fn new(option: &DeviceOption) -> Result<Self> {
        if option.device_type != DeviceType::Mkldnn {
            return Err(Error::InvalidDevice {
                expected: DeviceType::Mkldnn,
                got: option.device_type,
            });
        }
        Ok(DnnContext {
            option: option.clone(),
        })
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::Mkldnn
    }

    fn wait_event(&self, event: &Event) -> Result<()> {
        event.wait()
    }

    fn record(&self, event: &Event, err_msg: Option<&str>) -> Result<()> {
        tracing::trace!(event = event.id(), failed = err_msg.is_some(), "record");
        event.record(DeviceType::Mkldnn, err_msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnnop_core::EventStatus;

    #[test]
    fn test_rejects_other_devices() {
        let err = DnnContext::new(&DeviceOption::cpu()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidDevice {
                expected: DeviceType::Mkldnn,
                got: DeviceType::Cpu
            }
        ));
        assert!(DnnContext::new(&DeviceOption::new(DeviceType::Cuda)).is_err());
    }

    #[test]
    fn test_record_and_wait() {
        let ctx = DnnContext::new(&DeviceOption::mkldnn().with_device_id(0)).unwrap();
        assert_eq!(ctx.device_type(), DeviceType::Mkldnn);
        let ev = Event::new(ctx.option());
        ctx.record(&ev, Some("failed early")).unwrap();
        assert_eq!(ev.query().unwrap(), EventStatus::Failed);
        ctx.wait_event(&ev).unwrap();
    }

    #[test]
    fn test_record_on_cpu_event_is_mismatch() {
        let ctx = DnnContext::new(&DeviceOption::mkldnn()).unwrap();
        let ev = Event::new(&DeviceOption::cpu());
        assert!(matches!(
            ctx.record(&ev, None),
            Err(Error::DeviceMismatch { .. })
        ));
    }
}
