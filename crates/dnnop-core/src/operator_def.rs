use crate::argument::{self, text_escape, Argument, FromArgValue};
use crate::device::DeviceOption;
use crate::error::Result;

// OperatorDef - Serializable description of one node of the execution graph
//
// The engine builds operators from these. Besides wiring (input and output
// blob names) a definition carries the device option the operator's context
// is built from, an optional engine tag, and the arguments kernels read their
// configuration from.
//
// USAGE:
//   let def = OperatorDef::new("Relu")
//       .with_name("relu1")
//       .with_input("X")
//       .with_output("Y")
//       .with_device_option(DeviceOption::mkldnn());

/// Definition of a single operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorDef {
    op_type: String,
    name: String,
    engine: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    args: Vec<Argument>,
    device_option: Option<DeviceOption>,
}

impl OperatorDef {
    pub fn new(op_type: impl Into<String>) -> Self {
        OperatorDef {
            op_type: op_type.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_input(mut self, blob: impl Into<String>) -> Self {
        self.inputs.push(blob.into());
        self
    }

    pub fn with_output(mut self, blob: impl Into<String>) -> Self {
        self.outputs.push(blob.into());
        self
    }

    pub fn with_arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_device_option(mut self, option: DeviceOption) -> Self {
        self.device_option = Some(option);
        self
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// The device option, or the default (CPU) option when none was set.
    pub fn device_option(&self) -> DeviceOption {
        self.device_option.clone().unwrap_or_default()
    }

    pub fn has_device_option(&self) -> bool {
        self.device_option.is_some()
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.args.iter().any(|a| a.name == name)
    }

    /// Read argument `name` as a single `T`, or `default` when absent.
    pub fn get_single_argument<T: FromArgValue>(&self, name: &str, default: T) -> Result<T> {
        argument::get_single_argument(&self.args, name, default)
    }

    /// Read argument `name` as a list of `T`; empty when absent.
    pub fn get_repeated_argument<T: FromArgValue>(&self, name: &str) -> Result<Vec<T>> {
        argument::get_repeated_argument(&self.args, name)
    }

    /// Human-readable text rendering, one field per line, in the order the
    /// fields are numbered in the serialized format. Unset fields are skipped.
    pub fn debug_string(&self) -> String {
        let mut out = String::new();
        for input in &self.inputs {
            out.push_str(&format!("input: \"{}\"\n", text_escape(input)));
        }
        for output in &self.outputs {
            out.push_str(&format!("output: \"{}\"\n", text_escape(output)));
        }
        if !self.name.is_empty() {
            out.push_str(&format!("name: \"{}\"\n", text_escape(&self.name)));
        }
        if !self.op_type.is_empty() {
            out.push_str(&format!("type: \"{}\"\n", text_escape(&self.op_type)));
        }
        for arg in &self.args {
            arg.write_debug(&mut out);
        }
        if let Some(opt) = &self.device_option {
            out.push_str("device_option {\n");
            out.push_str(&format!("  device_type: {}\n", opt.device_type.proto_id()));
            if opt.device_id != 0 {
                out.push_str(&format!("  device_id: {}\n", opt.device_id));
            }
            if let Some(seed) = opt.random_seed {
                out.push_str(&format!("  random_seed: {}\n", seed));
            }
            if let Some(node) = opt.numa_node_id {
                out.push_str(&format!("  numa_node_id: {}\n", node));
            }
            out.push_str("}\n");
        }
        if !self.engine.is_empty() {
            out.push_str(&format!("engine: \"{}\"\n", text_escape(&self.engine)));
        }
        out
    }
}
