use crate::error::{Error, Result};

// Argument - Named configuration values attached to an operator definition
//
// Kernels read their configuration (slopes, kernel sizes, strides, ...) from
// the arguments of their OperatorDef. A value is either a single scalar or a
// repeated list, and is converted to the requested Rust type on access.

/// Value of one operator argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Int(i64),
    Float(f32),
    Str(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strs(Vec<String>),
}

impl ArgValue {
    fn kind(&self) -> &'static str {
        match self {
            ArgValue::Int(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::Str(_) => "string",
            ArgValue::Ints(_) => "ints",
            ArgValue::Floats(_) => "floats",
            ArgValue::Strs(_) => "strings",
        }
    }
}

/// A named argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: ArgValue,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: ArgValue) -> Self {
        Argument {
            name: name.into(),
            value,
        }
    }

    pub fn int(name: impl Into<String>, v: i64) -> Self {
        Self::new(name, ArgValue::Int(v))
    }

    pub fn float(name: impl Into<String>, v: f32) -> Self {
        Self::new(name, ArgValue::Float(v))
    }

    pub fn string(name: impl Into<String>, v: impl Into<String>) -> Self {
        Self::new(name, ArgValue::Str(v.into()))
    }

    pub fn ints(name: impl Into<String>, v: Vec<i64>) -> Self {
        Self::new(name, ArgValue::Ints(v))
    }

    pub fn floats(name: impl Into<String>, v: Vec<f32>) -> Self {
        Self::new(name, ArgValue::Floats(v))
    }

    pub fn strings(name: impl Into<String>, v: Vec<String>) -> Self {
        Self::new(name, ArgValue::Strs(v))
    }

    /// Write this argument as a text-format `arg { .. }` block.
    pub(crate) fn write_debug(&self, out: &mut String) {
        out.push_str("arg {\n");
        out.push_str(&format!("  name: \"{}\"\n", text_escape(&self.name)));
        match &self.value {
            ArgValue::Int(v) => out.push_str(&format!("  i: {}\n", v)),
            ArgValue::Float(v) => out.push_str(&format!("  f: {}\n", v)),
            ArgValue::Str(v) => out.push_str(&format!("  s: \"{}\"\n", text_escape(v))),
            ArgValue::Ints(vs) => {
                for v in vs {
                    out.push_str(&format!("  ints: {}\n", v));
                }
            }
            ArgValue::Floats(vs) => {
                for v in vs {
                    out.push_str(&format!("  floats: {}\n", v));
                }
            }
            ArgValue::Strs(vs) => {
                for v in vs {
                    out.push_str(&format!("  strings: \"{}\"\n", text_escape(v)));
                }
            }
        }
        out.push_str("}\n");
    }
}

/// Escape `s` for use inside a double-quoted text-format string. Control
/// characters other than `\n`, `\r` and `\t` become three-digit octal escapes.
pub(crate) fn text_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c if c.is_ascii_control() => out.push_str(&format!("\\{:03o}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Conversion from an argument value to a concrete Rust type.
pub trait FromArgValue: Sized {
    /// Read a single value. `None` if the stored kind does not fit.
    fn from_single(value: &ArgValue) -> Option<Self>;

    /// Read a repeated value. `None` if the stored kind does not fit.
    fn from_repeated(value: &ArgValue) -> Option<Vec<Self>>;
}

macro_rules! int_from_arg {
    ($($t:ty),*) => {
        $(
            impl FromArgValue for $t {
                fn from_single(value: &ArgValue) -> Option<Self> {
                    match value {
                        ArgValue::Int(v) => <$t>::try_from(*v).ok(),
                        _ => None,
                    }
                }

                fn from_repeated(value: &ArgValue) -> Option<Vec<Self>> {
                    match value {
                        ArgValue::Ints(vs) => vs.iter().map(|v| <$t>::try_from(*v).ok()).collect(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

int_from_arg!(i64, i32, usize);

impl FromArgValue for bool {
    fn from_single(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    fn from_repeated(value: &ArgValue) -> Option<Vec<Self>> {
        match value {
            ArgValue::Ints(vs) => Some(vs.iter().map(|v| *v != 0).collect()),
            _ => None,
        }
    }
}

impl FromArgValue for f32 {
    fn from_single(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn from_repeated(value: &ArgValue) -> Option<Vec<Self>> {
        match value {
            ArgValue::Floats(vs) => Some(vs.clone()),
            _ => None,
        }
    }
}

impl FromArgValue for f64 {
    fn from_single(value: &ArgValue) -> Option<Self> {
        f32::from_single(value).map(f64::from)
    }

    fn from_repeated(value: &ArgValue) -> Option<Vec<Self>> {
        f32::from_repeated(value).map(|vs| vs.into_iter().map(f64::from).collect())
    }
}

impl FromArgValue for String {
    fn from_single(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Str(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn from_repeated(value: &ArgValue) -> Option<Vec<Self>> {
        match value {
            ArgValue::Strs(vs) => Some(vs.clone()),
            _ => None,
        }
    }
}

/// Error for an argument whose stored kind cannot be read as `T`.
pub(crate) fn conversion_error<T>(arg: &Argument) -> Error {
    Error::msg(format!(
        "argument '{}' of kind {} cannot be represented as {}",
        arg.name,
        arg.value.kind(),
        std::any::type_name::<T>()
    ))
}

/// Look up `name` in `args` and read it as a single `T`, or `default` when
/// the argument is absent.
pub fn get_single_argument<T: FromArgValue>(args: &[Argument], name: &str, default: T) -> Result<T> {
    match args.iter().find(|a| a.name == name) {
        None => Ok(default),
        Some(arg) => T::from_single(&arg.value).ok_or_else(|| conversion_error::<T>(arg)),
    }
}

/// Look up `name` in `args` and read it as a list of `T`. An absent argument
/// reads as an empty list.
pub fn get_repeated_argument<T: FromArgValue>(args: &[Argument], name: &str) -> Result<Vec<T>> {
    match args.iter().find(|a| a.name == name) {
        None => Ok(Vec::new()),
        Some(arg) => T::from_repeated(&arg.value).ok_or_else(|| conversion_error::<T>(arg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Vec<Argument> {
        vec![
            Argument::int("order", 1),
            Argument::float("slope", 0.25),
            Argument::ints("kernels", vec![3, 3]),
            Argument::string("mode", "max"),
        ]
    }

    #[test]
    fn test_single_argument() {
        let a = args();
        assert_eq!(get_single_argument::<i32>(&a, "order", 0).unwrap(), 1);
        assert!(get_single_argument::<bool>(&a, "order", false).unwrap());
        assert_eq!(get_single_argument::<f32>(&a, "slope", 0.0).unwrap(), 0.25);
        assert_eq!(get_single_argument::<f64>(&a, "slope", 0.0).unwrap(), 0.25);
        assert_eq!(
            get_single_argument::<String>(&a, "mode", String::new()).unwrap(),
            "max"
        );
    }

    #[test]
    fn test_missing_argument_uses_default() {
        let a = args();
        assert_eq!(get_single_argument::<i64>(&a, "absent", 42).unwrap(), 42);
        assert!(get_repeated_argument::<i64>(&a, "absent").unwrap().is_empty());
    }

    #[test]
    fn test_repeated_argument() {
        let a = args();
        assert_eq!(
            get_repeated_argument::<usize>(&a, "kernels").unwrap(),
            vec![3, 3]
        );
    }

    #[test]
    fn test_kind_mismatch() {
        let a = args();
        let err = get_single_argument::<f32>(&a, "order", 0.0).unwrap_err();
        assert!(err.to_string().contains("argument 'order' of kind int"));
        assert!(get_repeated_argument::<f32>(&a, "kernels").is_err());
    }

    #[test]
    fn test_text_escape() {
        assert_eq!(text_escape("plain"), "plain");
        assert_eq!(text_escape(r#"a"b"#), r#"a\"b"#);
        assert_eq!(text_escape(r"C:\tmp"), r"C:\\tmp");
        assert_eq!(text_escape("it's\n"), r"it\'s\n");
        assert_eq!(text_escape("\u{1}"), r"\001");
    }

    #[test]
    fn test_write_debug_escapes_strings() {
        let mut out = String::new();
        Argument::string("mode", "say \"hi\"").write_debug(&mut out);
        assert_eq!(out, "arg {\n  name: \"mode\"\n  s: \"say \\\"hi\\\"\"\n}\n");
    }

    #[test]
    fn test_negative_int_as_usize_fails() {
        let a = vec![Argument::int("pad", -1)];
        assert!(get_single_argument::<usize>(&a, "pad", 0).is_err());
    }
}
