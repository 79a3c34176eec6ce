//! The closed set of types a value can carry, and literal payloads.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// Declared type of a task slot or a value in the graph.
///
/// `File` and `Condition` are refinements of `String`. A `Condition` is only
/// ever used as the discriminator of a branch and is spelled `String` in the
/// emitted document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WdlType {
    Boolean,
    Int,
    Float,
    String,
    File,
    Condition,
    Array(Box<WdlType>),
}

impl WdlType {
    /// Shorthand for `Array<element>`.
    pub fn array(element: WdlType) -> Self {
        WdlType::Array(Box::new(element))
    }

    /// Element type of an array, `None` for scalars.
    pub fn element(&self) -> Option<&WdlType> {
        match self {
            WdlType::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, WdlType::Array(_))
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, WdlType::Condition)
    }

    /// Whether a condition appears anywhere inside this type.
    pub(crate) fn mentions_condition(&self) -> bool {
        match self {
            WdlType::Condition => true,
            WdlType::Array(element) => element.mentions_condition(),
            _ => false,
        }
    }

    /// The type name as it is written in the emitted document.
    pub fn wdl_name(&self) -> String {
        match self {
            WdlType::Boolean => "Boolean".into(),
            WdlType::Int => "Int".into(),
            WdlType::Float => "Float".into(),
            WdlType::String | WdlType::Condition => "String".into(),
            WdlType::File => "File".into(),
            WdlType::Array(element) => format!("Array[{}]", element.wdl_name()),
        }
    }

    /// Standard library function used to read an output file back.
    pub(crate) fn read_function(&self) -> &'static str {
        match self {
            WdlType::Boolean => "read_boolean",
            WdlType::Int => "read_int",
            WdlType::Float => "read_float",
            WdlType::String | WdlType::File | WdlType::Condition => "read_string",
            WdlType::Array(_) => "read_json",
        }
    }
}

impl Display for WdlType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WdlType::Boolean => write!(f, "Boolean"),
            WdlType::Int => write!(f, "Int"),
            WdlType::Float => write!(f, "Float"),
            WdlType::String => write!(f, "String"),
            WdlType::File => write!(f, "File"),
            WdlType::Condition => write!(f, "Condition"),
            WdlType::Array(element) => write!(f, "Array[{element}]"),
        }
    }
}

/// A literal payload carried by a value with no producing task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    File(String),
    Condition(String),
    /// Element type is explicit so that empty arrays are still typed.
    Array(WdlType, Vec<Literal>),
}

impl Literal {
    /// Builds an array literal, checking every item against `element`.
    pub fn array(
        element: WdlType,
        items: impl IntoIterator<Item = Literal>,
    ) -> Result<Self, CompileError> {
        let items: Vec<_> = items.into_iter().collect();

        for item in &items {
            let found = item.ty();
            if found != element {
                return Err(CompileError::LiteralMismatch {
                    expected: element,
                    found,
                });
            }
        }

        Ok(Literal::Array(element, items))
    }

    pub fn ty(&self) -> WdlType {
        match self {
            Literal::Boolean(_) => WdlType::Boolean,
            Literal::Int(_) => WdlType::Int,
            Literal::Float(_) => WdlType::Float,
            Literal::String(_) => WdlType::String,
            Literal::File(_) => WdlType::File,
            Literal::Condition(_) => WdlType::Condition,
            Literal::Array(element, _) => WdlType::array(element.clone()),
        }
    }

    /// Renders the literal in the syntax of the emitted document.
    pub fn render(&self) -> String {
        match self {
            Literal::Boolean(value) => value.to_string(),
            Literal::Int(value) => value.to_string(),
            Literal::Float(value) => format!("{value:?}"),
            Literal::String(value) | Literal::File(value) | Literal::Condition(value) => {
                quote(value)
            }
            Literal::Array(_, items) => {
                let items: Vec<_> = items.iter().map(Literal::render).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}
