use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// Naming and formatting knobs for the emitted artifacts.
///
/// Every field has a default, so a partial JSON object is enough:
///
/// ```rust
/// use wdlflow::Settings;
///
/// let settings = Settings::from_json(r#"{ "version": "1.0" }"#)?;
/// assert_eq!(settings.workflow_name, "my_workflow");
/// assert_eq!(settings.version.as_deref(), Some("1.0"));
/// # Ok::<(), wdlflow::CompileError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub workflow_name: String,
    /// File name of the workflow document.
    pub document_name: String,
    /// Emitted as a `version` header when set.
    pub version: Option<String>,
    /// One level of indentation.
    pub indent: String,
    /// Program invoked by each task's command.
    pub interpreter: String,
    pub script_extension: String,
    pub input_prefix: String,
    pub output_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workflow_name: "my_workflow".into(),
            document_name: "wdl_script.wdl".into(),
            version: None,
            indent: "    ".into(),
            interpreter: "python".into(),
            script_extension: "py".into(),
            input_prefix: "input_".into(),
            output_prefix: "output_".into(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn workflow_name(mut self, name: impl Into<String>) -> Self {
        self.workflow_name = name.into();
        self
    }

    pub fn document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    pub fn interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn script_extension(mut self, extension: impl Into<String>) -> Self {
        self.script_extension = extension.into();
        self
    }

    pub(crate) fn input_name(&self, slot: usize) -> String {
        format!("{}{slot}", self.input_prefix)
    }

    pub(crate) fn output_name(&self, slot: usize) -> String {
        format!("{}{slot}", self.output_prefix)
    }

    /// File a task writes its output to, read back by the document.
    pub(crate) fn output_file(&self, task: &str, slot: usize) -> String {
        format!("{task}_{}.txt", self.output_name(slot))
    }

    pub(crate) fn script_name(&self, task: &str) -> String {
        format!("{task}.{}", self.script_extension)
    }
}
