//! Per-task runnable scripts.

use camino::Utf8PathBuf;
#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::blueprint::Blueprint;
use crate::config::Settings;
use crate::error::{CompileError, ScriptError};
use crate::task::{Task, TaskId};
use crate::types::WdlType;

/// Supplies the executable body of a task.
///
/// The body is expected to define a function named after the task, taking
/// one positional argument per input slot. The entry point calling it is
/// appended by the compiler.
///
/// Any closure with the right signature is an exporter:
///
/// ```rust
/// use wdlflow::{ScriptExporter, Task};
///
/// let exporter = |task: &Task| -> anyhow::Result<String> {
///     Ok(format!("def {}():\n    return 1\n", task.name()))
/// };
/// # fn check(_: &impl ScriptExporter) {}
/// # check(&exporter);
/// ```
pub trait ScriptExporter: Send + Sync {
    fn render_script(&self, task: &Task) -> Result<String, ScriptError>;
}

impl<F> ScriptExporter for F
where
    F: Fn(&Task) -> Result<String, ScriptError> + Send + Sync,
{
    fn render_script(&self, task: &Task) -> Result<String, ScriptError> {
        self(task)
    }
}

/// Uses the body given to [`TaskDef::body`](crate::TaskDef::body).
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedBody;

impl ScriptExporter for EmbeddedBody {
    fn render_script(&self, task: &Task) -> Result<String, ScriptError> {
        match task.body() {
            Some(body) => Ok(body.to_string()),
            None => anyhow::bail!("no body was declared"),
        }
    }
}

/// A generated script, ready to be written next to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub task: String,
    pub file_name: Utf8PathBuf,
    pub content: String,
}

/// Renders one script per task, in the order given.
pub(crate) fn render_scripts<E>(
    blueprint: &Blueprint,
    tasks: &[TaskId],
    exporter: &E,
    settings: &Settings,
) -> Result<Vec<Script>, CompileError>
where
    E: ScriptExporter + ?Sized,
{
    let render = |task: &TaskId| render_script(&blueprint[*task], exporter, settings);

    #[cfg(feature = "parallel")]
    let scripts = tasks.par_iter().map(render).collect();

    #[cfg(not(feature = "parallel"))]
    let scripts = tasks.iter().map(render).collect();

    scripts
}

fn render_script<E>(task: &Task, exporter: &E, settings: &Settings) -> Result<Script, CompileError>
where
    E: ScriptExporter + ?Sized,
{
    let body = exporter
        .render_script(task)
        .map_err(|e| CompileError::Script(task.name().to_string(), e))?;

    tracing::debug!(task = task.name(), "rendered script");

    Ok(Script {
        task: task.name().to_string(),
        file_name: settings.script_name(task.name()).into(),
        content: format!(
            "import json\nimport sys\n\n\n{}\n\n\n{}",
            body.trim(),
            entry_point(task, settings)
        ),
    })
}

/// Converts the textual argument at `index` into the declared type.
fn coerce(ty: &WdlType, arg: &str) -> String {
    match ty {
        WdlType::Int => format!("int({arg})"),
        WdlType::Float => format!("float({arg})"),
        WdlType::Boolean => format!("{arg} == \"true\""),
        WdlType::String | WdlType::File | WdlType::Condition => arg.to_string(),
        WdlType::Array(element) if element.is_array() => format!("json.load(open({arg}))"),
        WdlType::Array(element) => format!(
            "[{} for item in {arg}.split(\",\") if item]",
            coerce(element, "item")
        ),
    }
}

fn entry_point(task: &Task, settings: &Settings) -> String {
    let name = task.name();
    let args: Vec<_> = task
        .input_types()
        .iter()
        .enumerate()
        .map(|(i, ty)| coerce(ty, &format!("args[{i}]")))
        .collect();

    let mut out = String::new();
    out.push_str("if __name__ == \"__main__\":\n");
    out.push_str("    args = sys.argv[1:]\n");

    if task.output_types().is_empty() {
        out.push_str(&format!("    {name}({})\n", args.join(", ")));
        return out;
    }

    out.push_str(&format!("    outputs = {name}({})\n", args.join(", ")));
    out.push_str("    if not isinstance(outputs, tuple):\n");
    out.push_str("        outputs = (outputs,)\n\n");

    for (slot, _) in task.output_types().iter().enumerate() {
        let file = settings.output_file(name, slot);
        out.push_str(&format!("    with open(\"{file}\", \"w\") as file:\n"));
        out.push_str(&format!("        output = outputs[{slot}]\n"));
        out.push_str("        if isinstance(output, (list, tuple)):\n");
        out.push_str("            file.write(json.dumps(list(output)))\n");
        out.push_str("        elif isinstance(output, bool):\n");
        out.push_str("            file.write(str(output).lower())\n");
        out.push_str("        else:\n");
        out.push_str("            file.write(str(output))\n");
    }

    out
}
