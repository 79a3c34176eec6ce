//! The result of a translation and how it lands on disk.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::CompileError;
use crate::plan::Plan;
use crate::script::Script;

/// Everything produced by [`Manager::translate`](crate::Manager::translate).
#[derive(Debug, Clone)]
pub struct Translation {
    /// The workflow document.
    pub document: String,
    pub document_name: String,
    /// One script per task, in declaration order.
    pub scripts: Vec<Script>,
    pub plan: Plan,
}

impl Translation {
    /// Writes the document and every script into `dir`, creating it if
    /// needed. Returns the written paths.
    ///
    /// Either every file is written or none is: on failure the files written
    /// so far are removed again.
    pub fn write(&self, dir: impl AsRef<Utf8Path>) -> Result<Vec<Utf8PathBuf>, CompileError> {
        let dir = dir.as_ref();

        fs::create_dir_all(dir).map_err(|e| CompileError::Write(dir.to_owned(), e))?;

        let files = std::iter::once((self.document_name.as_str(), self.document.as_str())).chain(
            self.scripts
                .iter()
                .map(|script| (script.file_name.as_str(), script.content.as_str())),
        );

        let mut written = Vec::new();

        for (name, content) in files {
            let path = dir.join(name);

            if let Err(e) = fs::write(&path, content) {
                for path in &written {
                    let _ = fs::remove_file(path);
                }
                return Err(CompileError::Write(path, e));
            }

            tracing::debug!(%path, "wrote artifact");
            written.push(path);
        }

        tracing::info!(dir = %dir, files = written.len(), "wrote translation");

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::Manager;
    use crate::script::EmbeddedBody;
    use crate::types::WdlType;
    use crate::workflow::Workflow;

    fn translation() -> Translation {
        let mut manager = Manager::new();
        let first = manager
            .task("first")
            .output(WdlType::Int)
            .body("def first():\n    return 1\n")
            .register()
            .unwrap();
        let second = manager
            .task("second")
            .input(WdlType::Int)
            .body("def second(x):\n    print(x)\n")
            .register()
            .unwrap();

        manager.add_workflow(&Workflow::new(first).forward(second)).unwrap();
        manager.translate(&EmbeddedBody).unwrap()
    }

    #[test]
    fn test_write_all_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().join("out")).unwrap();

        let translation = translation();
        let written = translation.write(&dir).unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(
            fs::read_to_string(dir.join("wdl_script.wdl")).unwrap(),
            translation.document
        );
        assert!(dir.join("first.py").exists());
        assert!(dir.join("second.py").exists());
    }

    #[test]
    fn test_failed_write_removes_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        // A directory in place of the last script makes its write fail.
        fs::create_dir(dir.join("second.py")).unwrap();

        let err = translation().write(&dir).unwrap_err();
        assert!(matches!(err, CompileError::Write(path, _) if path.ends_with("second.py")));
        assert!(!dir.join("wdl_script.wdl").exists());
        assert!(!dir.join("first.py").exists());
    }
}
