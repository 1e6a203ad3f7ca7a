//! Script engine for `.act` files

use crate::actor::ActActor;
use crate::directive::{self, ActScript};
use dashmap::DashMap;
use servitor_engine::{CompileError, ScriptActor, ScriptEngine};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where `print` output goes
pub type Printer = Arc<dyn Fn(&str) + Send + Sync>;

/// Printer writing one line per call to stdout
pub fn stdout_printer() -> Printer {
    Arc::new(|line: &str| {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
    })
}

/// Compiles `.act` scripts found under a root directory.
///
/// Parsed scripts are cached by identifier, so spawning many children from
/// one script reads and parses it once.
pub struct ActEngine {
    root: PathBuf,
    scripts: DashMap<String, Arc<ActScript>>,
    printer: Printer,
}

impl ActEngine {
    /// Engine resolving script identifiers relative to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scripts: DashMap::new(),
            printer: stdout_printer(),
        }
    }

    /// Send `print` output somewhere other than stdout
    pub fn with_printer(mut self, printer: Printer) -> Self {
        self.printer = printer;
        self
    }

    /// Register a script from source instead of the file system
    pub fn with_script(self, name: &str, source: &str) -> Result<Self, CompileError> {
        let script = directive::parse(name, source)?;
        self.scripts.insert(name.to_string(), Arc::new(script));
        Ok(self)
    }

    /// Directory scripts are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, script_id: &str) -> Option<PathBuf> {
        let path = self.root.join(script_id);
        if path.is_file() {
            return Some(path);
        }
        if path.extension().is_none() {
            let with_ext = path.with_extension("act");
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }
        None
    }

    fn load(&self, script_id: &str) -> Result<Arc<ActScript>, CompileError> {
        if let Some(script) = self.scripts.get(script_id) {
            return Ok(script.value().clone());
        }

        let path = self
            .resolve(script_id)
            .ok_or_else(|| CompileError::NotFound(script_id.to_string()))?;
        let source = std::fs::read_to_string(&path).map_err(|err| CompileError::Load {
            script: script_id.to_string(),
            message: err.to_string(),
        })?;
        let script = Arc::new(directive::parse(script_id, &source)?);
        tracing::debug!(
            script = script_id,
            path = %path.display(),
            directives = script.directives.len(),
            "script compiled"
        );

        Ok(self
            .scripts
            .entry(script_id.to_string())
            .or_insert(script)
            .value()
            .clone())
    }
}

impl ScriptEngine for ActEngine {
    fn compile(&self, script_id: &str) -> Result<Box<dyn ScriptActor>, CompileError> {
        let script = self.load(script_id)?;
        Ok(Box::new(ActActor::new(script, self.printer.clone())))
    }
}
