//! `.tbx` script loader: a small restricted interpreter for table extensions.

mod eval;
mod host;
mod lexer;
mod parser;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

pub use eval::SCRIPT_SUFFIX;
pub use host::HOST_MODULES;

use self::eval::{Compiled, CompiledModule};
use self::parser::Literal;
use super::{
    ExtensionCallable, ExtensionLoader, LoadOutcome, LoadRequest, ModuleId, ParamSpec,
};
use crate::error::{ExtensionError, Result};
use crate::table::{Table, Value};

#[derive(Debug)]
struct CachedModule {
    digest: String,
    module: Rc<CompiledModule>,
}

/// Loader for `.tbx` extensions.
///
/// Compiled modules are kept in an arena keyed by module id; a load with an
/// unchanged directory digest reuses the cached compilation.
#[derive(Debug, Default)]
pub struct ScriptLoader {
    arena: RefCell<HashMap<ModuleId, CachedModule>>,
}

impl ScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compiled modules currently cached.
    pub fn cached_modules(&self) -> usize {
        self.arena.borrow().len()
    }

    /// The compiled module for `request`, or the degraded outcome when a
    /// dependency is missing.
    fn module_for(
        &self,
        request: &LoadRequest<'_>,
    ) -> Result<std::result::Result<Rc<CompiledModule>, LoadOutcome>> {
        if let Some(cached) = self.arena.borrow().get(request.module_id)
            && cached.digest == request.digest
        {
            debug!(module = %request.module_id, "Reusing compiled module");
            return Ok(Ok(Rc::clone(&cached.module)));
        }

        let entry = request.module_dir.join(request.entry_file);
        match eval::compile(&entry)? {
            Compiled::Module(module) => {
                debug!(module = %request.module_id, entry = %entry.display(), "Compiled module");
                self.arena.borrow_mut().insert(
                    request.module_id.clone(),
                    CachedModule {
                        digest: request.digest.to_string(),
                        module: Rc::clone(&module),
                    },
                );
                Ok(Ok(module))
            }
            Compiled::Missing(dependency) => {
                self.arena.borrow_mut().remove(request.module_id);
                Ok(Err(LoadOutcome::Degraded(dependency)))
            }
        }
    }
}

impl ExtensionLoader for ScriptLoader {
    fn source_suffix(&self) -> &str {
        SCRIPT_SUFFIX
    }

    fn defines(&self, source: &str, name: &str) -> bool {
        parser::defines(source, name)
    }

    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadOutcome> {
        let module = match self.module_for(request)? {
            Ok(module) => module,
            Err(degraded) => return Ok(degraded),
        };

        let Some(def) = module.function(request.name) else {
            return Err(ExtensionError::DefinitionNotFound {
                name: request.name.to_string(),
                location: module.entry().display().to_string(),
            });
        };

        let params = def
            .params
            .iter()
            .map(|p| ParamSpec {
                name: p.name.clone(),
                default: p.default.as_ref().map(|d| match d {
                    Literal::Number(n) => n.to_string(),
                    Literal::Str(s) => format!("{:?}", s),
                }),
            })
            .collect();

        Ok(LoadOutcome::Loaded(Rc::new(ScriptFunction {
            name: request.name.to_string(),
            doc: def.doc.clone(),
            params,
            module,
        })))
    }

    fn evict(&self, module_id: &ModuleId) {
        self.arena.borrow_mut().remove(module_id);
    }
}

/// One function of a compiled script module.
#[derive(Debug)]
pub struct ScriptFunction {
    name: String,
    doc: String,
    params: Vec<ParamSpec>,
    module: Rc<CompiledModule>,
}

impl ExtensionCallable for ScriptFunction {
    fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    fn doc(&self) -> &str {
        &self.doc
    }

    fn call(&self, table: &mut Table, args: &[Value]) -> Result<Value> {
        eval::invoke(&self.module, &self.name, table, args)
    }
}
