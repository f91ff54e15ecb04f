//! Compilation of a script module and evaluation of its functions.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::host;
use super::parser::{BinaryOp, Callee, Expr, FnDef, Literal, Script, StmtKind, parse};
use crate::error::{ExtensionError, IoResultExt, Result};
use crate::loader::MissingDependency;
use crate::table::{Table, Value};

/// Nesting limit for script-to-script calls.
const MAX_CALL_DEPTH: usize = 64;

pub const SCRIPT_SUFFIX: &str = "tbx";

#[derive(Debug)]
struct FnSource {
    def: FnDef,
    file: PathBuf,
}

/// All files reachable from an entry file through `use`, merged into one namespace.
#[derive(Debug)]
pub struct CompiledModule {
    entry: PathBuf,
    functions: HashMap<String, Rc<FnSource>>,
    constants: HashMap<String, Value>,
    imports: HashSet<String>,
}

#[derive(Debug)]
pub enum Compiled {
    Module(Rc<CompiledModule>),
    Missing(MissingDependency),
}

impl CompiledModule {
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    pub fn function(&self, name: &str) -> Option<&FnDef> {
        self.functions.get(name).map(|f| &f.def)
    }
}

/// Parse the entry file and everything it `use`s.
///
/// Unknown imports or missing `use` targets are reported as [`Compiled::Missing`]
/// rather than as errors.
pub fn compile(entry: &Path) -> Result<Compiled> {
    let mut visited = HashSet::new();
    let mut files = Vec::new();
    if let Some(missing) = collect_files(entry, &mut visited, &mut files)? {
        return Ok(Compiled::Missing(missing));
    }

    let mut module = CompiledModule {
        entry: entry.to_path_buf(),
        functions: HashMap::new(),
        constants: HashMap::new(),
        imports: HashSet::new(),
    };

    // Dependencies come first, so the entry file's definitions shadow theirs.
    for (file, script) in &files {
        module
            .imports
            .extend(script.imports.iter().map(|(m, _)| m.clone()));
        for def in &script.functions {
            module.functions.insert(
                def.name.clone(),
                Rc::new(FnSource {
                    def: def.clone(),
                    file: file.clone(),
                }),
            );
        }
    }

    for (file, script) in &files {
        for constant in &script.constants {
            let value = {
                let mut interp = Interpreter::new(&module, None, file, constant.line);
                let locals = HashMap::new();
                interp.eval(&constant.value, &locals)?
            };
            let value = match value {
                Operand::Value(v) => v,
                Operand::Table => Value::Nil,
            };
            module.constants.insert(constant.name.clone(), value);
        }
    }

    Ok(Compiled::Module(Rc::new(module)))
}

fn collect_files(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    files: &mut Vec<(PathBuf, Script)>,
) -> Result<Option<MissingDependency>> {
    if !visited.insert(path.to_path_buf()) {
        return Ok(None);
    }
    let source = fs::read_to_string(path).at_path(path)?;
    let script = parse(&source, path)?;

    for (module, _) in &script.imports {
        if !host::is_available(module) {
            return Ok(Some(MissingDependency {
                module: module.clone(),
            }));
        }
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    for (name, _) in &script.uses {
        let sibling = dir.join(format!("{}.{}", name, SCRIPT_SUFFIX));
        if !sibling.is_file() {
            return Ok(Some(MissingDependency {
                module: name.clone(),
            }));
        }
        if let Some(missing) = collect_files(&sibling, visited, files)? {
            return Ok(Some(missing));
        }
    }

    files.push((path.to_path_buf(), script));
    Ok(None)
}

/// Invoke `name` from `module` with `table` bound to its first parameter.
pub fn invoke(
    module: &CompiledModule,
    name: &str,
    table: &mut Table,
    args: &[Value],
) -> Result<Value> {
    let Some(source) = module.functions.get(name).cloned() else {
        return Err(ExtensionError::Script {
            file: module.entry.clone(),
            line: 0,
            message: format!("function '{}' is not defined", name),
        });
    };

    let mut operands = Vec::with_capacity(args.len() + 1);
    operands.push(Operand::Table);
    operands.extend(args.iter().cloned().map(Operand::Value));

    let mut interp = Interpreter::new(module, Some(table), &source.file, source.def.line);
    let result = interp.call_function(&source, operands)?;
    Ok(match result {
        Operand::Value(v) => v,
        Operand::Table => Value::Nil,
    })
}

#[derive(Debug, Clone)]
enum Operand {
    Value(Value),
    Table,
}

type Locals = HashMap<String, Operand>;

struct Interpreter<'a> {
    module: &'a CompiledModule,
    table: Option<&'a mut Table>,
    file: PathBuf,
    line: usize,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    fn new(
        module: &'a CompiledModule,
        table: Option<&'a mut Table>,
        file: &Path,
        line: usize,
    ) -> Self {
        Self {
            module,
            table,
            file: file.to_path_buf(),
            line,
            depth: 0,
        }
    }

    fn fail<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(ExtensionError::Script {
            file: self.file.clone(),
            line: self.line,
            message: message.into(),
        })
    }

    fn call_function(&mut self, source: &FnSource, args: Vec<Operand>) -> Result<Operand> {
        let def = &source.def;
        if args.len() > def.params.len() {
            return self.fail(format!(
                "{}() takes {} arguments but {} were given",
                def.name,
                def.params.len(),
                args.len()
            ));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return self.fail(format!("call depth exceeded in '{}'", def.name));
        }

        let mut locals = Locals::new();
        let mut args = args.into_iter();
        for param in &def.params {
            let value = match (args.next(), &param.default) {
                (Some(arg), _) => arg,
                (None, Some(Literal::Number(n))) => Operand::Value(Value::Number(*n)),
                (None, Some(Literal::Str(s))) => Operand::Value(Value::Text(s.clone())),
                (None, None) => {
                    return self.fail(format!(
                        "{}() missing required argument '{}'",
                        def.name, param.name
                    ));
                }
            };
            locals.insert(param.name.clone(), value);
        }

        let saved = (std::mem::replace(&mut self.file, source.file.clone()), self.line);
        self.depth += 1;
        let result = self.exec_body(def, &mut locals);
        self.depth -= 1;
        (self.file, self.line) = saved;
        result
    }

    fn exec_body(&mut self, def: &FnDef, locals: &mut Locals) -> Result<Operand> {
        for stmt in &def.body {
            self.line = stmt.line;
            match &stmt.kind {
                StmtKind::Let { name, value } => {
                    let value = self.eval(value, locals)?;
                    locals.insert(name.clone(), value);
                }
                StmtKind::SetColumn {
                    table,
                    column,
                    value,
                } => {
                    self.set_column(table, column, value, locals)?;
                }
                StmtKind::Return(expr) => {
                    return match expr {
                        Some(expr) => self.eval(expr, locals),
                        None => Ok(Operand::Value(Value::Nil)),
                    };
                }
                StmtKind::Expr(expr) => {
                    self.eval(expr, locals)?;
                }
            }
        }
        Ok(Operand::Value(Value::Nil))
    }

    fn set_column(
        &mut self,
        target: &str,
        column: &Expr,
        value: &Expr,
        locals: &Locals,
    ) -> Result<()> {
        if !matches!(locals.get(target), Some(Operand::Table)) {
            return self.fail(format!("'{}' is not a table", target));
        }
        let column = match self.eval_value(column, locals)? {
            Value::Text(name) => name,
            other => {
                return self.fail(format!(
                    "column name must be text, got {}",
                    other.type_name()
                ));
            }
        };
        let value = self.eval_value(value, locals)?;

        let (line, file) = (self.line, self.file.clone());
        let Some(table) = self.table.as_deref_mut() else {
            return self.fail("no table is available here");
        };
        let rows = table.len();
        let values = match value {
            Value::Column(values) => {
                if !table.column_names().is_empty() && values.len() != rows {
                    return Err(ExtensionError::Script {
                        file,
                        line,
                        message: format!(
                            "column '{}' has {} rows, table has {}",
                            column,
                            values.len(),
                            rows
                        ),
                    });
                }
                values
            }
            Value::Number(n) => vec![n; rows],
            other => {
                return Err(ExtensionError::Script {
                    file,
                    line,
                    message: format!("cannot store {} as a column", other.type_name()),
                });
            }
        };
        table.set_column(column, values);
        Ok(())
    }

    fn eval_value(&mut self, expr: &Expr, locals: &Locals) -> Result<Value> {
        match self.eval(expr, locals)? {
            Operand::Value(v) => Ok(v),
            Operand::Table => self.fail("a table cannot be used as a value here"),
        }
    }

    fn eval(&mut self, expr: &Expr, locals: &Locals) -> Result<Operand> {
        match expr {
            Expr::Number(n) => Ok(Operand::Value(Value::Number(*n))),
            Expr::Str(s) => Ok(Operand::Value(Value::Text(s.clone()))),
            Expr::Var(name) => {
                if let Some(value) = locals.get(name) {
                    return Ok(value.clone());
                }
                match self.module.constants.get(name) {
                    Some(value) => Ok(Operand::Value(value.clone())),
                    None => self.fail(format!("undefined name '{}'", name)),
                }
            }
            Expr::Member { module, member } => {
                self.require_import(module)?;
                match host::constant(module, member) {
                    Some(n) => Ok(Operand::Value(Value::Number(n))),
                    None => self.fail(format!("module '{}' has no member '{}'", module, member)),
                }
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, locals),
            Expr::Index { target, key } => self.eval_index(target, key, locals),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval_value(lhs, locals)?;
                let rhs = self.eval_value(rhs, locals)?;
                match binary(*op, lhs, rhs) {
                    Ok(v) => Ok(Operand::Value(v)),
                    Err(message) => self.fail(message),
                }
            }
            Expr::Neg(inner) => match self.eval_value(inner, locals)? {
                Value::Number(n) => Ok(Operand::Value(Value::Number(-n))),
                Value::Column(c) => Ok(Operand::Value(Value::Column(
                    c.into_iter().map(|x| -x).collect(),
                ))),
                other => self.fail(format!("cannot negate {}", other.type_name())),
            },
        }
    }

    fn require_import(&self, module: &str) -> Result<()> {
        if self.module.imports.contains(module) {
            Ok(())
        } else {
            self.fail(format!("module '{}' is not imported", module))
        }
    }

    fn eval_call(&mut self, callee: &Callee, args: &[Expr], locals: &Locals) -> Result<Operand> {
        match callee {
            Callee::Module { module, function } => {
                self.require_import(module)?;
                let values = args
                    .iter()
                    .map(|a| self.eval_value(a, locals))
                    .collect::<Result<Vec<_>>>()?;
                match host::call(module, function, &values) {
                    Ok(v) => Ok(Operand::Value(v)),
                    Err(message) => self.fail(message),
                }
            }
            Callee::Function(name) => {
                let Some(source) = self.module.functions.get(name).cloned() else {
                    return self.fail(format!("undefined function '{}'", name));
                };
                let operands = args
                    .iter()
                    .map(|a| self.eval(a, locals))
                    .collect::<Result<Vec<_>>>()?;
                self.call_function(&source, operands)
            }
        }
    }

    fn eval_index(&mut self, target: &Expr, key: &Expr, locals: &Locals) -> Result<Operand> {
        let target = self.eval(target, locals)?;
        let key = self.eval_value(key, locals)?;
        match (target, key) {
            (Operand::Table, Value::Text(name)) => {
                let column = self
                    .table
                    .as_deref()
                    .and_then(|t| t.column(&name))
                    .map(|c| c.to_vec());
                match column {
                    Some(c) => Ok(Operand::Value(Value::Column(c))),
                    None => self.fail(format!("table has no column '{}'", name)),
                }
            }
            (Operand::Value(Value::Column(values)), Value::Number(n)) => {
                let idx = n as usize;
                if n < 0.0 || n.fract() != 0.0 || idx >= values.len() {
                    return self.fail(format!(
                        "row index {} out of range for column of length {}",
                        n,
                        values.len()
                    ));
                }
                Ok(Operand::Value(Value::Number(values[idx])))
            }
            (Operand::Table, other) => self.fail(format!(
                "column name must be text, got {}",
                other.type_name()
            )),
            (Operand::Value(v), _) => self.fail(format!("cannot index into {}", v.type_name())),
        }
    }
}

fn apply(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
    }
}

/// Arithmetic with number-over-column broadcasting; `+` also joins text.
fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> std::result::Result<Value, String> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(apply(op, a, b))),
        (Value::Column(a), Value::Number(b)) => Ok(Value::Column(
            a.into_iter().map(|x| apply(op, x, b)).collect(),
        )),
        (Value::Number(a), Value::Column(b)) => Ok(Value::Column(
            b.into_iter().map(|x| apply(op, a, x)).collect(),
        )),
        (Value::Column(a), Value::Column(b)) => {
            if a.len() != b.len() {
                return Err(format!(
                    "column lengths differ ({} and {})",
                    a.len(),
                    b.len()
                ));
            }
            Ok(Value::Column(
                a.into_iter().zip(b).map(|(x, y)| apply(op, x, y)).collect(),
            ))
        }
        (Value::Text(a), Value::Text(b)) if op == BinaryOp::Add => Ok(Value::Text(a + &b)),
        (Value::Text(a), Value::Number(b)) if op == BinaryOp::Add => {
            Ok(Value::Text(format!("{}{}", a, b)))
        }
        (lhs, rhs) => Err(format!(
            "unsupported operand types for {}: {} and {}",
            op_symbol(op),
            lhs.type_name(),
            rhs.type_name()
        )),
    }
}
