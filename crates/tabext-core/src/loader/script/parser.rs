//! Parser for `.tbx` extension scripts.
//!
//! A script is line oriented. Top-level lines start at column 0; function
//! bodies are the indented lines that follow a `fn` header.

use std::path::Path;

use super::lexer::{Token, strip_comment, tokenize};
use crate::error::{ExtensionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Var(String),
    Member {
        module: String,
        member: String,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        key: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Neg(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Function(String),
    Module { module: String, function: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let { name: String, value: Expr },
    SetColumn { table: String, column: Expr, value: Expr },
    Return(Option<Expr>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

/// Literal default for a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Literal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: String,
    pub params: Vec<Param>,
    pub doc: String,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: String,
    pub value: Expr,
    pub line: usize,
}

/// Parsed contents of one script file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub imports: Vec<(String, usize)>,
    pub uses: Vec<(String, usize)>,
    pub constants: Vec<Constant>,
    pub functions: Vec<FnDef>,
}

/// Whether `source` has a top-level `fn <name>(` definition.
pub fn defines(source: &str, name: &str) -> bool {
    source.lines().any(|line| {
        let Some(rest) = line.strip_prefix("fn") else {
            return false;
        };
        if !rest.starts_with(char::is_whitespace) {
            return false;
        }
        let rest = rest.trim_start();
        let ident_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        &rest[..ident_len] == name && rest[ident_len..].trim_start().starts_with('(')
    })
}

pub fn parse(source: &str, file: &Path) -> Result<Script> {
    let mut script = Script::default();
    let mut pending_doc: Vec<String> = Vec::new();
    let mut current: Option<FnDef> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let err = |message: String| ExtensionError::Script {
            file: file.to_path_buf(),
            line: line_no,
            message,
        };

        let indented = raw.starts_with(char::is_whitespace);
        let trimmed = raw.trim_start();

        if !indented && let Some(doc) = trimmed.strip_prefix("///") {
            if let Some(def) = current.take() {
                script.functions.push(def);
            }
            pending_doc.push(doc.strip_prefix(' ').unwrap_or(doc).to_string());
            continue;
        }

        let code = strip_comment(raw);
        if code.trim().is_empty() {
            continue;
        }
        let tokens = tokenize(code).map_err(err)?;

        if indented {
            let Some(def) = current.as_mut() else {
                return Err(err("indented line outside of a function body".to_string()));
            };
            def.body.push(Stmt {
                kind: parse_statement(&tokens).map_err(err)?,
                line: line_no,
            });
            continue;
        }

        if let Some(def) = current.take() {
            script.functions.push(def);
        }

        match tokens.first() {
            Some(t) if t.is_ident("fn") => {
                let mut def = parse_fn_header(&tokens).map_err(err)?;
                def.doc = pending_doc.join("\n");
                def.line = line_no;
                pending_doc.clear();
                current = Some(def);
            }
            Some(t) if t.is_ident("import") => {
                script
                    .imports
                    .push((single_name(&tokens, "import").map_err(err)?, line_no));
                pending_doc.clear();
            }
            Some(t) if t.is_ident("use") => {
                script
                    .uses
                    .push((single_name(&tokens, "use").map_err(err)?, line_no));
                pending_doc.clear();
            }
            Some(t) if t.is_ident("let") => {
                let (name, value) = parse_let(&tokens).map_err(err)?;
                script.constants.push(Constant {
                    name,
                    value,
                    line: line_no,
                });
                pending_doc.clear();
            }
            _ => {
                return Err(err(
                    "expected 'fn', 'let', 'import' or 'use' at top level".to_string(),
                ));
            }
        }
    }

    if let Some(def) = current.take() {
        script.functions.push(def);
    }

    for def in &script.functions {
        if def.body.is_empty() {
            return Err(ExtensionError::Script {
                file: file.to_path_buf(),
                line: def.line,
                message: format!("function '{}' has an empty body", def.name),
            });
        }
    }

    Ok(script)
}

fn single_name(tokens: &[Token], keyword: &str) -> std::result::Result<String, String> {
    match tokens {
        [_, Token::Ident(name)] => Ok(name.clone()),
        _ => Err(format!("expected '{} <name>'", keyword)),
    }
}

fn parse_let(tokens: &[Token]) -> std::result::Result<(String, Expr), String> {
    match tokens {
        [_, Token::Ident(name), Token::Assign, rest @ ..] if !rest.is_empty() => {
            Ok((name.clone(), parse_expr(rest)?))
        }
        _ => Err("expected 'let <name> = <expression>'".to_string()),
    }
}

fn parse_fn_header(tokens: &[Token]) -> std::result::Result<FnDef, String> {
    let name = match tokens.get(1) {
        Some(Token::Ident(name)) => name.clone(),
        _ => return Err("expected function name after 'fn'".to_string()),
    };
    if tokens.get(2) != Some(&Token::LParen) {
        return Err(format!("expected '(' after 'fn {}'", name));
    }
    if tokens.last() != Some(&Token::Colon) {
        return Err("function header must end with ':'".to_string());
    }
    let inner = &tokens[3..tokens.len() - 1];
    let Some((Token::RParen, params_tokens)) = inner.split_last() else {
        return Err("expected ')' to close parameter list".to_string());
    };

    let mut params = Vec::new();
    if !params_tokens.is_empty() {
        for chunk in params_tokens.split(|t| *t == Token::Comma) {
            params.push(parse_param(chunk)?);
        }
    }
    if params.is_empty() {
        return Err(format!(
            "function '{}' must take the table as its first parameter",
            name
        ));
    }
    for pair in params.windows(2) {
        if pair[0].default.is_some() && pair[1].default.is_none() {
            return Err(format!(
                "parameter '{}' without default follows a parameter with default",
                pair[1].name
            ));
        }
    }

    Ok(FnDef {
        name,
        params,
        doc: String::new(),
        body: Vec::new(),
        line: 0,
    })
}

fn parse_param(tokens: &[Token]) -> std::result::Result<Param, String> {
    match tokens {
        [Token::Ident(name)] => Ok(Param {
            name: name.clone(),
            default: None,
        }),
        [Token::Ident(name), Token::Assign, Token::Number(n)] => Ok(Param {
            name: name.clone(),
            default: Some(Literal::Number(*n)),
        }),
        [Token::Ident(name), Token::Assign, Token::Minus, Token::Number(n)] => Ok(Param {
            name: name.clone(),
            default: Some(Literal::Number(-*n)),
        }),
        [Token::Ident(name), Token::Assign, Token::Str(s)] => Ok(Param {
            name: name.clone(),
            default: Some(Literal::Str(s.clone())),
        }),
        _ => Err("malformed parameter; expected 'name' or 'name = literal'".to_string()),
    }
}

fn parse_statement(tokens: &[Token]) -> std::result::Result<StmtKind, String> {
    if tokens[0].is_ident("let") {
        let (name, value) = parse_let(tokens)?;
        return Ok(StmtKind::Let { name, value });
    }
    if tokens[0].is_ident("return") {
        if tokens.len() == 1 {
            return Ok(StmtKind::Return(None));
        }
        return Ok(StmtKind::Return(Some(parse_expr(&tokens[1..])?)));
    }

    if let Some(pos) = tokens.iter().position(|t| *t == Token::Assign) {
        let target = parse_expr(&tokens[..pos])?;
        let value = parse_expr(&tokens[pos + 1..])?;
        return match target {
            Expr::Index { target, key } => match *target {
                Expr::Var(table) => Ok(StmtKind::SetColumn {
                    table,
                    column: *key,
                    value,
                }),
                _ => Err("only 'table[column] = value' assignments are allowed".to_string()),
            },
            _ => Err("only 'table[column] = value' assignments are allowed".to_string()),
        };
    }

    Ok(StmtKind::Expr(parse_expr(tokens)?))
}

pub(crate) fn parse_expr(tokens: &[Token]) -> std::result::Result<Expr, String> {
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.additive()?;
    if parser.pos != tokens.len() {
        return Err(format!(
            "unexpected token {:?} in expression",
            tokens[parser.pos]
        ));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> std::result::Result<(), String> {
        match self.advance() {
            Some(t) if *t == expected => Ok(()),
            Some(t) => Err(format!("expected {:?}, found {:?}", expected, t)),
            None => Err(format!("expected {:?} at end of line", expected)),
        }
    }

    fn additive(&mut self) -> std::result::Result<Expr, String> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn multiplicative(&mut self) -> std::result::Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> std::result::Result<Expr, String> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> std::result::Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    self.pos += 1;
                    let args = self.arguments()?;
                    let callee = match expr {
                        Expr::Var(name) => Callee::Function(name),
                        Expr::Member { module, member } => Callee::Module {
                            module,
                            function: member,
                        },
                        _ => return Err("only named functions can be called".to_string()),
                    };
                    expr = Expr::Call { callee, args };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let key = self.additive()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        key: Box::new(key),
                    };
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let member = match self.advance() {
                        Some(Token::Ident(m)) => m.clone(),
                        _ => return Err("expected member name after '.'".to_string()),
                    };
                    expr = match expr {
                        Expr::Var(module) => Expr::Member { module, member },
                        _ => return Err("member access is only allowed on modules".to_string()),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn arguments(&mut self) -> std::result::Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.additive()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err("expected ',' or ')' in argument list".to_string()),
            }
        }
    }

    fn primary(&mut self) -> std::result::Result<Expr, String> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(*n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s.clone())),
            Some(Token::Ident(name)) => Ok(Expr::Var(name.clone())),
            Some(Token::LParen) => {
                let inner = self.additive()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(t) => Err(format!("unexpected token {:?}", t)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIRCUMFERENCE: &str = r#"import math

/// Adds a circumference column computed from a radius column.
fn calculate_circumference_from_radius(table, radius = "radius"):
    table["circumference"] = 2 * math.pi * table[radius]
"#;

    #[test]
    fn test_parse_function_with_doc_and_default() {
        let script = parse(CIRCUMFERENCE, Path::new("ext.tbx")).unwrap();
        assert_eq!(script.imports, vec![("math".to_string(), 1)]);
        assert_eq!(script.functions.len(), 1);

        let def = &script.functions[0];
        assert_eq!(def.name, "calculate_circumference_from_radius");
        assert_eq!(
            def.doc,
            "Adds a circumference column computed from a radius column."
        );
        assert_eq!(def.params[0].name, "table");
        assert_eq!(
            def.params[1].default,
            Some(Literal::Str("radius".to_string()))
        );
        assert!(matches!(def.body[0].kind, StmtKind::SetColumn { .. }));
    }

    #[test]
    fn test_defines_only_matches_top_level_functions() {
        assert!(defines(CIRCUMFERENCE, "calculate_circumference_from_radius"));
        assert!(!defines(CIRCUMFERENCE, "calculate_circumference"));
        assert!(!defines("    fn inner(t):\n", "inner"));
        assert!(defines("fn  spaced (t):\n    return 1\n", "spaced"));
    }

    #[test]
    fn test_precedence() {
        let tokens = tokenize("1 + 2 * 3").unwrap();
        let expr = parse_expr(&tokens).unwrap();
        let Expr::Binary { op, rhs, .. } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_module_call() {
        let tokens = tokenize("math.sqrt(table[\"a\"])").unwrap();
        let expr = parse_expr(&tokens).unwrap();
        assert!(matches!(
            expr,
            Expr::Call {
                callee: Callee::Module { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_indented_line_outside_function_is_error() {
        let err = parse("    let x = 1\n", Path::new("bad.tbx")).unwrap_err();
        assert!(matches!(err, ExtensionError::Script { line: 1, .. }));
    }

    #[test]
    fn test_function_without_table_param_is_error() {
        let err = parse("fn f():\n    return 1\n", Path::new("bad.tbx")).unwrap_err();
        assert!(err.to_string().contains("first parameter"));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("fn f(t):\n    x = 1\n", Path::new("bad.tbx")).unwrap_err();
        assert!(matches!(err, ExtensionError::Script { line: 2, .. }));
    }

    #[test]
    fn test_empty_body_is_error() {
        let err = parse("fn f(t):\n\nlet x = 1\n", Path::new("bad.tbx")).unwrap_err();
        assert!(err.to_string().contains("empty body"));
    }
}
