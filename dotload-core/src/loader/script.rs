//! Unit script
//!
//! The executable body of a unit is a line-oriented statement list:
//!
//! ```text
//! # comment
//! import pkg.util            # binds `pkg`
//! import pkg.util as util    # binds `util`
//! from pkg.util import helper [as h]
//! let greeting = "hello"
//! let retries = 3
//! let verbose = false
//! raise "unsupported platform"
//! ```
//!
//! Compilation only parses; every import runs at execution time through the
//! unit's [`ResolutionOverride`], so nested requests carry the unit's
//! identity as originator.

use crate::context::ResolutionOverride;
use crate::error::{DotloadError, Result};
use crate::name::CodeUnitName;

use super::unit::{Namespace, Value};

/// A literal on the right-hand side of `let`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Str(s) => Value::Str(s),
            Literal::Int(i) => Value::Int(i),
            Literal::Bool(b) => Value::Bool(b),
        }
    }
}

/// One compiled statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `import target [as alias]`
    Import {
        target: CodeUnitName,
        alias: Option<String>,
    },
    /// `from source import item [as alias]`
    FromImport {
        source: CodeUnitName,
        item: String,
        alias: Option<String>,
    },
    /// `let binding = value`
    Let { binding: String, value: Literal },
    /// `raise "message"`
    Raise { message: String },
}

/// A compiled unit body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitScript {
    name: CodeUnitName,
    statements: Vec<(usize, Statement)>,
}

impl UnitScript {
    /// Compile `source` for the unit `name`.
    ///
    /// Fails with `CompileFailure` naming the first bad line (1-based).
    pub fn compile(name: &CodeUnitName, source: &str) -> Result<Self> {
        let mut statements = Vec::new();

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let statement = parse_statement(text).map_err(|detail| DotloadError::CompileFailure {
                name: name.to_string(),
                line,
                detail,
            })?;
            statements.push((line, statement));
        }

        Ok(Self {
            name: name.clone(),
            statements,
        })
    }

    pub fn name(&self) -> &CodeUnitName {
        &self.name
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter().map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Run the statements against `namespace`, resolving through `resolution`
    pub fn execute(&self, namespace: &mut Namespace, resolution: &ResolutionOverride) -> Result<()> {
        for (line, statement) in &self.statements {
            tracing::trace!(unit = %self.name, line, "executing statement");

            match statement {
                Statement::Import { target, alias } => {
                    let unit = resolution.import(target.as_str())?;
                    match alias {
                        Some(alias) => {
                            namespace.set(alias.clone(), Value::Unit(unit));
                        }
                        None => {
                            // `import a.b` binds the outermost unit as `a`
                            let top = match target.ancestors().into_iter().next() {
                                Some(outermost) => resolution.import(outermost.as_str())?,
                                None => unit,
                            };
                            let key = top.identity().last_segment().to_string();
                            namespace.set(key, Value::Unit(top));
                        }
                    }
                }
                Statement::FromImport {
                    source,
                    item,
                    alias,
                } => {
                    let value = import_item(source, item, resolution)?;
                    namespace.set(alias.as_ref().unwrap_or(item).clone(), value);
                }
                Statement::Let { binding, value } => {
                    namespace.set(binding.clone(), Value::from(value.clone()));
                }
                Statement::Raise { message } => {
                    return Err(DotloadError::ExecutionFailure {
                        name: self.name.to_string(),
                        detail: format!("line {}: {}", line, message),
                    });
                }
            }
        }
        Ok(())
    }
}

/// `from source import item`: an attribute of `source`, else the unit `source.item`
fn import_item(source: &CodeUnitName, item: &str, resolution: &ResolutionOverride) -> Result<Value> {
    let unit = resolution.import(source.as_str())?;
    if let Some(value) = unit.get(item) {
        return Ok(value.clone());
    }

    let child = source.child(item)?;
    match resolution.import(child.as_str()) {
        Ok(unit) => Ok(Value::Unit(unit)),
        Err(DotloadError::Unresolved { name }) if name == child.as_str() => {
            Err(DotloadError::AttributeNotFound {
                unit: source.to_string(),
                attribute: item.to_string(),
            })
        }
        Err(DotloadError::NotAContainer { .. }) => Err(DotloadError::AttributeNotFound {
            unit: source.to_string(),
            attribute: item.to_string(),
        }),
        Err(e) => Err(e),
    }
}

fn parse_statement(text: &str) -> std::result::Result<Statement, String> {
    let (keyword, rest) = match text.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (text, ""),
    };

    match keyword {
        "import" => {
            let words: Vec<&str> = rest.split_whitespace().collect();
            match words.as_slice() {
                [target] => Ok(Statement::Import {
                    target: unit_name(target)?,
                    alias: None,
                }),
                [target, "as", alias] => Ok(Statement::Import {
                    target: unit_name(target)?,
                    alias: Some(identifier(alias)?),
                }),
                _ => Err("expected `import <name> [as <alias>]`".to_string()),
            }
        }
        "from" => {
            let words: Vec<&str> = rest.split_whitespace().collect();
            match words.as_slice() {
                [source, "import", item] => Ok(Statement::FromImport {
                    source: unit_name(source)?,
                    item: identifier(item)?,
                    alias: None,
                }),
                [source, "import", item, "as", alias] => Ok(Statement::FromImport {
                    source: unit_name(source)?,
                    item: identifier(item)?,
                    alias: Some(identifier(alias)?),
                }),
                _ => Err("expected `from <name> import <item> [as <alias>]`".to_string()),
            }
        }
        "let" => {
            let (binding, value) = rest
                .split_once('=')
                .ok_or_else(|| "expected `let <name> = <literal>`".to_string())?;
            Ok(Statement::Let {
                binding: identifier(binding.trim())?,
                value: literal(value.trim())?,
            })
        }
        "raise" => match literal(rest)? {
            Literal::Str(message) => Ok(Statement::Raise { message }),
            _ => Err("raise takes a string literal".to_string()),
        },
        other => Err(format!("unknown statement '{}'", other)),
    }
}

fn unit_name(raw: &str) -> std::result::Result<CodeUnitName, String> {
    CodeUnitName::parse(raw).map_err(|e| e.to_string())
}

fn identifier(raw: &str) -> std::result::Result<String, String> {
    let mut chars = raw.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(raw.to_string())
    } else {
        Err(format!("invalid identifier '{}'", raw))
    }
}

fn literal(raw: &str) -> std::result::Result<Literal, String> {
    match raw {
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        _ => {}
    }

    if let Some(body) = raw.strip_prefix('"') {
        let body = body
            .strip_suffix('"')
            .ok_or_else(|| "unterminated string literal".to_string())?;
        return unescape(body).map(Literal::Str);
    }

    raw.parse::<i64>()
        .map(Literal::Int)
        .map_err(|_| format!("invalid literal '{}'", raw))
}

fn unescape(body: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => return Err(format!("unknown escape '\\{}'", other)),
                None => return Err("dangling escape at end of string".to_string()),
            },
            '"' => return Err("unescaped quote inside string literal".to_string()),
            c => out.push(c),
        }
    }
    Ok(out)
}
