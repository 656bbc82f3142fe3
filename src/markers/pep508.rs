//! PEP 508 environment marker evaluator (spec 4.2, pip only).
//!
//! Supports the documented operator set (`==`, `!=`, `<`, `<=`, `>`, `>=`,
//! `in`, `not in`, boolean `and`/`or`, parenthesised grouping) over the
//! documented variable set. A marker referencing a variable outside that set
//! evaluates to `false` unless `strict` is set, matching the resolved open
//! question in the design notes.

use std::collections::HashMap;

use crate::error::{DepotError, Result};

/// The evaluation environment a marker expression is checked against.
#[derive(Debug, Clone, Default)]
pub struct MarkerEnvironment {
    pub python_version: String,
    pub python_full_version: String,
    pub sys_platform: String,
    pub platform_system: String,
    pub platform_machine: String,
    pub os_name: String,
    pub implementation_name: String,
}

impl MarkerEnvironment {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "python_version" => Some(&self.python_version),
            "python_full_version" => Some(&self.python_full_version),
            "sys_platform" => Some(&self.sys_platform),
            "platform_system" => Some(&self.platform_system),
            "platform_machine" => Some(&self.platform_machine),
            "os_name" => Some(&self.os_name),
            "implementation_name" => Some(&self.implementation_name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Token {
    Ident(String),
    Str(String),
    Op(String),
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c == '\'' || c == '"' {
            let quote = c;
            let start = i + 1;
            let mut j = start;
            while j < chars.len() && chars[j] != quote {
                j += 1;
            }
            if j >= chars.len() {
                return Err(DepotError::ParseError {
                    context: "pep508 marker".into(),
                    message: "unterminated string literal".into(),
                });
            }
            tokens.push(Token::Str(chars[start..j].iter().collect()));
            i = j + 1;
        } else if "<>=!".contains(c) {
            let mut op = String::new();
            op.push(c);
            i += 1;
            if i < chars.len() && chars[i] == '=' {
                op.push('=');
                i += 1;
            }
            tokens.push(Token::Op(op));
        } else {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                i += 1;
            }
            if i == start {
                return Err(DepotError::ParseError {
                    context: "pep508 marker".into(),
                    message: format!("unexpected character '{c}'"),
                });
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        }
    }
    Ok(tokens)
}

/// Recursive-descent parser/evaluator over: `or_expr := and_expr ('or' and_expr)*`,
/// `and_expr := atom ('and' atom)*`, `atom := '(' or_expr ')' | comparison`.
struct Evaluator<'a> {
    tokens: &'a [Token],
    pos: usize,
    env: &'a MarkerEnvironment,
    strict: bool,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn or_expr(&mut self) -> Result<bool> {
        let mut value = self.and_expr()?;
        while let Some(Token::Ident(kw)) = self.peek() {
            if kw == "or" {
                self.bump();
                let rhs = self.and_expr()?;
                value = value || rhs;
            } else {
                break;
            }
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool> {
        let mut value = self.atom()?;
        while let Some(Token::Ident(kw)) = self.peek() {
            if kw == "and" {
                self.bump();
                let rhs = self.atom()?;
                value = value && rhs;
            } else {
                break;
            }
        }
        Ok(value)
    }

    fn atom(&mut self) -> Result<bool> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.bump();
            let value = self.or_expr()?;
            match self.bump() {
                Some(Token::RParen) => Ok(value),
                _ => Err(DepotError::ParseError {
                    context: "pep508 marker".into(),
                    message: "expected closing parenthesis".into(),
                }),
            }
        } else {
            self.comparison()
        }
    }

    fn operand(&mut self) -> Result<(Option<String>, String)> {
        match self.bump() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                Ok((Some(name.clone()), self.env.lookup(&name).unwrap_or("").to_string()))
            }
            Some(Token::Str(s)) => Ok((None, s.clone())),
            other => Err(DepotError::ParseError {
                context: "pep508 marker".into(),
                message: format!("expected operand, got {other:?}"),
            }),
        }
    }

    fn comparison(&mut self) -> Result<bool> {
        let (lhs_name, lhs_val) = self.operand()?;

        // `in` / `not in` are two-word identifiers in token form.
        if let Some(Token::Ident(kw)) = self.peek() {
            if kw == "in" {
                self.bump();
                let (_, rhs_val) = self.operand()?;
                return self.check_unsupported(lhs_name.as_deref()).map(|ok| ok && rhs_val.contains(&lhs_val));
            }
            if kw == "not" {
                self.bump();
                match self.bump() {
                    Some(Token::Ident(w)) if w == "in" => {
                        let (_, rhs_val) = self.operand()?;
                        return self.check_unsupported(lhs_name.as_deref()).map(|ok| ok && !rhs_val.contains(&lhs_val));
                    }
                    _ => {
                        return Err(DepotError::ParseError {
                            context: "pep508 marker".into(),
                            message: "expected 'in' after 'not'".into(),
                        })
                    }
                }
            }
        }

        let op = match self.bump() {
            Some(Token::Op(op)) => op.clone(),
            other => {
                return Err(DepotError::ParseError {
                    context: "pep508 marker".into(),
                    message: format!("expected comparison operator, got {other:?}"),
                })
            }
        };
        let (_, rhs_val) = self.operand()?;

        if !self.check_unsupported(lhs_name.as_deref())? {
            return Ok(false);
        }

        Ok(match op.as_str() {
            "==" => lhs_val == rhs_val,
            "!=" => lhs_val != rhs_val,
            "<" => lhs_val < rhs_val,
            "<=" => lhs_val <= rhs_val,
            ">" => lhs_val > rhs_val,
            ">=" => lhs_val >= rhs_val,
            _ => {
                return Err(DepotError::ParseError {
                    context: "pep508 marker".into(),
                    message: format!("unsupported operator '{op}'"),
                })
            }
        })
    }

    fn check_unsupported(&self, name: Option<&str>) -> Result<bool> {
        if let Some(name) = name {
            if self.env.lookup(name).is_none() {
                if self.strict {
                    return Err(DepotError::ParseError {
                        context: "pep508 marker".into(),
                        message: format!("unsupported marker variable '{name}'"),
                    });
                }
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Evaluates a PEP 508 marker expression against `env`. Unknown variables
/// evaluate to `false` unless `strict` (the `ResolveOptions::strict_markers`
/// setting) is set, in which case they are a hard error.
pub fn evaluate(expr: &str, env: &MarkerEnvironment, strict: bool) -> Result<bool> {
    let tokens = tokenize(expr)?;
    let mut evaluator = Evaluator { tokens: &tokens, pos: 0, env, strict };
    let result = evaluator.or_expr()?;
    if evaluator.pos != tokens.len() {
        return Err(DepotError::ParseError {
            context: "pep508 marker".into(),
            message: "trailing tokens after expression".into(),
        });
    }
    Ok(result)
}

/// Builds the default evaluation environment from `ResolveOptions`-derived
/// target parameters, filling reasonable linux/x86_64/cpython defaults for
/// anything unspecified.
#[must_use]
pub fn environment_from_target(
    python_version: Option<&str>,
    target_os: Option<&str>,
    architecture: Option<&str>,
) -> MarkerEnvironment {
    let sys_platform = match target_os.unwrap_or("linux") {
        "windows" => "win32",
        "macos" | "darwin" => "darwin",
        _ => "linux",
    };
    let platform_system = match target_os.unwrap_or("linux") {
        "windows" => "Windows",
        "macos" | "darwin" => "Darwin",
        _ => "Linux",
    };
    let pv = python_version.unwrap_or("3.11").to_string();
    MarkerEnvironment {
        python_version: pv.clone(),
        python_full_version: if pv.matches('.').count() >= 2 { pv.clone() } else { format!("{pv}.0") },
        sys_platform: sys_platform.to_string(),
        platform_system: platform_system.to_string(),
        platform_machine: architecture.unwrap_or("x86_64").to_string(),
        os_name: if sys_platform == "win32" { "nt".to_string() } else { "posix".to_string() },
        implementation_name: "cpython".to_string(),
    }
}

#[allow(dead_code)]
fn unused_map() -> HashMap<String, String> {
    HashMap::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> MarkerEnvironment {
        environment_from_target(Some("3.11"), Some("linux"), Some("x86_64"))
    }

    #[test]
    fn simple_equality() {
        assert!(evaluate("python_version == '3.11'", &env(), false).unwrap());
        assert!(!evaluate("python_version == '3.10'", &env(), false).unwrap());
    }

    #[test]
    fn boolean_and_or_with_grouping() {
        let e = env();
        assert!(evaluate("sys_platform == 'linux' and (python_version >= '3.9')", &e, false).unwrap());
        assert!(evaluate("sys_platform == 'win32' or python_version == '3.11'", &e, false).unwrap());
    }

    #[test]
    fn in_and_not_in_operators() {
        let e = env();
        assert!(evaluate("platform_machine in 'x86_64 arm64'", &e, false).unwrap());
        assert!(evaluate("os_name not in 'nt'", &e, false).unwrap());
    }

    #[test]
    fn unsupported_variable_is_false_unless_strict() {
        let e = env();
        assert!(!evaluate("extra == 'dev'", &e, false).unwrap());
        assert!(evaluate("extra == 'dev'", &e, true).is_err());
    }
}
