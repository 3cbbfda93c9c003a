//! Tokenizer, recursive-descent parser and interpreter for checklist
//! criterion expressions (§4.6). Intentionally hand-rolled rather than built
//! on a parser-combinator crate — the grammar is small and nothing else in
//! this dependency graph reaches for `nom`/`pest`/`chumsky`.

use serde_json::Value;

const TOP_LEVEL_KEYS: &[&str] = &["repository", "metrics", "execution"];

#[derive(Debug, Clone, PartialEq)]
pub struct ExprError(pub String);

impl std::fmt::Display for ExprError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expression parse error: {}", self.0)
    }
}

/// One path (or `.length` access) read while evaluating an expression,
/// recorded so the checklist evaluator can build evidence references.
#[derive(Debug, Clone)]
pub struct PathRead {
    pub path: String,
    pub raw: Value,
    pub missing: bool,
    pub length_type_mismatch: bool,
}

#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub value: bool,
    pub reads: Vec<PathRead>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    EmptyArray,
    EmptyObject,
    Dot,
    LParen,
    RParen,
    Op(CmpOp),
    And,
    Or,
    But,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                if chars.get(i + 1) == Some(&']') {
                    tokens.push(Token::EmptyArray);
                    i += 2;
                } else {
                    return Err(ExprError(format!("unexpected '[' at byte {i}")));
                }
            }
            '{' => {
                if chars.get(i + 1) == Some(&'}') {
                    tokens.push(Token::EmptyObject);
                    i += 2;
                } else {
                    return Err(ExprError(format!("unexpected '{{' at byte {i}")));
                }
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CmpOp::Eq));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CmpOp::Ne));
                i += 2;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CmpOp::Ge));
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CmpOp::Le));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(CmpOp::Gt));
                i += 1;
            }
            '<' => {
                tokens.push(Token::Op(CmpOp::Lt));
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut j = i + 1;
                let mut s = String::new();
                while j < chars.len() && chars[j] != quote {
                    s.push(chars[j]);
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(ExprError("unterminated string literal".to_string()));
                }
                tokens.push(Token::Str(s));
                i = j + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                    j += 1;
                }
                let slice: String = chars[i..j].iter().collect();
                let n: f64 = slice
                    .parse()
                    .map_err(|_| ExprError(format!("invalid number literal: {slice}")))?;
                tokens.push(Token::Number(n));
                i = j;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let word: String = chars[i..j].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "BUT" => Token::But,
                    _ => Token::Ident(word),
                });
                i = j;
            }
            other => return Err(ExprError(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone)]
enum Atom {
    Path(String),
    Length(String),
    Literal(Value),
}

#[derive(Debug, Clone)]
enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Cmp {
        lhs: Atom,
        rhs: Option<(CmpOp, Atom)>,
    },
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExprError> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(ExprError(format!("expected {expected:?}, got {other:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut branches = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            branches.push(self.parse_and()?);
        }
        if branches.len() == 1 {
            Ok(branches.into_iter().next().unwrap())
        } else {
            Ok(Expr::Or(branches))
        }
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut branches = vec![self.parse_cmp()?];
        while matches!(self.peek(), Some(Token::And) | Some(Token::But)) {
            self.advance();
            branches.push(self.parse_cmp()?);
        }
        if branches.len() == 1 {
            Ok(branches.into_iter().next().unwrap())
        } else {
            Ok(Expr::And(branches))
        }
    }

    fn parse_cmp(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.advance();
            let inner = self.parse_expr()?;
            self.expect(&Token::RParen)?;
            // A parenthesized sub-expression can itself be compared,
            // but the rubric corpus never does this; treat it as a
            // standalone boolean the same way a bare atom is.
            return Ok(inner);
        }
        let lhs = self.parse_atom()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.advance();
            let rhs = self.parse_atom()?;
            Ok(Expr::Cmp {
                lhs,
                rhs: Some((op, rhs)),
            })
        } else {
            Ok(Expr::Cmp { lhs, rhs: None })
        }
    }

    fn parse_atom(&mut self) -> Result<Atom, ExprError> {
        match self.advance() {
            Some(Token::LParen) => {
                // Parenthesized atoms aren't part of the grammar's `atom`
                // production, but accepting them here keeps `( a.b )`
                // authorable without a dedicated grouping rule for values.
                let inner = self.parse_atom()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Number(n)) => Ok(Atom::Literal(Value::from(n))),
            Some(Token::Str(s)) => Ok(Atom::Literal(Value::String(s))),
            Some(Token::True) => Ok(Atom::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Atom::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Atom::Literal(Value::Null)),
            Some(Token::EmptyArray) => Ok(Atom::Literal(Value::Array(vec![]))),
            Some(Token::EmptyObject) => Ok(Atom::Literal(Value::Object(Default::default()))),
            Some(Token::Ident(first)) => {
                let mut segments = vec![first];
                while matches!(self.peek(), Some(Token::Dot)) {
                    self.advance();
                    match self.advance() {
                        Some(Token::Ident(seg)) => segments.push(seg),
                        other => {
                            return Err(ExprError(format!(
                                "expected identifier after '.', got {other:?}"
                            )));
                        }
                    }
                }
                if segments.len() > 1 && segments.last().map(|s| s.as_str()) == Some("length") {
                    segments.pop();
                    Ok(Atom::Length(segments.join(".")))
                } else {
                    Ok(Atom::Path(segments.join(".")))
                }
            }
            other => Err(ExprError(format!("unexpected token: {other:?}"))),
        }
    }
}

fn resolve_path(segments: &str, default_prefix: &str) -> String {
    let first = segments.split('.').next().unwrap_or_default();
    if TOP_LEVEL_KEYS.contains(&first) {
        return segments.to_string();
    }
    let prefixed = format!("{default_prefix}.{segments}");
    if segments == default_prefix || segments.starts_with(&format!("{default_prefix}.")) {
        segments.to_string()
    } else {
        prefixed
    }
}

fn get_path<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in dotted.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

struct Resolved {
    value: Value,
    reads: Vec<PathRead>,
}

fn resolve_atom(atom: &Atom, root: &Value, default_prefix: &str) -> Resolved {
    match atom {
        Atom::Literal(v) => Resolved {
            value: v.clone(),
            reads: vec![],
        },
        Atom::Path(path) => {
            let full = resolve_path(path, default_prefix);
            let found = get_path(root, &full);
            let value = found.cloned().unwrap_or(Value::Null);
            // A key that resolves to explicit JSON `null` carries the same
            // "nothing was actually measured here" meaning as an absent key
            // (metrics records never omit keys — see `metrics::to_value`) so
            // both count as unresolved for confidence purposes.
            let missing = found.is_none() || value.is_null();
            Resolved {
                reads: vec![PathRead {
                    path: full,
                    raw: value.clone(),
                    missing,
                    length_type_mismatch: false,
                }],
                value,
            }
        }
        Atom::Length(path) => {
            let full = resolve_path(path, default_prefix);
            let found = get_path(root, &full);
            let missing = found.is_none();
            let (value, mismatch) = match found {
                Some(Value::Array(arr)) => (Value::from(arr.len() as u64), false),
                Some(_) => (Value::Null, true),
                None => (Value::Null, false),
            };
            Resolved {
                reads: vec![PathRead {
                    path: format!("{full}.length"),
                    raw: value.clone(),
                    missing,
                    length_type_mismatch: mismatch,
                }],
                value,
            }
        }
    }
}

fn numeric(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => lhs == rhs,
        CmpOp::Ne => lhs != rhs,
        CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => match (numeric(lhs), numeric(rhs)) {
            (Some(a), Some(b)) => match op {
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                _ => unreachable!(),
            },
            _ => false,
        },
    }
}

fn eval_expr(expr: &Expr, root: &Value, default_prefix: &str) -> (bool, Vec<PathRead>) {
    match expr {
        Expr::Or(branches) => {
            let mut reads = Vec::new();
            let mut any = false;
            for b in branches {
                let (v, r) = eval_expr(b, root, default_prefix);
                reads.extend(r);
                any |= v;
            }
            (any, reads)
        }
        Expr::And(branches) => {
            let mut reads = Vec::new();
            let mut all = true;
            for b in branches {
                let (v, r) = eval_expr(b, root, default_prefix);
                reads.extend(r);
                all &= v;
            }
            (all, reads)
        }
        Expr::Cmp { lhs, rhs } => {
            let resolved_lhs = resolve_atom(lhs, root, default_prefix);
            match rhs {
                Some((op, rhs_atom)) => {
                    let resolved_rhs = resolve_atom(rhs_atom, root, default_prefix);
                    let lhs_missing = resolved_lhs.reads.iter().any(|r| r.missing);
                    let rhs_missing = resolved_rhs.reads.iter().any(|r| r.missing);
                    // An unresolved path in a comparison is false unless the
                    // other side is literally `null` — a missing path must
                    // not be allowed to satisfy `!= <anything but null>`.
                    let result = if lhs_missing || rhs_missing {
                        let non_missing_is_null = if lhs_missing {
                            resolved_rhs.value == Value::Null
                        } else {
                            resolved_lhs.value == Value::Null
                        };
                        non_missing_is_null && compare(&resolved_lhs.value, *op, &resolved_rhs.value)
                    } else {
                        compare(&resolved_lhs.value, *op, &resolved_rhs.value)
                    };
                    let mut reads = resolved_lhs.reads;
                    reads.extend(resolved_rhs.reads);
                    (result, reads)
                }
                None => (
                    matches!(resolved_lhs.value, Value::Bool(true)),
                    resolved_lhs.reads,
                ),
            }
        }
    }
}

/// Parse and evaluate one criterion expression against `root` (the full
/// metrics record converted to a value tree), rooting bare paths at
/// `default_prefix` unless they already begin with a top-level record key.
pub fn evaluate(expr_str: &str, root: &Value, default_prefix: &str) -> Result<EvalOutcome, ExprError> {
    let tokens = tokenize(expr_str)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError(format!(
            "trailing tokens after expression: {:?}",
            &parser.tokens[parser.pos..]
        )));
    }
    let (value, reads) = eval_expr(&expr, root, default_prefix);
    Ok(EvalOutcome { value, reads })
}

/// Evaluate a criterion list (OR across every expression in the list, per
/// §4.6); an empty list is vacuously unsatisfied.
pub fn evaluate_any(exprs: &[String], root: &Value, default_prefix: &str) -> Result<EvalOutcome, ExprError> {
    let mut all_reads = Vec::new();
    for expr_str in exprs {
        let outcome = evaluate(expr_str, root, default_prefix)?;
        let satisfied = outcome.value;
        all_reads.extend(outcome.reads);
        if satisfied {
            return Ok(EvalOutcome {
                value: true,
                reads: all_reads,
            });
        }
    }
    Ok(EvalOutcome {
        value: false,
        reads: all_reads,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_root() -> Value {
        json!({
            "repository": { "primary_language": "python" },
            "metrics": {
                "code_quality": { "lint_results": { "passed": true, "issues_count": 2 } },
                "testing": { "test_execution": { "tests_failed": 0, "tests_run": 12 } },
            },
            "execution": { "tools_used": ["ruff", "pytest"] },
        })
    }

    #[test]
    fn test_simple_equality() {
        let root = sample_root();
        let outcome = evaluate("lint_results.passed == true", &root, "metrics.code_quality").unwrap();
        assert!(outcome.value);
    }

    #[test]
    fn test_no_type_coercion_string_vs_number() {
        let root = json!({"metrics": {"x": {"v": "0"}}});
        let outcome = evaluate("v == 0", &root, "metrics.x").unwrap();
        assert!(!outcome.value);
    }

    #[test]
    fn test_no_type_coercion_number_vs_bool() {
        let root = json!({"metrics": {"x": {"v": 0}}});
        let outcome = evaluate("v == false", &root, "metrics.x").unwrap();
        assert!(!outcome.value);
    }

    #[test]
    fn test_length_on_array() {
        let root = json!({"metrics": {"x": {"items": [1, 2, 3]}}});
        let outcome = evaluate("items.length >= 3", &root, "metrics.x").unwrap();
        assert!(outcome.value);
    }

    #[test]
    fn test_length_on_non_array_is_mismatch() {
        let root = json!({"metrics": {"x": {"items": 5}}});
        let outcome = evaluate("items.length >= 1", &root, "metrics.x").unwrap();
        assert!(!outcome.value);
        assert!(outcome.reads.iter().any(|r| r.length_type_mismatch));
    }

    #[test]
    fn test_empty_array_literal_structural() {
        let root = json!({"metrics": {"x": {"items": []}}});
        let outcome = evaluate("items == []", &root, "metrics.x").unwrap();
        assert!(outcome.value);
    }

    #[test]
    fn test_empty_array_literal_false_for_nonempty() {
        let root = json!({"metrics": {"x": {"items": [1]}}});
        let outcome = evaluate("items == []", &root, "metrics.x").unwrap();
        assert!(!outcome.value);
    }

    #[test]
    fn test_missing_path_is_null() {
        let root = json!({"metrics": {"x": {}}});
        let outcome = evaluate("nope == null", &root, "metrics.x").unwrap();
        assert!(outcome.value);
        assert!(outcome.reads[0].missing);
    }

    #[test]
    fn test_ne_basic() {
        let root = sample_root();
        let outcome = evaluate("lint_results.issues_count != 0", &root, "metrics.code_quality").unwrap();
        assert!(outcome.value);
    }

    #[test]
    fn test_ne_missing_path_forces_false() {
        let root = json!({"metrics": {"x": {}}});
        let outcome = evaluate("nope != 5", &root, "metrics.x").unwrap();
        assert!(!outcome.value);
    }

    #[test]
    fn test_ne_missing_path_against_null_is_not_forced() {
        let root = json!({"metrics": {"x": {}}});
        // missing path resolves to Null; Null != null is false, and the
        // unresolved-path rule exempts comparisons against literal null.
        let outcome = evaluate("nope != null", &root, "metrics.x").unwrap();
        assert!(!outcome.value);
    }

    #[test]
    fn test_ne_explicit_null_value_is_not_missing() {
        let root = json!({"metrics": {"x": {"v": null}}});
        // `v` resolves to an explicit null, which the missing-path rule
        // treats as unresolved too, so this stays forced false.
        let outcome = evaluate("v != 5", &root, "metrics.x").unwrap();
        assert!(!outcome.value);
    }

    #[test]
    fn test_and_but_synonym() {
        let root = sample_root();
        let a = evaluate(
            "lint_results.passed == true AND lint_results.issues_count < 5",
            &root,
            "metrics.code_quality",
        )
        .unwrap();
        let b = evaluate(
            "lint_results.passed == true BUT lint_results.issues_count < 5",
            &root,
            "metrics.code_quality",
        )
        .unwrap();
        assert_eq!(a.value, b.value);
        assert!(a.value);
    }

    #[test]
    fn test_or_precedence_lower_than_and() {
        let root = sample_root();
        // false AND true OR true  ==  (false AND true) OR true  ==  true
        let outcome = evaluate(
            "lint_results.passed == false AND lint_results.issues_count == 2 OR tools_used == tools_used",
            &root,
            "metrics.code_quality",
        )
        .unwrap();
        assert!(outcome.value);
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let root = sample_root();
        // (false OR true) AND true -> true; without parens this parses the
        // same left-to-right due to AND binding tighter, so assert directly
        // on the parenthesized grouping instead.
        let outcome = evaluate(
            "(lint_results.passed == false OR lint_results.issues_count == 2) AND lint_results.passed == true",
            &root,
            "metrics.code_quality",
        )
        .unwrap();
        assert!(outcome.value);
    }

    #[test]
    fn test_double_prefix_avoided() {
        let root = json!({"metrics": {"code_quality": {"lint_results": {"passed": true}}}});
        let outcome = evaluate(
            "metrics.code_quality.lint_results.passed == true",
            &root,
            "metrics.code_quality",
        )
        .unwrap();
        assert!(outcome.value);
        assert_eq!(
            outcome.reads[0].path,
            "metrics.code_quality.lint_results.passed"
        );
    }

    #[test]
    fn test_parse_error_on_malformed_expression() {
        let root = sample_root();
        assert!(evaluate("lint_results.passed ==", &root, "metrics.code_quality").is_err());
    }

    #[test]
    fn test_evaluate_any_is_or_across_list() {
        let root = sample_root();
        let exprs = vec![
            "lint_results.passed == false".to_string(),
            "lint_results.issues_count == 2".to_string(),
        ];
        let outcome = evaluate_any(&exprs, &root, "metrics.code_quality").unwrap();
        assert!(outcome.value);
    }

    #[test]
    fn test_evaluate_any_empty_list_is_false() {
        let root = sample_root();
        let outcome = evaluate_any(&[], &root, "metrics.code_quality").unwrap();
        assert!(!outcome.value);
    }
}
