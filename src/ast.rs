use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Serialize, Serializer};

/// 表达式树的节点
///
/// 节点是纯值树：没有反向引用，子节点由父节点独占。
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 字面量，例如 `"spam"`、`7`、`b"c3BhbQ=="`
    Literal(Literal),
    /// 属性名，例如 `spam` 或 `'spam'`
    Identifier(String),
    /// 比较运算 `left op right`
    Comparison { op: CompOp, left: Box<Expr>, right: Box<Expr> },
    /// 逻辑与运算 (AND)
    And(Box<Expr>, Box<Expr>),
    /// 逻辑或运算 (OR)
    Or(Box<Expr>, Box<Expr>),
    /// 逻辑非运算 (NOT)
    Not(Box<Expr>),
    /// 使用括号分组的表达式，保留为独立节点
    Subexpression(Box<Expr>),
    /// `left IN (a, b, ...)` 包含检查
    In { left: Box<Expr>, candidates: Vec<Expr> },
    /// `left BETWEEN lower AND upper` 范围检查
    Between { left: Box<Expr>, lower: Box<Expr>, upper: Box<Expr> },
    /// 函数调用，例如 `begins_with(name, "sp")`
    FunctionCall { name: String, arguments: Vec<Expr> },
    /// 逗号分隔的操作数序列，例如投影表达式 `a, b, c`
    Sequence(Vec<Expr>),
}

impl Expr {
    pub fn identifier(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn comparison(op: CompOp, left: Expr, right: Expr) -> Self {
        Expr::Comparison { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }

    pub fn not(operand: Expr) -> Self {
        Expr::Not(Box::new(operand))
    }

    pub fn subexpression(inner: Expr) -> Self {
        Expr::Subexpression(Box::new(inner))
    }

    pub fn in_list(left: Expr, candidates: Vec<Expr>) -> Self {
        Expr::In { left: Box::new(left), candidates }
    }

    pub fn between(left: Expr, lower: Expr, upper: Expr) -> Self {
        Expr::Between { left: Box::new(left), lower: Box::new(lower), upper: Box::new(upper) }
    }

    pub fn function(name: impl Into<String>, arguments: Vec<Expr>) -> Self {
        Expr::FunctionCall { name: name.into(), arguments }
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,  // =
    Ne,  // <>
    Lt,  // <
    Lte, // <=
    Gt,  // >
    Gte, // >=
}

impl CompOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::Ne => "<>",
            CompOp::Lt => "<",
            CompOp::Lte => "<=",
            CompOp::Gt => ">",
            CompOp::Gte => ">=",
        }
    }
}

/// 字面量值
///
/// 序列化为 JSON 时：字符串为字符串，数字为数字，字节串为 base64 字符串。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    String(String),
    Number(serde_json::Number),
    Bytes(#[serde(serialize_with = "serialize_base64")] Vec<u8>),
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Number(n.into())
    }
}

impl From<Vec<u8>> for Literal {
    fn from(bytes: Vec<u8>) -> Self {
        Literal::Bytes(bytes)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Bytes(b) => write!(f, "b\"{}\"", BASE64.encode(b)),
        }
    }
}

const KEYWORDS: [&str; 5] = ["and", "between", "in", "or", "not"];

/// 能否不加引号直接写出该属性名
fn is_bare_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_well
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name))
}

fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_bare_name(name) {
        f.write_str(name)
    } else {
        write!(f, "'{}'", name.replace('\'', "\\'"))
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// 将表达式树还原为规范化的表达式文本
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Identifier(name) => write_name(f, name),
            Expr::Comparison { op, left, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Expr::And(left, right) => write!(f, "{} and {}", left, right),
            Expr::Or(left, right) => write!(f, "{} or {}", left, right),
            Expr::Not(operand) => write!(f, "not {}", operand),
            Expr::Subexpression(inner) => write!(f, "({})", inner),
            Expr::In { left, candidates } => {
                write!(f, "{} in (", left)?;
                write_list(f, candidates)?;
                f.write_str(")")
            }
            Expr::Between { left, lower, upper } => {
                write!(f, "{} between {} and {}", left, lower, upper)
            }
            Expr::FunctionCall { name, arguments } => {
                write_name(f, name)?;
                f.write_str("(")?;
                write_list(f, arguments)?;
                f.write_str(")")
            }
            Expr::Sequence(children) => write_list(f, children),
        }
    }
}
