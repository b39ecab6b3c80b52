//! 把属性名和字面量替换为占位符
//!
//! 属性名替换为 `#n<i>`，字面量替换为 `:n<i>`。`i` 来自同一个计数器，
//! 名字和值不会共用序号。其余 token（包括空白）按原文复制。

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::ast::Literal;
use crate::error::LexError;
use crate::lexer::Lexer;
use crate::token::{TokenKind, TokenValue};

/// 改写后的表达式及其占位符映射
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub expression: String,
    pub identifiers: BTreeMap<String, String>,
    pub values: BTreeMap<String, Literal>,
    pub substitution_count: usize,
}

/// 从 `index_start` 开始编号提取占位符
pub fn extract(expression: &str, index_start: usize) -> Result<Extraction, LexError> {
    AttributeExtractor::new(index_start).extract(expression)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeExtractor {
    index_start: usize,
}

impl AttributeExtractor {
    pub fn new(index_start: usize) -> Self {
        Self { index_start }
    }

    pub fn extract(&self, expression: &str) -> Result<Extraction, LexError> {
        let mut result = Extraction::default();
        let mut index = self.index_start;

        for token in Lexer::new(expression) {
            let token = token?;
            match (token.kind, token.value) {
                (TokenKind::Eof, _) => {}
                (kind, value) if kind.is_identifier() => {
                    let placeholder = format!("#n{}", index);
                    result.expression.push_str(&placeholder);
                    result.identifiers.insert(placeholder, value.to_string());
                    index += 1;
                }
                (TokenKind::Literal, TokenValue::Literal(literal)) => {
                    let placeholder = format!(":n{}", index);
                    result.expression.push_str(&placeholder);
                    result.values.insert(placeholder, literal);
                    index += 1;
                }
                _ => result.expression.push_str(token.lexeme),
            }
        }

        result.substitution_count = index - self.index_start;
        debug!(
            index_start = self.index_start,
            substitutions = result.substitution_count,
            "extracted expression attributes"
        );
        Ok(result)
    }
}

/// 同一个请求中多个表达式共用的占位符
///
/// 每个子句都从上一个子句结束的序号继续编号，整个请求内占位符不重复。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpressionAttributes {
    pub expressions: BTreeMap<String, String>,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, Literal>,
    #[serde(skip)]
    next_index: usize,
}

impl ExpressionAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 `index_start` 而不是 0 开始编号
    pub fn starting_at(index_start: usize) -> Self {
        Self { next_index: index_start, ..Self::default() }
    }

    /// 提取 `expression`，并把改写结果记在 `clause` 名下
    ///
    /// 同一子句再次添加时覆盖改写后的文本，但新的占位符仍会加入映射。
    pub fn add(&mut self, clause: &str, expression: &str) -> Result<&str, LexError> {
        let extraction = extract(expression, self.next_index)?;
        self.next_index += extraction.substitution_count;
        self.names.extend(extraction.identifiers);
        self.values.extend(extraction.values);
        self.expressions.insert(clause.to_string(), extraction.expression);
        Ok(self.expressions[clause].as_str())
    }

    /// 目前为止生成的占位符总数
    pub fn substitution_count(&self) -> usize {
        self.names.len() + self.values.len()
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }
}
