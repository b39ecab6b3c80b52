//! 条件表达式的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 空输入 / 只有空白 → EmptyExpression
//!   └─ parse_expression()
//!        ├─ 第二个 token 是 ',' → parse_sequence()
//!        │                         └─ parse_operand() (',' parse_operand())*
//!        │
//!        └─ parse_and_or()
//!             └─ parse_simple() (('and' | 'or') parse_simple())*
//!                  ├─ '(' → parse_simple() ')'  → Subexpression
//!                  ├─ 'not' → parse_simple()   → Not
//!                  └─ parse_condition() (看第二个 token 决定分支)
//!                       ├─ '('       → 函数调用 name(operand, ...)
//!                       ├─ 'in'      → operand IN (operand, ...)
//!                       ├─ 'between' → operand BETWEEN operand AND operand
//!                       └─ 比较运算符 → operand op operand
//! ```
//!
//! ## 说明
//!
//! - `and` 与 `or` 没有优先级差别，严格按文本顺序向左结合：
//!   `a = 1 or b = 2 and c = 3` 解析为 `(a = 1 or b = 2) and c = 3`。
//! - 括号内只允许一个简单表达式，括号会作为 `Subexpression` 节点保留。
//! - 操作数只能是字面量或属性名。
//! - 空白 token 在进入语法分析器前被过滤掉。
//!
//! ## 解析示例
//!
//! ```text
//! a between 1 and 10
//! not (status <> "Closed") or begins_with(name, "sp")
//! colour in ("red", "green")
//! id, 'first name', price
//! ```

use tracing::{debug, trace};

use crate::ast::{CompOp, Expr};
use crate::config::ParserConfig;
use crate::error::ParseError;
use crate::lexer::tokenize;
use crate::token::{Span, Token, TokenKind, TokenValue};

const IDENTIFIERS: [TokenKind; 2] = [TokenKind::Identifier, TokenKind::UnquotedIdentifier];
const COMPARATORS: [TokenKind; 6] =
    [TokenKind::Eq, TokenKind::Ne, TokenKind::Lt, TokenKind::Lte, TokenKind::Gt, TokenKind::Gte];

/// 对表达式文本进行词法和语法分析
pub fn parse(expression: &str) -> Result<Expr, ParseError> {
    parse_with_config(expression, ParserConfig::default())
}

pub fn parse_with_config(expression: &str, config: ParserConfig) -> Result<Expr, ParseError> {
    if expression.is_empty() {
        return Err(ParseError::EmptyExpression);
    }
    let tokens = tokenize(expression)?;
    Parser::with_config(&tokens, config).parse()
}

pub struct Parser<'a> {
    /// 已过滤掉空白的 token
    tokens: Vec<&'a Token<'a>>,
    position: usize,
    config: ParserConfig,
    /// 当前括号与 NOT 的嵌套层数
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self::with_config(tokens, ParserConfig::default())
    }

    pub fn with_config(tokens: &'a [Token<'a>], config: ParserConfig) -> Self {
        let tokens = tokens.iter().filter(|t| t.kind != TokenKind::Whitespace).collect();
        Self { tokens, position: 0, config, depth: 0 }
    }

    /// 返回当前 token，不推进位置
    fn current(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position).copied()
    }

    /// 返回下一个 token，不推进位置
    fn peek_next(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position + 1).copied()
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.current();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: TokenKind) -> bool {
        self.current().is_some_and(|t| t.kind == kind)
    }

    /// 期望给定类型之一的 token 并推进，否则返回错误
    fn expect(&mut self, expected: &[TokenKind]) -> Result<&'a Token<'a>, ParseError> {
        match self.current() {
            Some(token) if expected.contains(&token.kind) => {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(ParseError::InvalidToken {
                value: token.value.to_string(),
                kind: token.kind,
                expected: expected.to_vec(),
                span: token.span,
            }),
            None => Err(end_of_input()),
        }
    }

    /// 从第一个 token 开始解析，可重复调用
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        self.position = 0;
        self.depth = 0;
        if self.current().map_or(true, |t| t.kind == TokenKind::Eof) {
            return Err(ParseError::EmptyExpression);
        }

        let expr = self.parse_expression()?;

        match self.current() {
            Some(token) if token.kind != TokenKind::Eof => Err(ParseError::syntax(
                format!("Unexpected trailing token '{}' of type '{}'", token.value, token.kind),
                token.span,
            )),
            _ => {
                debug!(tokens = self.position, "parsed expression");
                Ok(expr)
            }
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if self.peek_next().is_some_and(|t| t.kind == TokenKind::Comma) {
            return Ok(Expr::Sequence(self.parse_sequence()?));
        }
        self.parse_and_or()
    }

    /// 解析 AND/OR 链，二者优先级相同，从左到右折叠
    ///
    /// 语法: `simple (('and' | 'or') simple)*`
    fn parse_and_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_simple()?;

        while let Some(token) = self.current() {
            let conjunction = token.kind;
            if conjunction != TokenKind::And && conjunction != TokenKind::Or {
                break;
            }
            self.advance(); // 消费 AND / OR
            let right = self.parse_simple()?;
            left = if conjunction == TokenKind::And { Expr::and(left, right) } else { Expr::or(left, right) };
        }

        Ok(left)
    }

    /// 语法: `'(' simple ')'` | `'not' simple` | condition
    fn parse_simple(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(TokenKind::LParen) {
            return self.parse_subexpression();
        }
        if self.match_token(TokenKind::Not) {
            return self.parse_not();
        }
        self.parse_condition()
    }

    /// 进入一层嵌套，超过上限时报错
    fn descend(&mut self, span: Span) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(ParseError::NestingTooDeep { limit: self.config.max_depth, span });
        }
        Ok(())
    }

    fn parse_subexpression(&mut self) -> Result<Expr, ParseError> {
        let open = self.expect(&[TokenKind::LParen])?;
        self.descend(open.span)?;
        let inner = self.parse_simple()?;
        self.depth -= 1;
        self.expect(&[TokenKind::RParen])?;
        Ok(Expr::subexpression(inner))
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        let not = self.expect(&[TokenKind::Not])?;
        self.descend(not.span)?;
        let operand = self.parse_simple()?;
        self.depth -= 1;
        Ok(Expr::not(operand))
    }

    /// 根据第二个 token 选择条件的形式
    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        let current = self.current().ok_or_else(end_of_input)?;
        let next_kind = self.peek_next().map(|t| t.kind);
        trace!(at = current.span.start, next = ?next_kind, "parse_condition");

        match next_kind {
            Some(TokenKind::LParen) => self.parse_function(),
            Some(TokenKind::In) => self.parse_in(),
            Some(TokenKind::Between) => self.parse_between(),
            Some(kind) if kind.is_comparator() => self.parse_comparison(),
            _ => Err(ParseError::syntax(
                format!("Expected a condition starting at '{}' of type '{}'", current.value, current.kind),
                current.span,
            )),
        }
    }

    /// 语法: `name '(' sequence ')'`
    fn parse_function(&mut self) -> Result<Expr, ParseError> {
        let name = self.expect(&IDENTIFIERS)?.value.to_string();
        self.expect(&[TokenKind::LParen])?;
        let arguments = self.parse_sequence()?;
        self.expect(&[TokenKind::RParen])?;
        Ok(Expr::function(name, arguments))
    }

    /// 语法: `operand 'in' '(' sequence ')'`
    fn parse_in(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;
        self.expect(&[TokenKind::In])?;
        self.expect(&[TokenKind::LParen])?;
        let candidates = self.parse_sequence()?;
        self.expect(&[TokenKind::RParen])?;
        Ok(Expr::in_list(left, candidates))
    }

    /// 语法: `operand 'between' operand 'and' operand`
    fn parse_between(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;
        self.expect(&[TokenKind::Between])?;
        let lower = self.parse_operand()?;
        self.expect(&[TokenKind::And])?;
        let upper = self.parse_operand()?;
        Ok(Expr::between(left, lower, upper))
    }

    /// 语法: `operand op operand`
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;
        let op = comparison_operator(self.expect(&COMPARATORS)?.kind);
        let right = self.parse_operand()?;
        Ok(Expr::comparison(op, left, right))
    }

    /// 逗号分隔的操作数，至少一个
    fn parse_sequence(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut elements = Vec::new();
        loop {
            elements.push(self.parse_operand()?);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
            self.advance(); // 消费逗号
        }
        Ok(elements)
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().ok_or_else(end_of_input)?;
        let operand = match (&token.kind, &token.value) {
            (TokenKind::Literal, TokenValue::Literal(literal)) => Expr::Literal(literal.clone()),
            (kind, value) if kind.is_identifier() => Expr::Identifier(value.to_string()),
            _ => {
                return Err(ParseError::syntax(
                    format!("Expected an operand, found '{}' of type '{}'", token.value, token.kind),
                    token.span,
                ));
            }
        };
        self.advance();
        Ok(operand)
    }
}

fn comparison_operator(kind: TokenKind) -> CompOp {
    match kind {
        TokenKind::Ne => CompOp::Ne,
        TokenKind::Lt => CompOp::Lt,
        TokenKind::Lte => CompOp::Lte,
        TokenKind::Gt => CompOp::Gt,
        TokenKind::Gte => CompOp::Gte,
        TokenKind::Eq => CompOp::Eq,
        other => unreachable!("'{}' is not a comparator", other),
    }
}

fn end_of_input() -> ParseError {
    ParseError::Syntax { message: "Unexpected end of expression".to_string(), span: None }
}
