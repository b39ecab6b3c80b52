//! 条件表达式的词法分析器
//!
//! 单遍扫描，向前看一个字符。空白字符会作为 `whitespace` token 输出，
//! 由调用方决定是否丢弃（语法分析器会丢弃，属性提取器不会）。

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, trace};

use crate::ast::Literal;
use crate::error::LexError;
use crate::token::{Span, Token, TokenKind, TokenValue};

/// 对整个表达式进行分词，返回以 `eof` 结尾的完整 token 列表
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let tokens = Lexer::new(input).collect::<Result<Vec<_>, _>>()?;
    debug!(count = tokens.len(), "tokenized expression");
    Ok(tokens)
}

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    /// 已经输出 `eof` 或错误
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0, finished: false }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 从 start 到当前位置的原文
    fn slice(&self, start: usize) -> &'a str {
        &self.input[start..self.position]
    }

    fn span(&self, start: usize) -> Span {
        Span::new(start, self.position)
    }

    /// 输出以原文作为值的 token
    fn text_token(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token::text(kind, self.span(start), self.slice(start))
    }

    fn literal_token(&self, literal: Literal, start: usize) -> Token<'a> {
        Token::new(TokenKind::Literal, TokenValue::Literal(literal), self.span(start), self.slice(start))
    }

    fn eof(&self) -> Token<'a> {
        let end = self.input.len();
        Token::text(TokenKind::Eof, Span::new(end, end), "")
    }

    /// 在输入末尾出错时指向最后一个字符
    fn offending_position(&self, found: Option<char>) -> usize {
        match found {
            Some(_) => self.position,
            None => self.position.saturating_sub(1),
        }
    }

    fn scan(&mut self, c: char, start: usize) -> Result<Token<'a>, LexError> {
        let token = match c {
            '.' | ',' | ':' | '(' | ')' | '{' | '}' | '[' | ']' | '=' => {
                self.bump();
                self.text_token(simple_kind(c), start)
            }
            'b' | 'B' if self.peek_next() == Some('"') => self.read_bytes(start)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(start),
            '\'' => self.read_quoted_identifier(start)?,
            '"' => self.read_string(start)?,
            ' ' | '\t' | '\r' | '\n' => self.read_whitespace(start),
            c if c.is_ascii_digit() || c == '-' => self.read_number(start)?,
            '<' => {
                self.bump();
                let kind = match self.peek() {
                    Some('>') => TokenKind::Ne,
                    Some('=') => TokenKind::Lte,
                    _ => TokenKind::Lt,
                };
                if kind != TokenKind::Lt {
                    self.bump();
                }
                self.text_token(kind, start)
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    self.text_token(TokenKind::Gte, start)
                } else {
                    self.text_token(TokenKind::Gt, start)
                }
            }
            _ => {
                let column = self.input[..start].chars().count();
                return Err(LexError::UnrecognizedCharacter { ch: c, position: start, column });
            }
        };
        Ok(token)
    }

    /// 读取标识符或关键字
    /// 关键字按不区分大小写匹配，值保留原始大小写
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let kind = match_keyword(self.slice(start));
        self.text_token(kind, start)
    }

    fn read_whitespace(&mut self, start: usize) -> Token<'a> {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
            self.bump();
        }
        self.text_token(TokenKind::Whitespace, start)
    }

    /// 读取到未被转义的结束分隔符为止，返回两个分隔符之间的原文
    /// 反斜杠会转义紧随其后的任意字符（转义对原样保留）
    fn consume_until(&mut self, delimiter: char, start: usize) -> Result<&'a str, LexError> {
        self.bump(); // 消费开始的分隔符
        let content_start = self.position;
        loop {
            match self.bump() {
                None => return Err(LexError::Unclosed { delimiter, position: start }),
                Some('\\') => {
                    if self.bump().is_none() {
                        return Err(LexError::Unclosed { delimiter, position: start });
                    }
                }
                Some(c) if c == delimiter => {
                    return Ok(&self.input[content_start..self.position - c.len_utf8()]);
                }
                Some(_) => {}
            }
        }
    }

    /// 单引号包围的属性名，`\'` 还原为 `'`
    fn read_quoted_identifier(&mut self, start: usize) -> Result<Token<'a>, LexError> {
        let raw = self.consume_until('\'', start)?;
        let name = raw.replace("\\'", "'");
        Ok(Token::new(TokenKind::Identifier, TokenValue::Text(name), self.span(start), self.slice(start)))
    }

    /// 双引号包围的字符串字面量，`\"` 还原为 `"`
    fn read_string(&mut self, start: usize) -> Result<Token<'a>, LexError> {
        let raw = self.consume_until('"', start)?;
        let value = raw.replace("\\\"", "\"");
        Ok(self.literal_token(Literal::String(value), start))
    }

    /// `b"..."` 字节串，内容为 base64
    fn read_bytes(&mut self, start: usize) -> Result<Token<'a>, LexError> {
        self.bump(); // 消费 b
        let quote = self.position;
        let payload = self.consume_until('"', quote)?;

        let invalid = || LexError::InvalidBase64 { payload: payload.to_string(), position: start };
        if !payload.chars().all(is_base64_char) {
            return Err(invalid());
        }
        let decoded = BASE64.decode(payload).map_err(|_| invalid())?;
        Ok(self.literal_token(Literal::Bytes(decoded), start))
    }

    fn read_digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
    }

    /// 读取可带符号的整数部分，符号后必须至少有一位数字
    fn read_int(&mut self) -> Result<(), LexError> {
        let start = self.position;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let digits_start = self.position;
        self.read_digits();
        if self.position == digits_start {
            return Err(LexError::InvalidNumber { text: self.slice(start).to_string(), position: start });
        }
        Ok(())
    }

    /// 读取数字字面量：整数部分、可选的小数部分、可选的指数部分
    fn read_number(&mut self, start: usize) -> Result<Token<'a>, LexError> {
        self.read_int()?;

        if self.peek() == Some('.') {
            self.bump();
            match self.peek() {
                Some(c) if c.is_ascii_digit() => self.read_digits(),
                found => {
                    return Err(LexError::InvalidFraction { found, position: self.offending_position(found) });
                }
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            match self.peek() {
                Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.read_int()?,
                found => {
                    return Err(LexError::InvalidExponent { found, position: self.offending_position(found) });
                }
            }
        }

        let text = self.slice(start);
        // Number 保留原文（arbitrary_precision），不经过浮点换算
        let number = serde_json::from_str::<serde_json::Number>(text)
            .map_err(|_| LexError::InvalidNumber { text: text.to_string(), position: start })?;
        Ok(self.literal_token(Literal::Number(number), start))
    }
}

fn simple_kind(c: char) -> TokenKind {
    match c {
        '.' => TokenKind::Dot,
        ',' => TokenKind::Comma,
        ':' => TokenKind::Colon,
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        '{' => TokenKind::LBrace,
        '}' => TokenKind::RBrace,
        '[' => TokenKind::LBracket,
        ']' => TokenKind::RBracket,
        '=' => TokenKind::Eq,
        other => unreachable!("'{}' is not punctuation", other),
    }
}

fn match_keyword(s: &str) -> TokenKind {
    match s.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "between" => TokenKind::Between,
        "in" => TokenKind::In,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        _ => TokenKind::UnquotedIdentifier,
    }
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.input.is_empty() {
            self.finished = true;
            return Some(Err(LexError::Empty));
        }

        let start = self.position;
        let Some(c) = self.peek() else {
            self.finished = true;
            return Some(Ok(self.eof())); // 到达输入末尾
        };

        let result = self.scan(c, start);
        match &result {
            Ok(token) => trace!(kind = %token.kind, start = token.span.start, end = token.span.end, "token"),
            Err(_) => self.finished = true,
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Number;

    fn kinds_and_values(input: &str) -> Vec<(TokenKind, TokenValue)> {
        let mut tokens = tokenize(input).unwrap();
        let eof = tokens.pop().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        tokens.into_iter().map(|t| (t.kind, t.value)).collect()
    }

    fn text(s: &str) -> TokenValue {
        TokenValue::Text(s.to_string())
    }

    fn lit(l: impl Into<Literal>) -> TokenValue {
        TokenValue::Literal(l.into())
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(kinds_and_values("spam"), vec![(TokenKind::UnquotedIdentifier, text("spam"))]);
        assert_eq!(kinds_and_values("'foo'"), vec![(TokenKind::Identifier, text("foo"))]);
        assert_eq!(kinds_and_values(r"'f\'oo'"), vec![(TokenKind::Identifier, text("f'oo"))]);
        assert_eq!(kinds_and_values("boo"), vec![(TokenKind::UnquotedIdentifier, text("boo"))]);
        assert_eq!(kinds_and_values("b"), vec![(TokenKind::UnquotedIdentifier, text("b"))]);
        assert_eq!(kinds_and_values("_a1"), vec![(TokenKind::UnquotedIdentifier, text("_a1"))]);
    }

    #[test]
    fn test_other_escapes_are_kept() {
        assert_eq!(kinds_and_values(r"'a\nb'"), vec![(TokenKind::Identifier, text(r"a\nb"))]);
        assert_eq!(kinds_and_values(r#""a\\""#), vec![(TokenKind::Literal, lit(r"a\\"))]);
    }

    #[test]
    fn test_strings() {
        assert_eq!(kinds_and_values(r#""spam""#), vec![(TokenKind::Literal, lit("spam"))]);
        assert_eq!(kinds_and_values(r#""s\"pam""#), vec![(TokenKind::Literal, lit("s\"pam"))]);
        assert_eq!(kinds_and_values(r#""""#), vec![(TokenKind::Literal, lit(""))]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds_and_values("100"), vec![(TokenKind::Literal, lit(100i64))]);
        assert_eq!(kinds_and_values("-100"), vec![(TokenKind::Literal, lit(-100i64))]);

        let floats = [("1.01", 1.01), ("1.01e6", 1.01e6), ("1.01E6", 1.01e6), ("1.01e+6", 1.01e6), ("1.01e-6", 1.01e-6)];
        for (input, expected) in floats {
            let tokens = kinds_and_values(input);
            assert_eq!(tokens.len(), 1, "{}", input);
            match &tokens[0] {
                (TokenKind::Literal, TokenValue::Literal(Literal::Number(n))) => {
                    assert_eq!(n.to_string(), input);
                    assert_eq!(n.as_f64(), Some(expected), "{}", input);
                    assert_eq!(n.as_f64(), input.parse::<f64>().ok(), "{}", input);
                }
                other => panic!("Expected number literal for {}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_integers_stay_integers() {
        let tokens = kinds_and_values("7");
        assert_eq!(tokens[0].1, TokenValue::Literal(Literal::Number(Number::from(7))));
    }

    #[test]
    fn test_number_text_is_kept_exactly() {
        let inputs = ["123456789012345678901234567890", "-98765432109876543210", "0.73575876580499574e-278", "1E+2"];
        for input in inputs {
            let tokens = kinds_and_values(input);
            match &tokens[0].1 {
                TokenValue::Literal(Literal::Number(n)) => {
                    assert_eq!(n.to_string(), input);
                    assert_eq!(serde_json::to_string(n).unwrap(), input);
                }
                other => panic!("Expected number literal for {}, got {:?}", input, other),
            }
        }

        let tokens = kinds_and_values("0.73575876580499574e-278");
        match &tokens[0].1 {
            TokenValue::Literal(Literal::Number(n)) => {
                assert_eq!(n.as_f64(), Some(7.357587658049958e-279));
            }
            other => panic!("Expected number literal, got {:?}", other),
        }
    }

    #[test]
    fn test_bytes() {
        assert_eq!(kinds_and_values(r#"b"4pyT""#), vec![(TokenKind::Literal, lit(vec![0xe2u8, 0x9c, 0x93]))]);
        assert_eq!(kinds_and_values(r#"B"c3BhbQ==""#), vec![(TokenKind::Literal, lit(b"spam".to_vec()))]);
        assert_eq!(kinds_and_values(r#"b"""#), vec![(TokenKind::Literal, lit(Vec::<u8>::new()))]);
    }

    #[test]
    fn test_sequence() {
        assert_eq!(
            kinds_and_values(r#"foo, 'bar', "baz""#),
            vec![
                (TokenKind::UnquotedIdentifier, text("foo")),
                (TokenKind::Comma, text(",")),
                (TokenKind::Whitespace, text(" ")),
                (TokenKind::Identifier, text("bar")),
                (TokenKind::Comma, text(",")),
                (TokenKind::Whitespace, text(" ")),
                (TokenKind::Literal, lit("baz")),
            ]
        );
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        let cases = [
            (".", TokenKind::Dot),
            (",", TokenKind::Comma),
            (":", TokenKind::Colon),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            ("=", TokenKind::Eq),
            (">", TokenKind::Gt),
            (">=", TokenKind::Gte),
            ("<", TokenKind::Lt),
            ("<=", TokenKind::Lte),
            ("<>", TokenKind::Ne),
        ];
        for (input, kind) in cases {
            assert_eq!(kinds_and_values(input), vec![(kind, text(input))]);
        }
    }

    #[test]
    fn test_keywords_keep_their_case() {
        let cases = [
            ("and", TokenKind::And),
            ("between", TokenKind::Between),
            ("in", TokenKind::In),
            ("or", TokenKind::Or),
            ("not", TokenKind::Not),
        ];
        for (word, kind) in cases {
            for variant in [word.to_string(), word.to_uppercase(), capitalize(word)] {
                assert_eq!(kinds_and_values(&variant), vec![(kind, text(&variant))]);
            }
        }
        // 关键字前缀不是关键字
        assert_eq!(kinds_and_values("android"), vec![(TokenKind::UnquotedIdentifier, text("android"))]);
    }

    fn capitalize(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }

    #[test]
    fn test_whitespace_runs() {
        let tokens = tokenize("a \t\r\n= 1").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Whitespace);
        assert_eq!(tokens[1].value, text(" \t\r\n"));
        assert_eq!(tokens[1].span, Span::new(1, 5));
    }

    #[test]
    fn test_spans_are_absolute() {
        let tokens = tokenize(r#"a = 'b c' and d = "e" or f = b"AA==""#).unwrap();
        let quoted = tokens.iter().find(|t| t.kind == TokenKind::Identifier).unwrap();
        assert_eq!(quoted.span, Span::new(4, 9));
        assert_eq!(quoted.lexeme, "'b c'");

        let literals: Vec<_> = tokens.iter().filter(|t| t.kind == TokenKind::Literal).collect();
        assert_eq!(literals[0].span, Span::new(18, 21));
        assert_eq!(literals[1].span, Span::new(29, 36));
        assert_eq!(literals[1].lexeme, r#"b"AA==""#);

        let eof = tokens.last().unwrap();
        assert_eq!(eof.span, Span::new(36, 36));
    }

    #[test]
    fn test_lexemes_reconstruct_input() {
        let inputs = [
            r#"a = 1 AND (b <> "x\"y" or not c between -1.5e3 and 7)"#,
            r#"contains('na\'me', b"c3BhbQ==") "#,
            "  x , y,z  ",
        ];
        for input in inputs {
            let rebuilt: String = tokenize(input).unwrap().iter().map(|t| t.lexeme).collect();
            assert_eq!(rebuilt, input);
        }
    }

    #[test]
    fn test_eof_exactly_once() {
        let tokens = tokenize("a = 1").unwrap();
        let eofs = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
        assert_eq!(eofs, 1);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);

        let mut lexer = Lexer::new("a");
        assert!(lexer.next().unwrap().is_ok());
        assert_eq!(lexer.next().unwrap().unwrap().kind, TokenKind::Eof);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_empty_expression() {
        assert_eq!(tokenize(""), Err(LexError::Empty));
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next(), Some(Err(LexError::Empty)));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_lexer_errors() {
        let cases = [
            ("'", "'\n^"),
            ("\"", "\"\n^"),
            ("-", "-\n^"),
            ("1e-", "1e-\n  ^"),
            ("1ex", "1ex\n  ^"),
            ("1.", "1.\n ^"),
            ("1.x", "1.x\n  ^"),
            ("&", "&\n^"),
            ("|", "|\n^"),
            ("b\"", "b\"\n ^"),
            ("b\"&\"", "b\"&\"\n^"),
            // 填充不正确
            ("b\"898989;;\"", "b\"898989;;\"\n^"),
        ];
        for (input, caret) in cases {
            let err = tokenize(input).unwrap_err();
            let rendered = err.render(input);
            assert!(rendered.contains(caret), "{:?} rendered as {:?}", input, rendered);
        }
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(tokenize("a & b"), Err(LexError::UnrecognizedCharacter { ch: '&', position: 2, column: 2 })));
        assert!(matches!(tokenize("'abc"), Err(LexError::Unclosed { delimiter: '\'', position: 0 })));
        assert!(matches!(tokenize(r"'abc\"), Err(LexError::Unclosed { .. })));
        assert!(matches!(tokenize("1.x"), Err(LexError::InvalidFraction { found: Some('x'), .. })));
        assert!(matches!(tokenize("1e"), Err(LexError::InvalidExponent { found: None, position: 1 })));
        assert!(matches!(tokenize("- 1"), Err(LexError::InvalidNumber { .. })));
        assert!(matches!(tokenize("01"), Err(LexError::InvalidNumber { .. })));
        assert!(matches!(tokenize(r#"b"QQ""#), Err(LexError::InvalidBase64 { .. })));
        assert!(matches!(tokenize("é"), Err(LexError::UnrecognizedCharacter { ch: 'é', position: 0, .. })));
        // 消息里的位置按字符计，position 字段按字节计
        let err = tokenize("'é' |").unwrap_err();
        assert_eq!(err, LexError::UnrecognizedCharacter { ch: '|', position: 5, column: 4 });
        assert_eq!(err.to_string(), "Unrecognized character | at position 4");
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut lexer = Lexer::new("a &");
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_err());
        assert!(lexer.next().is_none());
    }
}
