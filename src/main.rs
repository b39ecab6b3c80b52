use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use ddb_expr::{extract, parse_with_config, tokenize, ConfigError, ShellConfig};

const CONFIG_FILE: &str = "ddb_expr.json";

const HELP: &str = "\
命令:
  .tokens <表达式>   显示 token 列表
  .parse <表达式>    显示语法树和规范化后的表达式
  .extract <表达式>  显示占位符替换结果 (JSON)
  .help              显示本帮助
  .quit              退出
直接输入表达式等同于 .extract";

/// 一行输入对应的命令
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Tokens(&'a str),
    Parse(&'a str),
    Extract(&'a str),
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let Some(rest) = line.strip_prefix('.') else {
            return Command::Extract(line);
        };
        let (name, argument) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let argument = argument.trim();
        match name {
            "tokens" => Command::Tokens(argument),
            "parse" => Command::Parse(argument),
            "extract" => Command::Extract(argument),
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(name),
        }
    }
}

/// `RUST_LOG` 优先，否则使用配置中的日志级别
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level).with_context(|| format!("无效的日志级别: {}", log_level))?
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

fn show_tokens(expression: &str) {
    match tokenize(expression) {
        Ok(tokens) => {
            for token in &tokens {
                println!(
                    "{:>4}..{:<4} {:<20} {}",
                    token.span.start,
                    token.span.end,
                    token.kind.as_str(),
                    token.value
                );
            }
            println!("共 {} 个 token", tokens.len());
        }
        Err(e) => println!("✗ 分词失败: {}", e.render(expression)),
    }
}

fn show_ast(expression: &str, config: &ShellConfig) {
    match parse_with_config(expression, config.parser_config()) {
        Ok(ast) => {
            println!("AST 结构: {:#?}", ast);
            println!("规范化表达式: {}", ast);
        }
        Err(e) => println!("✗ 解析失败: {}", e.render(expression)),
    }
}

fn show_extraction(expression: &str, config: &ShellConfig) -> Result<()> {
    match extract(expression, config.index_start) {
        Ok(extraction) => {
            let json = serde_json::to_string_pretty(&extraction).context("无法序列化提取结果")?;
            println!("{}", json);
        }
        Err(e) => println!("✗ 提取失败: {}", e.render(expression)),
    }
    Ok(())
}

fn main() -> Result<()> {
    let (config, load_error) = match ShellConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => (config, None),
        Err(e) => (ShellConfig::default(), Some(e)),
    };
    init_tracing(&config.log_level)?;
    match load_error {
        None | Some(ConfigError::NotFound(_)) => {}
        Some(e) => warn!(error = %e, "无法加载配置文件, 使用默认配置"),
    }
    debug!(?config, "配置");

    let mut editor = DefaultEditor::new().context("无法创建行编辑器")?;
    if editor.load_history(&config.history_file).is_err() {
        debug!(path = %config.history_file.display(), "没有历史记录");
    }

    println!("--- ddb_expr: 条件表达式分析器 (.help 查看命令) ---");

    loop {
        match editor.readline("ddb> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match Command::parse(line) {
                    Command::Tokens(expression) => show_tokens(expression),
                    Command::Parse(expression) => show_ast(expression, &config),
                    Command::Extract(expression) => show_extraction(expression, &config)?,
                    Command::Help => println!("{}", HELP),
                    Command::Quit => break,
                    Command::Unknown(name) => println!("未知命令: .{} (输入 .help 查看命令)", name),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("读取输入失败"),
        }
    }

    if let Err(e) = editor.save_history(&config.history_file) {
        warn!(error = %e, "无法保存历史记录");
    }
    Ok(())
}
