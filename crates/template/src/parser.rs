//! Template tokenizer.
//!
//! Grammar (informal):
//! ```text
//! template  = (text | "{{" block "}}")*
//! block     = ws* (variable | literal | code)? ws*
//! variable  = "$" NAME
//! literal   = "'" chars "'" | '"' chars '"'      (backslash escapes the quote)
//! code      = fnref (ws+ arg)*
//! fnref     = NAME | NAME "." NAME
//! arg       = variable | literal | NAME ws* "=" ws* (variable | literal)
//! NAME      = [A-Za-z0-9_]+
//! ```
//!
//! A `{{$name}}` block is a Variable, a quoted literal on its own is Text,
//! and anything else inside the delimiters is a Code block. Single braces
//! and stray `}}` are ordinary text.

use crate::block::{Argument, ArgumentValue, Block, CodeBlock, FunctionRef};
use crate::TemplateError;

const OPEN: &str = "{{";
const CLOSE_LEN: usize = 2;

pub(crate) const NAMED_VALUE_PREFIX: &str =
    "Named argument values need to be prefixed with a quote or $.";

/// Parse a template string into a flat list of blocks.
pub fn parse(source: &str) -> Result<Vec<Block>, TemplateError> {
    let mut blocks = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            blocks.push(Block::Text(rest[..start].to_string()));
        }
        let inner = &rest[start + OPEN.len()..];
        let end = find_block_end(inner)?;
        if let Some(block) = classify(inner[..end].trim())? {
            blocks.push(block);
        }
        rest = &inner[end + CLOSE_LEN..];
    }

    if !rest.is_empty() {
        blocks.push(Block::Text(rest.to_string()));
    }
    Ok(blocks)
}

/// Byte offset of the `}}` closing the block that starts at `inner`.
/// Delimiters inside quoted literals don't count.
fn find_block_end(inner: &str) -> Result<usize, TemplateError> {
    let bytes = inner.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' && i + 1 < bytes.len() {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'}' if bytes.get(i + 1) == Some(&b'}') => return Ok(i),
                b'{' if bytes.get(i + 1) == Some(&b'{') => {
                    return Err(syntax("Unexpected '{{' inside an open '{{' block"));
                }
                _ => {}
            },
        }
        i += 1;
    }

    if quote.is_some() {
        Err(syntax("Unterminated quoted literal in template block"))
    } else {
        Err(syntax("Unterminated '{{' block: missing closing '}}'"))
    }
}

fn classify(content: &str) -> Result<Option<Block>, TemplateError> {
    if content.is_empty() {
        return Ok(None);
    }

    if let Some(name) = content.strip_prefix('$') {
        validate_name(name, "variable")?;
        return Ok(Some(Block::Variable(name.to_string())));
    }

    if content.starts_with(['\'', '"']) {
        let tokens = tokenize(content)?;
        return match tokens.as_slice() {
            [Token::Literal(text)] => Ok(Some(Block::Text(text.clone()))),
            _ => Err(syntax(format!(
                "Unexpected content after quoted literal in '{content}'"
            ))),
        };
    }

    parse_code(content).map(|code| Some(Block::Code(code)))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Var(String),
    Literal(String),
    Equals,
}

fn tokenize(content: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = content.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            _ if c.is_whitespace() => {
                chars.next();
            }
            '=' => {
                chars.next();
                tokens.push(Token::Equals);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.peek() {
                            Some(&next) if next == quote || next == '\\' => {
                                literal.push(next);
                                chars.next();
                            }
                            _ => literal.push('\\'),
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => literal.push(ch),
                        None => return Err(syntax("Unterminated quoted literal in template block")),
                    }
                }
                tokens.push(Token::Literal(literal));
            }
            '$' => {
                chars.next();
                let name = read_word(&mut chars);
                validate_name(&name, "variable")?;
                tokens.push(Token::Var(name));
            }
            _ => tokens.push(Token::Word(read_word(&mut chars))),
        }
    }

    Ok(tokens)
}

fn read_word(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == '=' || c == '\'' || c == '"' {
            break;
        }
        word.push(c);
        chars.next();
    }
    word
}

fn parse_code(content: &str) -> Result<CodeBlock, TemplateError> {
    let mut tokens = tokenize(content)?.into_iter().peekable();

    let function = match tokens.next() {
        Some(Token::Word(word)) => parse_function_ref(&word)?,
        _ => {
            return Err(syntax(format!(
                "Code block '{content}' must start with a function name"
            )));
        }
    };

    let mut arguments: Vec<Argument> = Vec::new();
    let mut positional = 0usize;

    while let Some(token) = tokens.next() {
        let argument = match token {
            Token::Var(name) => Argument::Variable(name),
            Token::Literal(text) => Argument::Literal(text),
            Token::Word(name) => {
                let named = parse_named(name, &mut tokens, &arguments, content)?;
                arguments.push(named);
                continue;
            }
            Token::Equals => {
                return Err(syntax(format!("Unexpected '=' in '{content}'")));
            }
        };

        if arguments.iter().any(|a| matches!(a, Argument::Named { .. })) {
            return Err(syntax(format!(
                "Positional argument after named arguments in '{content}'"
            )));
        }
        positional += 1;
        if positional > 1 {
            return Err(syntax(format!(
                "Functions support only one positional argument, found more in '{content}'"
            )));
        }
        arguments.push(argument);
    }

    Ok(CodeBlock {
        content: content.to_string(),
        function,
        arguments,
    })
}

fn parse_named(
    name: String,
    tokens: &mut std::iter::Peekable<std::vec::IntoIter<Token>>,
    previous: &[Argument],
    content: &str,
) -> Result<Argument, TemplateError> {
    if tokens.peek() != Some(&Token::Equals) {
        return Err(syntax(format!(
            "Unexpected token '{name}' in '{content}': arguments must be a $variable, a quoted literal or name=value"
        )));
    }
    tokens.next();
    validate_name(&name, "argument")?;

    let value = match tokens.next() {
        Some(Token::Var(var)) => ArgumentValue::Variable(var),
        Some(Token::Literal(text)) => ArgumentValue::Literal(text),
        _ => return Err(syntax(NAMED_VALUE_PREFIX)),
    };

    let duplicate = previous.iter().any(|a| {
        matches!(a, Argument::Named { name: existing, .. } if existing.eq_ignore_ascii_case(&name))
    });
    if duplicate {
        return Err(syntax(format!(
            "Duplicate named argument '{name}' in '{content}'"
        )));
    }
    Ok(Argument::Named { name, value })
}

fn parse_function_ref(word: &str) -> Result<FunctionRef, TemplateError> {
    let invalid = || syntax(format!("Invalid function name '{word}'"));
    let parts: Vec<&str> = word.split('.').collect();
    let (plugin, name) = match parts.as_slice() {
        [name] => (None, *name),
        [plugin, name] => (Some(*plugin), *name),
        _ => return Err(invalid()),
    };
    if !is_name(name) || plugin.is_some_and(|p| !is_name(p)) {
        return Err(invalid());
    }
    Ok(FunctionRef {
        plugin: plugin.map(str::to_string),
        name: name.to_string(),
    })
}

fn validate_name(name: &str, kind: &str) -> Result<(), TemplateError> {
    if name.is_empty() {
        return Err(syntax(format!("Empty {kind} name")));
    }
    if !is_name(name) {
        return Err(syntax(format!(
            "Invalid {kind} name '{name}': only ASCII letters, digits and '_' are allowed"
        )));
    }
    Ok(())
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn syntax(message: impl Into<String>) -> TemplateError {
    TemplateError::Syntax {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(blocks: &[Block], index: usize) -> &CodeBlock {
        match &blocks[index] {
            Block::Code(code) => code,
            other => panic!("expected code block at {index}, got {other:?}"),
        }
    }

    fn syntax_message(source: &str) -> String {
        match parse(source) {
            Err(TemplateError::Syntax { message }) => message,
            other => panic!("expected syntax error for {source:?}, got {other:?}"),
        }
    }

    #[test]
    fn extracts_mixed_blocks() {
        let template = "{$x11} This {$a} is {$_a} a {{$x11}} test {{$x11}} template {{foo}}{{bar $a}}{{baz $_a}}{{yay $x11}}{{food a='b' c = $d}}";
        let blocks = parse(template).unwrap();

        assert_eq!(blocks.len(), 10);
        assert_eq!(blocks[0], Block::Text("{$x11} This {$a} is {$_a} a ".into()));
        assert_eq!(blocks[1], Block::Variable("x11".into()));
        assert_eq!(blocks[2], Block::Text(" test ".into()));
        assert_eq!(blocks[3], Block::Variable("x11".into()));
        assert_eq!(blocks[4], Block::Text(" template ".into()));
        assert_eq!(code(&blocks, 5).content, "foo");
        assert_eq!(code(&blocks, 6).arguments, vec![Argument::Variable("a".into())]);
        assert_eq!(code(&blocks, 7).arguments, vec![Argument::Variable("_a".into())]);
        assert_eq!(code(&blocks, 8).content, "yay $x11");

        let food = code(&blocks, 9);
        assert_eq!(food.function.name, "food");
        assert_eq!(
            food.arguments,
            vec![
                Argument::Named {
                    name: "a".into(),
                    value: ArgumentValue::Literal("b".into())
                },
                Argument::Named {
                    name: "c".into(),
                    value: ArgumentValue::Variable("d".into())
                },
            ]
        );
    }

    #[test]
    fn single_braces_and_plain_text_are_text() {
        let blocks = parse("{$x} mid {{$x}} end {{foo}}").unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], Block::Text("{$x} mid ".into()));
        assert_eq!(blocks[1], Block::Variable("x".into()));
        assert!(blocks[2].is_text());
        assert!(blocks[3].is_code());
        assert_eq!(blocks[3].content(), "foo");

        assert_eq!(
            parse("no blocks here").unwrap(),
            vec![Block::Text("no blocks here".into())]
        );
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn parsing_is_idempotent() {
        let source = "Hi {{$name}}, {{text.uppercase 'x'}} and {{f a=$b}}";
        assert_eq!(parse(source).unwrap(), parse(source).unwrap());
    }

    #[test]
    fn qualified_function_reference() {
        let blocks = parse("{{ plugin.fn input=$input age='42' }}").unwrap();
        let block = code(&blocks, 0);
        assert_eq!(
            block.function,
            FunctionRef {
                plugin: Some("plugin".into()),
                name: "fn".into()
            }
        );
        assert_eq!(block.function.to_string(), "plugin.fn");
        assert_eq!(block.arguments.len(), 2);
        assert!(block.positional().is_none());
    }

    #[test]
    fn escaped_quote_inside_literal() {
        let blocks = parse(r"{{f 'Let\'s-a go!'}}").unwrap();
        assert_eq!(
            code(&blocks, 0).arguments,
            vec![Argument::Literal("Let's-a go!".into())]
        );

        let blocks = parse(r#"{{f "say \"hi\" \d"}}"#).unwrap();
        assert_eq!(
            code(&blocks, 0).arguments,
            vec![Argument::Literal(r#"say "hi" \d"#.into())]
        );
    }

    #[test]
    fn closing_delimiter_inside_literal_does_not_close_block() {
        let blocks = parse("{{f '}}'}}!").unwrap();
        assert_eq!(code(&blocks, 0).arguments, vec![Argument::Literal("}}".into())]);
        assert_eq!(blocks[1], Block::Text("!".into()));
    }

    #[test]
    fn literal_block_becomes_text_and_empty_block_is_dropped() {
        let blocks = parse("a{{ 'lit' }}b{{ }}c").unwrap();
        assert_eq!(
            blocks,
            vec![
                Block::Text("a".into()),
                Block::Text("lit".into()),
                Block::Text("b".into()),
                Block::Text("c".into()),
            ]
        );
    }

    #[test]
    fn stray_closing_delimiter_is_text() {
        let blocks = parse(r#"{"a": {"b": 1}} done"#).unwrap();
        assert_eq!(blocks, vec![Block::Text(r#"{"a": {"b": 1}} done"#.into())]);
    }

    #[test]
    fn unbalanced_delimiters_are_errors() {
        assert!(syntax_message("Hello {{$name").contains("Unterminated"));
        assert!(syntax_message("{{ f {{$x}} }}").contains("inside an open"));
        assert!(syntax_message("{{f 'abc}}").contains("quoted literal"));
    }

    #[test]
    fn named_value_must_be_prefixed() {
        assert_eq!(syntax_message("{{f a=b}}"), NAMED_VALUE_PREFIX);
        assert_eq!(syntax_message("{{f a=}}"), NAMED_VALUE_PREFIX);
    }

    #[test]
    fn argument_order_and_uniqueness() {
        assert!(syntax_message("{{f $a $b}}").contains("only one positional"));
        assert!(syntax_message("{{f x='1' $a}}").contains("after named"));
        assert!(syntax_message("{{f x='1' X=$y}}").contains("Duplicate"));
        assert!(syntax_message("{{f bare}}").contains("Unexpected token 'bare'"));
    }

    #[test]
    fn invalid_names_are_errors() {
        assert!(syntax_message("{{$}}").contains("Empty variable name"));
        assert!(syntax_message("{{$a-b}}").contains("Invalid variable name"));
        assert!(syntax_message("{{a.b.c}}").contains("Invalid function name"));
        assert!(syntax_message("{{f $}}").contains("Empty variable name"));
        assert!(syntax_message("{{'a' 'b'}}").contains("after quoted literal"));
    }
}
