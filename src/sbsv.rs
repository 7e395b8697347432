//! SBSV（square bracket separated values）行解析
//!
//! 每行形如 `[schema] [name value] [name: value] ...`，方括号内可用 `\[`、`\]`、`\\` 转义。

use std::collections::HashMap;

/// 一行 SBSV 记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbsvLine {
    pub schema: String,
    pub fields: HashMap<String, String>,
}

impl SbsvLine {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// 解析一行，空行返回 `Ok(None)`
pub fn parse_line(line: &str) -> Result<Option<SbsvLine>, String> {
    let tokens = tokenize(line)?;
    let mut tokens = tokens.into_iter();
    let Some(schema) = tokens.next() else {
        return Ok(None);
    };
    let schema = schema.trim().to_string();
    if schema.is_empty() {
        return Err("schema 名称为空".to_string());
    }

    let mut fields = HashMap::new();
    for token in tokens {
        let (name, value) = split_field(&token);
        if name.is_empty() {
            return Err(format!("字段名称为空: [{token}]"));
        }
        // 同名字段以最后一次出现为准
        fields.insert(name.to_string(), value.to_string());
    }

    Ok(Some(SbsvLine { schema, fields }))
}

/// 将一行拆分为方括号内的文本
fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = vec![];
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if c != '[' {
            return Err(format!("方括号外出现多余字符 '{c}'"));
        }

        let mut token = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(e @ ('[' | ']' | '\\')) => token.push(e),
                    Some(e) => {
                        token.push('\\');
                        token.push(e);
                    }
                    None => token.push('\\'),
                },
                ']' => {
                    closed = true;
                    break;
                }
                _ => token.push(c),
            }
        }
        if !closed {
            return Err("方括号未闭合".to_string());
        }
        tokens.push(token);
    }

    Ok(tokens)
}

/// 支持 `name value`、`name: value`、`name:value` 三种写法
fn split_field(token: &str) -> (&str, &str) {
    let token = token.trim();
    match token.find(|c: char| c.is_whitespace() || c == ':') {
        Some(i) => {
            let name = &token[..i];
            let rest = token[i..].trim_start();
            let rest = rest.strip_prefix(':').unwrap_or(rest);
            (name, rest.trim())
        }
        None => (token, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_space_separated() {
        let line = parse_line("[seed] [file id:000001] [hash 42] [vec 1,2,3,]").unwrap().unwrap();
        assert_eq!(line.schema, "seed");
        assert_eq!(line.get("file"), Some("id:000001"));
        assert_eq!(line.get("hash"), Some("42"));
        assert_eq!(line.get("vec"), Some("1,2,3,"));
    }

    #[test]
    fn test_parse_colon_separated() {
        let line = parse_line("[seed] [hash: 7] [dfg:3]").unwrap().unwrap();
        assert_eq!(line.get("hash"), Some("7"));
        assert_eq!(line.get("dfg"), Some("3"));
    }

    #[test]
    fn test_escape() {
        let line = parse_line(r"[seed] [file a\]b\[c\\d]").unwrap().unwrap();
        assert_eq!(line.get("file"), Some(r"a]b[c\d"));
    }

    #[test]
    fn test_empty_value() {
        let line = parse_line("[seed] [vec]").unwrap().unwrap();
        assert_eq!(line.get("vec"), Some(""));
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_unclosed_bracket() {
        assert!(parse_line("[seed] [hash 1").is_err());
    }

    #[test]
    fn test_garbage_outside_brackets() {
        assert!(parse_line("seed [hash 1]").is_err());
    }
}
