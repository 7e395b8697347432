use std::fmt::Write;

/// 发送给模型的系统提示词
pub const SYSTEM_PROMPT: &str = "You are the best software engineer.\n\
    You will take some text inputs for a C program.\n\
    Generate an input seed for my fuzzer that generates an input that has new program state when program crashed.\n";

const GOAL: &str = "Please generate a new program input that can generate unique program states.\n\n";
const GOOD_HEADER: &str = "* Inputs that contributes to generate unique program states:\n";
const BAD_HEADER: &str = "* Inputs that does NOT contribute to generate unique program states:\n";

const RULES: &[&str] = &[
    "Do NOT give any description.",
    "Give me the new inputs ONLY between ``` and ```.",
    "Just generate ONE input. Do not generate multiple inputs.",
    "New program input should follow its own input format.",
    "New program input should occur crash.",
];

/// 根据好/坏样例构造用户提示词
pub fn build_prompt(program: &str, good: &[String], bad: &[String]) -> String {
    let mut prompt = format!("Below is the inputs for {program} program ");
    match (good.is_empty(), bad.is_empty()) {
        (false, false) => {
            prompt.push_str("that are helpful to generate new program states or not. ");
            prompt.push_str(GOAL);
            push_examples(&mut prompt, GOOD_HEADER, good);
            push_examples(&mut prompt, BAD_HEADER, bad);
        }
        (false, true) => {
            prompt.push_str("that are helpful to generate new program states. ");
            prompt.push_str(GOAL);
            push_examples(&mut prompt, GOOD_HEADER, good);
        }
        (true, false) => {
            prompt.push_str("that are NOT helpful to generate new program states. ");
            prompt.push_str(GOAL);
            push_examples(&mut prompt, BAD_HEADER, bad);
        }
        (true, true) => prompt.push_str(GOAL),
    }

    prompt.push_str("Please follow the rules below:");
    let mut rules = RULES.to_vec();
    if program.contains("xml") {
        rules.push("New program input should be a valid XML format.");
    }
    for (i, rule) in rules.iter().enumerate() {
        let _ = write!(prompt, "\n{}. {rule}", i + 1);
    }
    prompt
}

fn push_examples(prompt: &mut String, header: &str, examples: &[String]) {
    prompt.push_str(header);
    for (i, example) in examples.iter().enumerate() {
        let _ = write!(prompt, "{}.\n```\n{example}\n```\n", i + 1);
    }
}

/// 取出回复中第一个代码块的内容，去掉语言标记行；没有代码块时返回整个回复
pub fn extract_seed(reply: &str) -> String {
    let Some(start) = reply.find("```") else {
        return reply.to_string();
    };
    let rest = &reply[start + 3..];
    // 开头的 ``` 所在行剩余部分为语言标记
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => return String::new(),
    };
    match body.find("```") {
        Some(end) => body[..end].strip_suffix('\n').unwrap_or(&body[..end]).to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_sections() {
        let good = vec!["<a/>".to_string()];
        let bad = vec!["<b>".to_string(), "<c>".to_string()];

        let both = build_prompt("xmllint", &good, &bad);
        assert!(both.starts_with("Below is the inputs for xmllint program that are helpful"));
        assert!(both.contains(GOOD_HEADER) && both.contains(BAD_HEADER));
        assert!(both.contains("2.\n```\n<c>\n```\n"));
        assert!(both.ends_with("6. New program input should be a valid XML format."));

        let only_good = build_prompt("readelf", &good, &[]);
        assert!(only_good.contains(GOOD_HEADER) && !only_good.contains(BAD_HEADER));
        assert!(only_good.ends_with("5. New program input should occur crash."));

        let only_bad = build_prompt("readelf", &[], &bad);
        assert!(only_bad.contains("that are NOT helpful"));
        assert!(!only_bad.contains(GOOD_HEADER));
    }

    #[test]
    fn test_prompt_without_examples() {
        let prompt = build_prompt("objdump", &[], &[]);
        assert!(prompt.contains("Please follow the rules below:\n1. "));
        assert!(!prompt.contains("```\n"));
    }

    #[test]
    fn test_extract_seed() {
        assert_eq!(extract_seed("```\nabc\n```"), "abc");
        assert_eq!(extract_seed("Here:\n```xml\n<a>\n</a>\n```\ntrailing"), "<a>\n</a>");
        assert_eq!(extract_seed("```\nfirst\n```\n```\nsecond\n```"), "first");
        assert_eq!(extract_seed("plain reply"), "plain reply");
        assert_eq!(extract_seed("```\nunterminated"), "unterminated");
    }
}
