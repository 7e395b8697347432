use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::fs;

/// 模糊测试器发出的一次请求
///
/// 请求文件每行为 `good\t<path>` 或 `bad\t<path>`，其余行忽略
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedRequest {
    /// 能产生新程序状态的样例
    pub good: Vec<PathBuf>,
    /// 不能产生新程序状态的样例
    pub bad: Vec<PathBuf>,
}

impl SeedRequest {
    pub fn parse(content: &str) -> Self {
        let mut request = Self::default();
        for line in content.lines() {
            let list = if line.starts_with("good") {
                &mut request.good
            } else if line.starts_with("bad") {
                &mut request.bad
            } else {
                continue;
            };
            match line.split('\t').nth(1).map(str::trim) {
                Some(path) if !path.is_empty() => list.push(PathBuf::from(path)),
                _ => debug!("忽略缺少路径的请求行: {line:?}"),
            }
        }
        request
    }
}

/// 将样例转换为可放入提示词的文本：非 UTF-8 字节和 NUL 被丢弃，制表符替换为四个空格
pub fn sanitize_example(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER && c != '\0')
        .collect::<String>()
        .replace('\t', "    ")
}

/// 读取所有样例，读取后删除样例文件；无法读取的样例会被跳过
pub async fn load_examples(paths: &[PathBuf]) -> Vec<String> {
    let mut examples = vec![];
    for path in paths {
        match fs::read(path).await {
            Ok(bytes) => examples.push(sanitize_example(&bytes)),
            Err(e) => warn!("无法读取样例 {}: {e}", path.display()),
        }
        remove(path).await;
    }
    examples
}

async fn remove(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        debug!("删除样例 {} 失败: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let content = "good\t/tmp/a\nbad\t/tmp/b\n# comment\ngood\t /tmp/c \ngood\n";
        let request = SeedRequest::parse(content);
        assert_eq!(request.good, vec![PathBuf::from("/tmp/a"), PathBuf::from("/tmp/c")]);
        assert_eq!(request.bad, vec![PathBuf::from("/tmp/b")]);
    }

    #[test]
    fn test_sanitize_example() {
        let bytes = b"<a>\tb\0c\xff</a>\n";
        assert_eq!(sanitize_example(bytes), "<a>    bc</a>\n");
    }

    #[tokio::test]
    async fn test_load_examples_removes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = dir.path().join("a");
        std::fs::write(&a, "hello\tworld").unwrap();
        let missing = dir.path().join("missing");

        let examples = load_examples(&[a.clone(), missing]).await;
        assert_eq!(examples, vec!["hello    world".to_string()]);
        assert!(!a.exists());
    }
}
