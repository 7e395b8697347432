use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use log::{debug, info};

use crate::error::{ClusterError, Result};
use crate::sbsv::{SbsvLine, parse_line};

/// 种子记录的 schema 名称
pub const SEED_SCHEMA: &str = "seed";

/// 结果文件中的一条种子记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRecord {
    pub file: String,
    pub hash: i64,
    pub dfg: i64,
    pub result: i64,
    pub time: i64,
    /// 特征向量，顺序即坐标
    pub vector: Vec<i64>,
}

/// 使用哪个字段作为种子的键
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySelector {
    /// 内容哈希
    #[default]
    Hash,
    /// DFG 节点 ID
    Dfg,
}

impl KeySelector {
    pub fn key(&self, record: &SeedRecord) -> i64 {
        match self {
            Self::Hash => record.hash,
            Self::Dfg => record.dfg,
        }
    }
}

impl SeedRecord {
    fn from_sbsv(line: &SbsvLine, lineno: usize) -> Result<Self> {
        let field = |name: &str| {
            line.get(name).ok_or_else(|| ClusterError::MalformedRecord {
                line: lineno,
                reason: format!("缺少字段 {name}"),
            })
        };
        fn int<T: FromStr>(name: &str, value: &str, lineno: usize) -> Result<T> {
            value.trim().parse().map_err(|_| ClusterError::MalformedRecord {
                line: lineno,
                reason: format!("字段 {name} 不是整数: {value:?}"),
            })
        }

        Ok(Self {
            file: field("file")?.to_string(),
            hash: int("hash", field("hash")?, lineno)?,
            dfg: int("dfg", field("dfg")?, lineno)?,
            result: int("res", field("res")?, lineno)?,
            time: int("time", field("time")?, lineno)?,
            vector: parse_vector(field("vec")?).map_err(|reason| ClusterError::MalformedRecord {
                line: lineno,
                reason,
            })?,
        })
    }
}

/// 解析逗号分隔的整数向量，空元素会被忽略
pub fn parse_vector(s: &str) -> Result<Vec<i64>, String> {
    s.trim()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<i64>().map_err(|_| format!("向量元素不是整数: {v:?}")))
        .collect()
}

/// 解析结果文件中的全部 `[seed]` 记录
pub fn parse_records(content: &str) -> Result<Vec<SeedRecord>> {
    let mut records = vec![];
    for (i, line) in content.lines().enumerate() {
        let lineno = i + 1;
        let line = parse_line(line)
            .map_err(|reason| ClusterError::MalformedRecord { line: lineno, reason })?;
        match line {
            Some(line) if line.schema == SEED_SCHEMA => {
                records.push(SeedRecord::from_sbsv(&line, lineno)?);
            }
            Some(line) => debug!("忽略第 {lineno} 行: schema = {}", line.schema),
            None => {}
        }
    }
    Ok(records)
}

/// 种子键到特征向量的有序映射
///
/// 键唯一；重复的键保留首次出现的位置，向量以最后一次为准
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorTable {
    keys: Vec<i64>,
    vectors: Vec<Vec<i64>>,
    index: HashMap<i64, usize>,
}

impl VectorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: i64, vector: Vec<i64>) {
        match self.index.get(&key) {
            Some(&i) => self.vectors[i] = vector,
            None => {
                self.index.insert(key, self.keys.len());
                self.keys.push(key);
                self.vectors.push(vector);
            }
        }
    }

    pub fn from_records(records: &[SeedRecord], selector: KeySelector) -> Self {
        let mut table = Self::new();
        for record in records {
            table.insert(selector.key(record), record.vector.clone());
        }
        table
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, key: i64) -> Option<&[i64]> {
        self.index.get(&key).map(|&i| self.vectors[i].as_slice())
    }

    pub fn keys(&self) -> &[i64] {
        &self.keys
    }

    pub fn vectors(&self) -> &[Vec<i64>] {
        &self.vectors
    }
}

/// 读取结果文件，构建向量表
pub fn read_result<P: AsRef<Path>>(path: P, selector: KeySelector) -> Result<VectorTable> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ClusterError::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let records = parse_records(&content)?;
    let table = VectorTable::from_records(&records, selector);
    info!("读取 {} 条种子记录，去重后 {} 个向量", records.len(), table.len());
    Ok(table)
}
