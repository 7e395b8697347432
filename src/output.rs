use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::error::Result;
use crate::model::ClusterAssignment;

/// 每行输出 `<key> <cluster>`，顺序与 assignment 一致
pub fn write_clusters<W: Write>(assignment: &ClusterAssignment, mut writer: W) -> io::Result<()> {
    for (key, cluster) in assignment.iter() {
        writeln!(writer, "{key} {cluster}")?;
    }
    writer.flush()
}

/// output 为空时输出到标准输出，否则覆盖写入该文件
pub fn save_clusters(assignment: &ClusterAssignment, output: &str) -> Result<()> {
    if output.is_empty() {
        write_clusters(assignment, io::stdout().lock())?;
    } else {
        write_clusters(assignment, BufWriter::new(File::create(output)?))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_clusters() {
        let assignment = ClusterAssignment::new(&[42, 7, 1000], &[1, 0, 1]);
        let mut buf = vec![];
        write_clusters(&assignment, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "42 1\n7 0\n1000 1\n");
    }

    #[test]
    fn test_save_overwrites_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clusters.txt");
        std::fs::write(&path, "stale content that is longer than the output\n").unwrap();

        let assignment = ClusterAssignment::new(&[1, 2], &[0, 1]);
        save_clusters(&assignment, path.to_str().unwrap()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1 0\n2 1\n");
    }

    #[test]
    fn test_empty_assignment() {
        let mut buf = vec![];
        write_clusters(&ClusterAssignment::default(), &mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
