//! 本地文件/文件夹扫描
//!
//! 负责:
//! - 单个文件直接生成上传句柄
//! - 文件夹递归扫描，相对路径形如 "/<文件夹名>/<子路径>"，与拖入文件夹时一致

use crate::uploader::item::UploadFile;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// 扫描配置
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// 跳过隐藏文件（以.开头的文件和文件夹）
    pub skip_hidden: bool,
    /// 是否跟随符号链接
    pub follow_symlinks: bool,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// 将本地路径展开为上传句柄
///
/// 文件夹中的文件按相对路径排序
pub fn scan_upload_files<P: AsRef<Path>>(root: P, options: &ScanOptions) -> Result<Vec<UploadFile>> {
    let root = root.as_ref();
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("读取文件元数据失败: {}", root.display()))?;

    if metadata.is_file() {
        return Ok(vec![UploadFile::new(root.to_path_buf(), metadata.len())]);
    }

    let folder_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    info!("开始扫描文件夹: {}", root.display());

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        // 根目录本身不参与隐藏判断
        .filter_entry(|e| e.depth() == 0 || !(options.skip_hidden && is_hidden(e)));

    for entry in walker {
        let entry = entry.with_context(|| format!("扫描文件夹失败: {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let size = entry
            .metadata()
            .with_context(|| format!("读取文件元数据失败: {}", entry.path().display()))?
            .len();
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("计算相对路径失败: {}", entry.path().display()))?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        debug!("扫描到文件: {} ({} 字节)", entry.path().display(), size);
        files.push(
            UploadFile::new(entry.path().to_path_buf(), size)
                .with_relative_path(format!("/{}/{}", folder_name, relative)),
        );
    }

    info!("文件夹扫描完成: {} 个文件", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        fs::write(&path, b"hello").unwrap();

        let files = scan_upload_files(&path, &ScanOptions::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "note.txt");
        assert_eq!(files[0].size, 5);
        assert!(files[0].relative_path.is_none());
        assert_eq!(files[0].path_or_file_name(), "note.txt");
    }

    #[test]
    fn test_scan_folder_keeps_structure() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(root.join("2024")).unwrap();
        fs::write(root.join("a.jpg"), b"a").unwrap();
        fs::write(root.join("2024").join("b.jpg"), b"bb").unwrap();

        let files = scan_upload_files(&root, &ScanOptions::default()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path_or_file_name()).collect();
        assert_eq!(paths, vec!["/photos/2024/b.jpg", "/photos/a.jpg"]);
        assert_eq!(files[0].size, 2);
    }

    #[test]
    fn test_scan_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".env"), b"x").unwrap();
        fs::write(root.join(".git").join("HEAD"), b"x").unwrap();
        fs::write(root.join("readme.md"), b"x").unwrap();

        let options = ScanOptions {
            skip_hidden: true,
            ..Default::default()
        };
        let files = scan_upload_files(&root, &options).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path_or_file_name()).collect();
        assert_eq!(paths, vec!["/docs/readme.md"]);

        let all = scan_upload_files(&root, &ScanOptions::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_scan_missing_path() {
        assert!(scan_upload_files("/no/such/path", &ScanOptions::default()).is_err());
    }
}
