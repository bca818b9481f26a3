//! # 文件状态查询
//!
//! 将请求中的逻辑路径映射到资源根目录下的物理路径，并执行一次 `stat`。
//! 多文件请求的各个 `stat` 并发发起，全部完成后再按固定优先级裁决错误。

use std::{
    io,
    path::{Component, Path, PathBuf},
};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, warn};
use tokio::fs;

use crate::{exception::Exception, util::to_utc};

/// 一次 `stat` 调用的不可变快照，生命周期为单个请求。
///
/// 只有普通文件才会被构造成 `FileDescriptor`；mtime 已转换为可格式化的 UTC 时间。
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    path: PathBuf,
    inode: u64,
    mtime: DateTime<Utc>,
    size: u64,
}

impl FileDescriptor {
    pub fn new(path: PathBuf, inode: u64, mtime: DateTime<Utc>, size: u64) -> Self {
        Self {
            path,
            inode,
            mtime,
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn inode(&self) -> u64 {
        self.inode
    }

    pub fn mtime(&self) -> DateTime<Utc> {
        self.mtime
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> u64 {
    0
}

/// 将逻辑路径拼接到资源根目录下。
///
/// 路径只作为相对分量使用：开头的 `/`、`.` 和空分量被忽略，`..` 回退一级，
/// 回退越过根目录时返回 `NotFound`。
pub fn resolve_path(root: &Path, logical: &str) -> Result<PathBuf, Exception> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(logical).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(Exception::NotFound);
                }
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    let mut full = root.to_path_buf();
    full.extend(parts);
    Ok(full)
}

fn classify_io_error(e: &io::Error) -> Exception {
    match e.kind() {
        io::ErrorKind::NotFound => Exception::NotFound,
        _ => Exception::StatFailure,
    }
}

/// 查询单个逻辑路径的元数据
pub async fn stat(root: &Path, logical: &str, id: u128) -> Result<FileDescriptor, Exception> {
    let path = match resolve_path(root, logical) {
        Ok(p) => p,
        Err(e) => {
            warn!("[ID{}]路径{}越过了资源根目录", id, logical);
            return Err(e);
        }
    };
    debug!("[ID{}]映射物理路径：{}", id, path.display());

    let metadata = match fs::metadata(&path).await {
        Ok(m) => m,
        Err(e) => {
            let exception = classify_io_error(&e);
            match exception {
                Exception::NotFound => warn!("[ID{}]404 文件不存在：{}", id, path.display()),
                _ => error!("[ID{}]500 无法获取{}的元数据：{}", id, path.display(), e),
            }
            return Err(exception);
        }
    };

    if !metadata.is_file() {
        warn!("[ID{}]403 非法访问：{}", id, path.display());
        return Err(Exception::NotRegularFile);
    }

    let modified = match metadata.modified() {
        Ok(t) => t,
        Err(e) => {
            error!("[ID{}]无法获取文件{}的修改时间：{}", id, path.display(), e);
            return Err(Exception::StatFailure);
        }
    };
    let Some(mtime) = to_utc(modified) else {
        error!("[ID{}]文件{}的修改时间超出可表示范围", id, path.display());
        return Err(Exception::StatFailure);
    };

    Ok(FileDescriptor::new(path, inode_of(&metadata), mtime, metadata.len()))
}

/// 并发查询多个逻辑路径，结果顺序与输入一致。
///
/// 等待全部查询完成后才裁决：任一失败则整体失败，多个失败时按
/// `NotRegularFile > NotFound > StatFailure` 选出最终错误。
pub async fn stat_all(root: &Path, logicals: &[String], id: u128) -> Result<Vec<FileDescriptor>, Exception> {
    let results = join_all(logicals.iter().map(|logical| stat(root, logical, id))).await;

    let mut files = Vec::with_capacity(results.len());
    let mut failure: Option<Exception> = None;
    for result in results {
        match result {
            Ok(file) => files.push(file),
            Err(e) => failure = Some(failure.map_or(e, |f| f.worst(e))),
        }
    }

    match failure {
        Some(e) => {
            debug!("[ID{}]多文件请求中存在失败成员，裁决结果：{}", id, e);
            Err(e)
        }
        None => Ok(files),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;

    #[test]
    fn test_resolve_path_stays_under_root() {
        let root = Path::new("/srv/assets");
        assert_eq!(
            resolve_path(root, "/js/a.js").unwrap(),
            PathBuf::from("/srv/assets/js/a.js")
        );
        assert_eq!(
            resolve_path(root, "/js/./lib/../a.js").unwrap(),
            PathBuf::from("/srv/assets/js/a.js")
        );
        assert_eq!(
            resolve_path(root, "//js//a.js").unwrap(),
            PathBuf::from("/srv/assets/js/a.js")
        );
        assert_eq!(resolve_path(root, "/").unwrap(), PathBuf::from("/srv/assets"));
    }

    #[test]
    fn test_resolve_path_rejects_escape() {
        let root = Path::new("/srv/assets");
        assert_eq!(resolve_path(root, "/../etc/passwd"), Err(Exception::NotFound));
        assert_eq!(resolve_path(root, "/js/../../secret"), Err(Exception::NotFound));
    }

    #[tokio::test]
    async fn test_stat_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir(dir.path().join("js")).unwrap();
        stdfs::write(dir.path().join("js/a.js"), b"hello").unwrap();

        let file = stat(dir.path(), "/js/a.js", 0).await.unwrap();
        assert_eq!(file.size(), 5);
        assert_eq!(file.path(), dir.path().join("js/a.js"));
        #[cfg(unix)]
        assert_ne!(file.inode(), 0);
    }

    #[tokio::test]
    async fn test_stat_missing_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir(dir.path().join("css")).unwrap();

        assert_eq!(stat(dir.path(), "/missing.js", 0).await, Err(Exception::NotFound));
        assert_eq!(stat(dir.path(), "/css", 0).await, Err(Exception::NotRegularFile));
        assert_eq!(stat(dir.path(), "/css/", 0).await, Err(Exception::NotRegularFile));
    }

    #[tokio::test]
    async fn test_stat_all_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("b.js"), b"bb").unwrap();
        stdfs::write(dir.path().join("a.js"), b"a").unwrap();

        let logicals = vec!["/b.js".to_string(), "/a.js".to_string()];
        let files = stat_all(dir.path(), &logicals, 0).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].size(), 2);
        assert_eq!(files[1].size(), 1);
    }

    #[tokio::test]
    async fn test_stat_all_uses_fixed_priority() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("a.js"), b"a").unwrap();
        stdfs::create_dir(dir.path().join("dir.js")).unwrap();

        // 无论失败成员出现的先后顺序，目录（403）总是优先于不存在（404）
        let orders = [
            vec!["/a.js", "/missing.js", "/dir.js"],
            vec!["/dir.js", "/missing.js", "/a.js"],
            vec!["/missing.js", "/a.js", "/dir.js"],
        ];
        for order in orders {
            let logicals: Vec<String> = order.iter().map(|s| s.to_string()).collect();
            assert_eq!(
                stat_all(dir.path(), &logicals, 0).await,
                Err(Exception::NotRegularFile)
            );
        }

        let logicals = vec!["/a.js".to_string(), "/missing.js".to_string()];
        assert_eq!(stat_all(dir.path(), &logicals, 0).await, Err(Exception::NotFound));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stat_through_file_is_stat_failure() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("a.js"), b"a").unwrap();

        // 把普通文件当作目录访问得到 ENOTDIR，既不是“不存在”也不是“非普通文件”
        assert_eq!(stat(dir.path(), "/a.js/inner.js", 0).await, Err(Exception::StatFailure));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stat_all_not_found_beats_stat_failure() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("a.js"), b"a").unwrap();

        let orders = [
            ["/a.js/inner.js", "/missing.js"],
            ["/missing.js", "/a.js/inner.js"],
        ];
        for order in orders {
            let logicals: Vec<String> = order.iter().map(|s| s.to_string()).collect();
            assert_eq!(stat_all(dir.path(), &logicals, 0).await, Err(Exception::NotFound));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stat_unrepresentable_mtime_is_stat_failure() {
        use std::time::{Duration, UNIX_EPOCH};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("far.js");
        stdfs::write(&path, b"a").unwrap();
        let file = stdfs::File::options().write(true).open(&path).unwrap();
        let far = UNIX_EPOCH + Duration::from_secs(9_000_000_000_000);
        // 部分文件系统不接受这样的时间戳，此时无从构造该场景
        if file.set_modified(far).is_err() || stdfs::metadata(&path).unwrap().modified().unwrap() != far {
            return;
        }

        assert_eq!(stat(dir.path(), "/far.js", 0).await, Err(Exception::StatFailure));
    }
}
