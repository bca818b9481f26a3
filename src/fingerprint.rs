//! # 缓存指纹
//!
//! 由文件元数据（inode、修改时间、大小）派生强校验器。指纹从不落盘，每次请求重新计算。
//!
//! `etag = base64(sha1("{inode}-{HTTP-date(mtime)}-{size}"))`

use std::fmt::Display;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

use crate::lookup::FileDescriptor;
use crate::util::format_http_date;

/// 一次请求对应的缓存校验器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    last_modified: String,
    etag: String,
}

impl Fingerprint {
    /// 单文件与合并文件共用的计算规则
    fn from_parts(inode: impl Display, mtime: DateTime<Utc>, size: u64) -> Self {
        let last_modified = format_http_date(mtime);
        let source = format!("{}-{}-{}", inode, last_modified, size);
        let mut hasher = Sha1::new();
        hasher.update(source.as_bytes());
        let etag = STANDARD.encode(hasher.finalize());
        Self {
            last_modified,
            etag,
        }
    }

    pub fn of_file(file: &FileDescriptor) -> Self {
        Self::from_parts(file.inode(), file.mtime(), file.size())
    }

    pub fn of_aggregate(aggregate: &AggregateDescriptor) -> Self {
        Self::from_parts(aggregate.inode, aggregate.mtime, aggregate.size)
    }

    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }
}

/// 多文件合并请求的"虚拟文件"元数据。
///
/// inode 取成员的算术平均，mtime 取最大值，size 取总和。任一成员的 inode、mtime 或 size
/// 变化都会改变聚合后的指纹，且不需要读取文件内容。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateDescriptor {
    inode: f64,
    mtime: DateTime<Utc>,
    size: u64,
}

impl AggregateDescriptor {
    /// 空列表没有意义，返回 `None`
    pub fn from_files(files: &[FileDescriptor]) -> Option<Self> {
        let mtime = files.iter().map(FileDescriptor::mtime).max()?;
        // 以 f64 累加，避免大 inode 求和溢出
        let inode = files.iter().map(|f| f.inode() as f64).sum::<f64>() / files.len() as f64;
        let size = files
            .iter()
            .fold(0u64, |acc, f| acc.saturating_add(f.size()));
        Some(Self { inode, mtime, size })
    }

    pub fn inode(&self) -> f64 {
        self.inode
    }

    pub fn mtime(&self) -> DateTime<Utc> {
        self.mtime
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}
