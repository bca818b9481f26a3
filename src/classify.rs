//! # 请求分类
//!
//! 把请求目标解析为"欢迎页"、"单文件"或"多文件合并"三种情形之一，并执行方法与同类型校验。

use log::debug;

use crate::{
    exception::Exception,
    param::{HttpRequestMethod, BUNDLE_SEPARATOR},
    util::extension_of,
};

/// 允许合并的文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    Js,
    Css,
}

impl BundleKind {
    pub fn extension(&self) -> &'static str {
        match self {
            BundleKind::Js => "js",
            BundleKind::Css => "css",
        }
    }

    fn of(segment: &str) -> Option<Self> {
        match extension_of(segment) {
            Some("js") => Some(BundleKind::Js),
            Some("css") => Some(BundleKind::Css),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 站点根路径，直接返回配置中的欢迎文本
    Welcome,
    Single(String),
    /// 至少两个同类型文件，顺序与请求中一致
    Bundle {
        segments: Vec<String>,
        kind: BundleKind,
    },
}

impl Target {
    /// 需要 `stat` 的逻辑路径，欢迎页为空
    pub fn segments(&self) -> &[String] {
        match self {
            Target::Welcome => &[],
            Target::Single(segment) => std::slice::from_ref(segment),
            Target::Bundle { segments, .. } => segments,
        }
    }

    /// 决定 `Content-Type` 与是否压缩的代表扩展名
    pub fn extension(&self) -> Option<&str> {
        match self {
            Target::Welcome => None,
            Target::Single(segment) => extension_of(segment),
            Target::Bundle { kind, .. } => Some(kind.extension()),
        }
    }
}

/// 去掉查询字符串，只保留路径部分
fn path_of(target: &str) -> &str {
    match target.split_once('?') {
        Some((path, _)) => path,
        None => target,
    }
}

/// 对请求进行分类。非 GET 请求在解析路径之前即被拒绝。
pub fn classify(method: HttpRequestMethod, target: &str, id: u128) -> Result<Target, Exception> {
    if method != HttpRequestMethod::Get {
        debug!("[ID{}]拒绝非GET请求：{}", id, method);
        return Err(Exception::BadMethod);
    }

    let path = path_of(target);
    if path == "/" {
        return Ok(Target::Welcome);
    }

    let mut segments: Vec<String> = path
        .split(BUNDLE_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    match segments.len() {
        0 => Err(Exception::NotFound),
        1 => Ok(Target::Single(segments.remove(0))),
        n => {
            let kind = BundleKind::of(&segments[0]).ok_or(Exception::MixedFileTypes)?;
            if segments.iter().any(|s| BundleKind::of(s) != Some(kind)) {
                debug!("[ID{}]多文件请求中的文件类型不一致：{}", id, path);
                return Err(Exception::MixedFileTypes);
            }
            debug!("[ID{}]多文件请求，共{}个{}文件", id, n, kind.extension());
            Ok(Target::Bundle { segments, kind })
        }
    }
}
