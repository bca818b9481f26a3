// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了静态资源服务器在请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了协议解析错误、请求分类错误以及文件系统错误。
//! - **语义映射**：每个变体都唯一对应一个 HTTP 状态码和一段固定的纯文本响应体。
//! - **不重试**：所有异常都是终态，上层只负责将其转化为响应并记录日志。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行不完整或格式错误。
    MalformedRequest,
    /// 客户端使用了 GET 以外的请求方法。
    BadMethod,
    /// 多文件请求中混用了 `.js` 与 `.css`（或其它扩展名）。
    MixedFileTypes,
    /// 在资源根目录下未找到所请求的文件。对应 `404 Not Found`。
    NotFound,
    /// 目标存在，但不是普通文件（目录、设备文件等）。对应 `403 Forbidden`。
    NotRegularFile,
    /// 除"不存在"以外的文件系统错误（权限、I/O 故障等）。对应 `500`。
    StatFailure,
}

use Exception::*;

impl Exception {
    /// 异常对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | MalformedRequest | BadMethod | MixedFileTypes => 400,
            NotRegularFile => 403,
            NotFound => 404,
            StatFailure => 500,
        }
    }

    /// 异常对应的固定纯文本响应体
    pub fn body(&self) -> &'static str {
        match self.status_code() {
            403 => "403 Forbidden",
            404 => "404 Not Found",
            500 => "500 Internal Server Error",
            _ => "400 Bad Request",
        }
    }

    /// 多文件请求中多个成员同时失败时的裁决优先级，数值越大越优先。
    ///
    /// `NotRegularFile > NotFound > StatFailure`，与各个 stat 调用的完成顺序无关。
    pub fn severity(&self) -> u8 {
        match self {
            NotRegularFile => 3,
            NotFound => 2,
            StatFailure => 1,
            _ => 0,
        }
    }

    /// 在两个异常中选出优先级更高的一个；优先级相同时保留先到的 `self`。
    pub fn worst(self, other: Exception) -> Exception {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest => write!(f, "Malformed request line"),
            BadMethod => write!(f, "Only GET is allowed (400)"),
            MixedFileTypes => write!(f, "Bundled files must all be .js or all be .css (400)"),
            NotFound => write!(f, "File not found (404)"),
            NotRegularFile => write!(f, "Target is not a regular file (403)"),
            StatFailure => write!(f, "Failed to stat file (500)"),
        }
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(BadMethod.status_code(), 400);
        assert_eq!(MixedFileTypes.status_code(), 400);
        assert_eq!(RequestIsNotUtf8.status_code(), 400);
        assert_eq!(NotRegularFile.status_code(), 403);
        assert_eq!(NotFound.status_code(), 404);
        assert_eq!(StatFailure.status_code(), 500);
    }

    #[test]
    fn test_fixed_bodies() {
        assert_eq!(BadMethod.body(), "400 Bad Request");
        assert_eq!(MalformedRequest.body(), "400 Bad Request");
        assert_eq!(NotRegularFile.body(), "403 Forbidden");
        assert_eq!(NotFound.body(), "404 Not Found");
        assert_eq!(StatFailure.body(), "500 Internal Server Error");
    }

    #[test]
    fn test_worst_is_order_independent() {
        let all = [StatFailure, NotFound, NotRegularFile];
        for a in all {
            for b in all {
                assert_eq!(a.worst(b), b.worst(a));
            }
        }
        assert_eq!(StatFailure.worst(NotFound), NotFound);
        assert_eq!(NotFound.worst(NotRegularFile), NotRegularFile);
        assert_eq!(NotRegularFile.worst(StatFailure), NotRegularFile);
    }
}
