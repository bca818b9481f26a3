// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、目标、版本）。
//! 2. 与缓存校验和内容协商相关的标头提取。
//!
//! 这里不判断方法是否被允许：任意方法都能解析成功，由分类阶段统一返回 400。

use crate::{exception::Exception, param::*};
use log::error;

/// 表示一个 HTTP 请求的元数据。服务器只处理 GET，因此不读取请求体。
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 请求行中原样出现的方法名，用于日志
    method_token: String,
    /// 请求目标（包含查询字符串）
    target: String,
    version: HttpVersion,
    user_agent: String,
    /// `Accept-Encoding` 原始值，由压缩协商模块按 token 解析
    accept_encoding: Option<String>,
    if_modified_since: Option<String>,
    if_none_match: Option<String>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的报文头部（到空行为止）。
    /// * `id` - 请求 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = request_string.split(CRLF);

        // 请求行，例如 "GET /index.html HTTP/1.1"
        let request_line = lines.next().unwrap_or_default();
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }

        let method = HttpRequestMethod::parse(parts[0]);
        let version = match parts[2].to_ascii_uppercase().as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            other => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, other);
                return Err(Exception::MalformedRequest);
            }
        };

        let mut request = Self {
            method,
            method_token: parts[0].to_string(),
            target: parts[1].to_string(),
            version,
            user_agent: String::new(),
            accept_encoding: None,
            if_modified_since: None,
            if_none_match: None,
        };

        for line in lines {
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "user-agent" => request.user_agent = value,
                "accept-encoding" => request.accept_encoding = Some(value),
                "if-modified-since" => request.if_modified_since = Some(value),
                "if-none-match" => request.if_none_match = Some(value),
                _ => {}
            }
        }

        Ok(request)
    }
}

impl Request {
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn method_token(&self) -> &str {
        &self.method_token
    }

    /// 请求目标（含查询参数）
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept_encoding(&self) -> Option<&str> {
        self.accept_encoding.as_deref()
    }

    pub fn if_modified_since(&self) -> Option<&str> {
        self.if_modified_since.as_deref()
    }

    pub fn if_none_match(&self) -> Option<&str> {
        self.if_none_match.as_deref()
    }
}
