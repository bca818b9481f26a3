//! # 浏览器缓存校验
//!
//! 比较客户端携带的 `If-Modified-Since` / `If-None-Match` 与服务端计算出的指纹。
//! 纯函数，不涉及 I/O，也不在服务端保存任何缓存。

use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// 两个校验器均命中，返回 304
    NotModified,
    /// 返回完整响应体
    Serve,
}

impl CacheDecision {
    /// 只有时间串与 etag **同时**精确相等才判定为未修改；部分命中仍然返回响应体。
    pub fn decide(
        fingerprint: &Fingerprint,
        if_modified_since: Option<&str>,
        if_none_match: Option<&str>,
    ) -> Self {
        let date_matches = if_modified_since == Some(fingerprint.last_modified());
        let etag_matches = if_none_match == Some(fingerprint.etag());
        if date_matches && etag_matches {
            CacheDecision::NotModified
        } else {
            CacheDecision::Serve
        }
    }
}
