//! # HTTP 响应构建
//!
//! `Response` 负责状态行与响应头（以及小型固定响应体）；文件内容由 `ChunkedWriter`
//! 以分块传输编码流式写出。

use crate::{
    exception::Exception,
    fingerprint::Fingerprint,
    param::*,
    util::format_http_date,
};

use bytes::Bytes;
use chrono::{prelude::*, Duration};
use log::error;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    date: DateTime<Utc>,
    server_name: String,
    headers: Vec<(&'static str, String)>,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            headers: Vec::new(),
            content: None,
        }
    }

    /// 固定的纯文本错误响应
    pub fn from_exception(exception: Exception) -> Self {
        let mut response = Self::new();
        response
            .set_code(exception.status_code())
            .set_text("text/plain", exception.body().to_string());
        response
    }

    /// 站点根路径的欢迎文本，不带缓存头
    pub fn welcome(text: &str) -> Self {
        let mut response = Self::new();
        response.set_text("text/plain;charset=utf-8", text.to_string());
        response
    }

    /// 304 响应：与 200 相同的缓存头，无响应体
    pub fn not_modified(fingerprint: &Fingerprint, max_age: u64) -> Self {
        let mut response = Self::new();
        response.set_code(304).set_cache_headers(fingerprint, max_age);
        response
    }

    /// 200 流式响应的头部；响应体随后由 `ChunkedWriter` 写出。
    ///
    /// `chunked` 为 false 时（HTTP/1.0 客户端）不声明长度，以关闭连接表示结束。
    pub fn streaming(
        fingerprint: &Fingerprint,
        max_age: u64,
        mime: &str,
        gzip: bool,
        chunked: bool,
    ) -> Self {
        let mut response = Self::new();
        response.set_cache_headers(fingerprint, max_age);
        response.headers.push(("Content-Type", mime.to_string()));
        if gzip {
            response.headers.push(("Content-Encoding", "gzip".to_string()));
        }
        if chunked {
            response.headers.push(("Transfer-Encoding", "chunked".to_string()));
        }
        response
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    fn set_text(&mut self, content_type: &str, body: String) -> &mut Self {
        self.headers.push(("Content-Type", content_type.to_string()));
        self.headers.push(("Content-Length", body.len().to_string()));
        self.content = Some(Bytes::from(body));
        self
    }

    /// Expires、Cache-Control、Last-Modified 与 ETag
    fn set_cache_headers(&mut self, fingerprint: &Fingerprint, max_age: u64) -> &mut Self {
        let lifetime = Duration::try_seconds(max_age.min(i64::MAX as u64) as i64)
            .unwrap_or_else(Duration::zero);
        let expires = self
            .date
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.headers
            .push(("Expires", format_http_date(expires)));
        self.headers
            .push(("Cache-Control", format!("max-age={}", max_age)));
        self.headers
            .push(("Last-Modified", fingerprint.last_modified().to_string()));
        self.headers.push(("ETag", fingerprint.etag().to_string()));
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        head.push_str(&format!("Date: {}{}", format_http_date(self.date), CRLF));
        head.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        head.push_str(&format!("Connection: close{}", CRLF));
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}{}", name, value, CRLF));
        }
        head.push_str(CRLF);

        let mut bytes = head.into_bytes();
        if let Some(content) = &self.content {
            bytes.extend_from_slice(content);
        }
        bytes
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// 以 `Transfer-Encoding: chunked` 格式写出响应体
pub struct ChunkedWriter<W> {
    inner: W,
    chunked: bool,
}

impl<W: AsyncWrite + Unpin> ChunkedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            chunked: true,
        }
    }

    /// 不加分块帧，直接透传（HTTP/1.0）
    pub fn raw(inner: W) -> Self {
        Self {
            inner,
            chunked: false,
        }
    }

    /// 写出一块。空块会被跳过，因为长度为 0 的块表示响应结束。
    pub async fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.chunked {
            self.inner
                .write_all(format!("{:X}{}", data.len(), CRLF).as_bytes())
                .await?;
            self.inner.write_all(data).await?;
            self.inner.write_all(CRLF.as_bytes()).await
        } else {
            self.inner.write_all(data).await
        }
    }

    pub async fn finish(&mut self) -> io::Result<()> {
        if self.chunked {
            self.inner.write_all(b"0\r\n\r\n").await?;
        }
        self.inner.flush().await
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
