//! # 压缩协商与流式 gzip 编码
//!
//! 只有客户端的 `Accept-Encoding` 以完整 token 形式包含 `gzip`，且资源扩展名在
//! 配置的可压缩集合内时才压缩。编码按块进行，不需要预先读取整个文件。

use std::io::{self, Write};

use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};
use log::debug;

/// 判断 `Accept-Encoding` 是否接受 gzip。
///
/// 按 `,` 切分后逐个 token 比较（忽略大小写与 `;` 之后的参数），
/// 因此 `xgzip` 不会被误判；`gzip;q=0` 表示明确拒绝。
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    let Some(header) = accept_encoding else {
        return false;
    };
    header.split(',').any(|item| {
        let mut params = item.split(';');
        let token = params.next().unwrap_or_default().trim();
        if !token.eq_ignore_ascii_case("gzip") {
            return false;
        }
        !params.any(|p| {
            let p = p.trim();
            match p.split_once('=') {
                Some((k, v)) if k.trim().eq_ignore_ascii_case("q") => {
                    v.trim().parse::<f32>().map_or(false, |q| q <= 0.0)
                }
                _ => false,
            }
        })
    })
}

/// 扩展名是否在可压缩集合内（集合中的扩展名已规范化为小写、不带点）
pub fn is_compressible(extension: Option<&str>, gzip_types: &[String]) -> bool {
    match extension {
        Some(ext) => gzip_types.iter().any(|t| t.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// 最终决策：两个条件同时满足才压缩
pub fn negotiate(accept_encoding: Option<&str>, extension: Option<&str>, gzip_types: &[String]) -> bool {
    let client = accepts_gzip(accept_encoding);
    let resource = is_compressible(extension, gzip_types);
    debug!(
        "压缩协商：客户端支持gzip={}，资源可压缩={}",
        client, resource
    );
    client && resource
}

/// 响应体编码器。`Identity` 原样透传，`Gzip` 每输入一块就吐出当前可用的压缩数据。
pub enum BodyEncoder {
    Identity,
    Gzip(GzEncoder<Vec<u8>>),
}

impl BodyEncoder {
    pub fn new(compress: bool) -> Self {
        if compress {
            BodyEncoder::Gzip(GzEncoder::new(Vec::new(), Compression::default()))
        } else {
            BodyEncoder::Identity
        }
    }

    /// 编码一块数据。gzip 模式下可能返回空块（数据仍在压缩器内部缓冲）。
    pub fn encode(&mut self, chunk: &[u8]) -> io::Result<Bytes> {
        match self {
            BodyEncoder::Identity => Ok(Bytes::copy_from_slice(chunk)),
            BodyEncoder::Gzip(encoder) => {
                encoder.write_all(chunk)?;
                Ok(Bytes::from(std::mem::take(encoder.get_mut())))
            }
        }
    }

    /// 结束编码，返回剩余数据（gzip 尾部）
    pub fn finish(self) -> io::Result<Bytes> {
        match self {
            BodyEncoder::Identity => Ok(Bytes::new()),
            BodyEncoder::Gzip(encoder) => encoder.finish().map(Bytes::from),
        }
    }
}
