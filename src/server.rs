// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接处理
//!
//! 每个 TCP 连接由独立的 Tokio 任务处理一个请求：
//! 读取报文头 → 分类 → 并发 stat → 缓存校验 → 304 或流式写出（可选 gzip）。
//! 请求之间不共享任何可变状态，`Config` 以只读 `Arc` 形式共享。

use std::{future::Future, sync::Arc, time::Instant};

use log::{debug, error, info};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};

use crate::{
    bundle::{fingerprint_of, ConcatReader},
    cache::CacheDecision,
    classify::{classify, Target},
    compress::{negotiate, BodyEncoder},
    config::Config,
    exception::Exception,
    fingerprint::Fingerprint,
    lookup::{stat_all, FileDescriptor},
    param::{mime_for, HttpVersion, DEFAULT_MIME},
    request::Request,
    response::{ChunkedWriter, Response},
};

/// 请求报文头的最大长度
const MAX_HEAD_SIZE: usize = 8192;

/// 一次请求的处理结论，由响应阶段立即消费
#[derive(Debug)]
pub enum RequestOutcome {
    Welcome,
    NotModified(Fingerprint),
    Serve {
        fingerprint: Fingerprint,
        files: Vec<FileDescriptor>,
        mime: &'static str,
        gzip: bool,
    },
    Rejected(Exception),
}

impl RequestOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            RequestOutcome::Welcome | RequestOutcome::Serve { .. } => 200,
            RequestOutcome::NotModified(_) => 304,
            RequestOutcome::Rejected(e) => e.status_code(),
        }
    }
}

/// 解析请求、查询文件并做出缓存决策，不涉及任何网络写出
pub async fn resolve(request: &Request, config: &Config, id: u128) -> RequestOutcome {
    match try_resolve(request, config, id).await {
        Ok(outcome) => outcome,
        Err(e) => RequestOutcome::Rejected(e),
    }
}

async fn try_resolve(request: &Request, config: &Config, id: u128) -> Result<RequestOutcome, Exception> {
    let target = classify(request.method(), request.target(), id)?;
    if target == Target::Welcome {
        return Ok(RequestOutcome::Welcome);
    }

    let files = stat_all(config.assets(), target.segments(), id).await?;
    let fingerprint = fingerprint_of(&files).ok_or(Exception::NotFound)?;
    debug!(
        "[ID{}]Last-Modified: {}, ETag: {}",
        id,
        fingerprint.last_modified(),
        fingerprint.etag()
    );

    let decision = CacheDecision::decide(
        &fingerprint,
        request.if_modified_since(),
        request.if_none_match(),
    );
    if decision == CacheDecision::NotModified {
        debug!("[ID{}]校验器命中，返回304", id);
        return Ok(RequestOutcome::NotModified(fingerprint));
    }

    let extension = target.extension();
    let mime = extension.map_or(DEFAULT_MIME, mime_for);
    let gzip = negotiate(request.accept_encoding(), extension, config.gzip_types());
    Ok(RequestOutcome::Serve {
        fingerprint,
        files,
        mime,
        gzip,
    })
}

/// 读取请求报文头，直到空行为止。对端未发送任何数据就关闭时返回 `Ok(None)`。
async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Option<Vec<u8>>, Exception> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(n) => n,
            Err(_) => return Err(Exception::MalformedRequest),
        };
        if n == 0 {
            return if buffer.is_empty() {
                Ok(None)
            } else {
                Err(Exception::MalformedRequest)
            };
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_head_end(&buffer) {
            buffer.truncate(end);
            return Ok(Some(buffer));
        }
        if buffer.len() > MAX_HEAD_SIZE {
            return Err(Exception::MalformedRequest);
        }
    }
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// # 连接处理器
///
/// 负责单个连接的生命周期，包括读取解析请求、执行解析管线、以及发送响应。
pub async fn handle_connection<S>(mut stream: S, id: u128, config: Arc<Config>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let start_time = Instant::now();

    let head = match read_head(&mut stream).await {
        Ok(Some(head)) => head,
        Ok(None) => return, // 客户端主动关闭连接
        Err(e) => {
            error!("[ID{}]读取HTTP请求失败: {}", id, e);
            let _ = write_response(&mut stream, &Response::from_exception(e)).await;
            let _ = stream.shutdown().await;
            info!("{}", access_line(id, "-", "-", "-", e.status_code(), start_time, "-"));
            return;
        }
    };
    debug!("[ID{}]HTTP请求接收完毕", id);

    let request = match Request::try_from(&head, id) {
        Ok(req) => req,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {}", id, e);
            let _ = write_response(&mut stream, &Response::from_exception(e)).await;
            let _ = stream.shutdown().await;
            info!("{}", access_line(id, "-", "-", "-", e.status_code(), start_time, "-"));
            return;
        }
    };

    let outcome = resolve(&request, &config, id).await;
    let status = outcome.status_code();

    let result = match outcome {
        RequestOutcome::Welcome => write_response(&mut stream, &Response::welcome(config.welcome())).await,
        RequestOutcome::NotModified(fingerprint) => {
            write_response(&mut stream, &Response::not_modified(&fingerprint, config.max_age())).await
        }
        RequestOutcome::Rejected(e) => {
            if e.status_code() == 500 {
                error!("[ID{}]处理请求时发生错误: {}", id, e);
            }
            write_response(&mut stream, &Response::from_exception(e)).await
        }
        RequestOutcome::Serve {
            fingerprint,
            files,
            mime,
            gzip,
        } => {
            let chunked = request.version() == HttpVersion::V1_1;
            let response = Response::streaming(&fingerprint, config.max_age(), mime, gzip, chunked);
            match stream.write_all(&response.as_bytes()).await {
                Ok(()) => {
                    let mut writer = if chunked {
                        ChunkedWriter::new(&mut stream)
                    } else {
                        ChunkedWriter::raw(&mut stream)
                    };
                    ConcatReader::from_files(&files, config.chunk_size())
                        .pipe_to(BodyEncoder::new(gzip), &mut writer)
                        .await
                        .map(|total| debug!("[ID{}]流式传输完成，共读取 {} 字节", id, total))
                }
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        // 响应头已经发出，只能中断连接，由客户端重新请求
        error!("[ID{}]发送响应失败，连接已中断: {}", id, e);
    }
    let _ = stream.shutdown().await;

    info!(
        "{}",
        access_line(
            id,
            request.method_token(),
            request.target(),
            request.version(),
            status,
            start_time,
            request.user_agent(),
        )
    );
}

/// 访问日志行。请求无法解析时各字段以 `-` 占位。
fn access_line(
    id: u128,
    method: &str,
    target: &str,
    version: impl std::fmt::Display,
    status: u16,
    start_time: Instant,
    user_agent: &str,
) -> String {
    format!(
        "[ID{}] {} {} {} {}, {}ms, {}",
        id,
        method,
        target,
        version,
        status,
        start_time.elapsed().as_millis(),
        user_agent,
    )
}

async fn write_response<S: AsyncWrite + Unpin>(stream: &mut S, response: &Response) -> std::io::Result<()> {
    stream.write_all(&response.as_bytes()).await?;
    stream.flush().await
}

/// # 主事件循环 (Accept Loop)
///
/// 持续接收新连接并分发至 Tokio 线程池，直到 `shutdown` 完成。
pub async fn run<F>(listener: TcpListener, config: Arc<Config>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut id: u128 = 0;
    tokio::pin!(shutdown);

    loop {
        let (stream, addr) = tokio::select! {
            _ = &mut shutdown => {
                info!("主循环接收到停机信号，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!("接受连接失败: {}", e);
                    continue;
                }
            },
        };

        debug!("[ID{}]新的连接：{}", id, addr);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            handle_connection(stream, id, config).await;
        });
        id += 1; // 增加请求唯一标识序列
    }
}
