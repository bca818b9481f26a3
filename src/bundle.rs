//! # 多文件合并
//!
//! 按请求顺序依次打开文件，把它们的内容拼接成一条字节流。下一个文件只在上一个文件读到 EOF
//! 之后才打开；每块数据都要等写出完成才继续读，从而对慢客户端形成背压。
//! 单文件请求走同一条路径（N = 1）。

use std::{collections::VecDeque, io, path::PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use log::debug;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWrite},
};

use crate::{
    compress::BodyEncoder,
    fingerprint::{AggregateDescriptor, Fingerprint},
    lookup::FileDescriptor,
    response::ChunkedWriter,
};

/// 计算一组文件的指纹：单文件直接计算，多文件先归约为聚合描述
pub fn fingerprint_of(files: &[FileDescriptor]) -> Option<Fingerprint> {
    match files {
        [] => None,
        [single] => Some(Fingerprint::of_file(single)),
        many => AggregateDescriptor::from_files(many).map(|agg| Fingerprint::of_aggregate(&agg)),
    }
}

/// 顺序拼接多个文件的拉取式读取器
pub struct ConcatReader {
    pending: VecDeque<PathBuf>,
    current: Option<File>,
    chunk_size: usize,
    // 每次读取后整块切走，已发送的块释放后空间可被复用
    buffer: BytesMut,
}

impl ConcatReader {
    pub fn new<I: IntoIterator<Item = PathBuf>>(paths: I, chunk_size: usize) -> Self {
        Self {
            pending: paths.into_iter().collect(),
            current: None,
            chunk_size: chunk_size.max(1),
            buffer: BytesMut::new(),
        }
    }

    pub fn from_files(files: &[FileDescriptor], chunk_size: usize) -> Self {
        Self::new(files.iter().map(|f| f.path().to_path_buf()), chunk_size)
    }

    /// 读取下一块数据；全部文件读完后返回 `None`。空文件会被直接跳过。
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if self.current.is_none() {
                let Some(path) = self.pending.pop_front() else {
                    return Ok(None);
                };
                debug!("打开文件：{}", path.display());
                self.current = Some(File::open(&path).await?);
            }

            let Some(file) = self.current.as_mut() else {
                continue;
            };
            self.buffer.reserve(self.chunk_size);
            let n = file
                .read_buf(&mut (&mut self.buffer).limit(self.chunk_size))
                .await?;
            if n == 0 {
                self.current = None;
                continue;
            }
            return Ok(Some(self.buffer.split().freeze()));
        }
    }

    /// 把全部内容编码后写入分块写出器，返回读取的原始字节数。
    ///
    /// 中途的读取或写入失败直接返回错误，此时不会写出结束块。
    pub async fn pipe_to<W: AsyncWrite + Unpin>(
        mut self,
        mut encoder: BodyEncoder,
        writer: &mut ChunkedWriter<W>,
    ) -> io::Result<u64> {
        let mut total = 0u64;
        while let Some(chunk) = self.next_chunk().await? {
            total += chunk.len() as u64;
            let encoded = encoder.encode(&chunk)?;
            writer.write_chunk(&encoded).await?;
        }
        let tail = encoder.finish()?;
        writer.write_chunk(&tail).await?;
        writer.finish().await?;
        Ok(total)
    }
}
