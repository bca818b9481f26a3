//! 集成测试公共设施：在临时目录上启动真实服务器，并提供一个极简的原始 HTTP 客户端。

#![allow(dead_code)]

use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc, time::Duration};

use bundle_server::{server, Config};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::oneshot,
};

pub const WELCOME: &str = "Test Welcome Page!";

/// 读写操作的硬超时，防止测试因服务器挂起而永久阻塞
const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    pub assets: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// 以 `files` 中的（相对路径，内容）初始化资源目录并启动服务器
    pub async fn start(files: &[(&str, &[u8])]) -> Self {
        Self::start_with(files, |c| c).await
    }

    pub async fn start_with<F>(files: &[(&str, &[u8])], customize: F) -> Self
    where
        F: FnOnce(Config) -> Config,
    {
        let assets = tempfile::tempdir().unwrap();
        for (path, content) in files {
            write_asset(assets.path(), path, content);
        }
        let config = customize(
            Config::new()
                .with_assets(assets.path())
                .with_welcome(WELCOME)
                .with_max_age(3600),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server::run(listener, Arc::new(config), async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            assets,
            shutdown: Some(tx),
        }
    }

    pub fn write(&self, path: &str, content: &[u8]) {
        write_asset(self.assets.path(), path, content);
    }

    pub fn mkdir(&self, path: &str) {
        fs::create_dir_all(self.assets.path().join(path)).unwrap();
    }

    /// 发送一个 GET 请求，`headers` 为额外的请求头
    pub async fn get(&self, path: &str, headers: &[(&str, &str)]) -> RawResponse {
        self.request("GET", path, headers).await
    }

    pub async fn request(&self, method: &str, path: &str, headers: &[(&str, &str)]) -> RawResponse {
        let mut raw = format!("{} {} HTTP/1.1\r\nHost: {}\r\n", method, path, self.addr);
        for (name, value) in headers {
            raw.push_str(&format!("{}: {}\r\n", name, value));
        }
        raw.push_str("\r\n");
        self.send_raw(raw.as_bytes()).await
    }

    pub async fn send_raw(&self, raw: &[u8]) -> RawResponse {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(raw).await.unwrap();

        let mut buffer = Vec::new();
        tokio::time::timeout(IO_TIMEOUT, stream.read_to_end(&mut buffer))
            .await
            .expect("server did not close the connection in time")
            .unwrap();
        RawResponse::parse(&buffer)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn write_asset(root: &Path, path: &str, content: &[u8]) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    /// 头部名称统一为小写
    pub headers: HashMap<String, String>,
    /// 已去除分块传输帧的响应体（未解压）
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn parse(raw: &[u8]) -> Self {
        let head_end = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response has no header terminator");
        let head = std::str::from_utf8(&raw[..head_end]).unwrap();
        let mut lines = head.split("\r\n");
        let status = lines
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let headers = lines
            .filter_map(|l| l.split_once(": "))
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect::<HashMap<_, _>>();

        let rest = &raw[head_end + 4..];
        let body = if headers.get("transfer-encoding").map(String::as_str) == Some("chunked") {
            decode_chunked(rest)
        } else {
            rest.to_vec()
        };
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn decode_chunked(mut data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let line_end = data
            .windows(2)
            .position(|w| w == b"\r\n")
            .expect("truncated chunk size line");
        let size_line = std::str::from_utf8(&data[..line_end]).unwrap();
        let size = usize::from_str_radix(size_line.trim(), 16).unwrap();
        data = &data[line_end + 2..];
        if size == 0 {
            return out;
        }
        out.extend_from_slice(&data[..size]);
        data = &data[size + 2..];
    }
}

pub fn gunzip(data: &[u8]) -> Vec<u8> {
    use std::io::Read;
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(data)
        .read_to_end(&mut out)
        .unwrap();
    out
}
