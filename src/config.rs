use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_welcome")]
    welcome: String,
    #[serde(default = "default_assets")]
    assets: String,
    #[serde(default = "default_max_age")]
    max_age: u64,
    #[serde(default = "default_gzip_types")]
    gzip_types: Vec<String>,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_welcome() -> String {
    "Welcome to the static server!".to_string()
}

fn default_assets() -> String {
    "./assets/".to_string()
}

fn default_max_age() -> u64 {
    60 * 60 * 24 * 30 // 30天
}

fn default_gzip_types() -> Vec<String> {
    ["js", "css", "html", "htm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_chunk_size() -> usize {
    65536 // 64KB
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            welcome: default_welcome(),
            assets: default_assets(),
            max_age: default_max_age(),
            gzip_types: default_gzip_types(),
            worker_threads: 0,
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 文件读取配置。
    ///
    /// 文件不存在或无法读取时返回错误；内容无法解析时记录错误并退回默认配置。
    pub fn from_toml<P: AsRef<Path>>(filename: P) -> io::Result<Self> {
        let mut file = File::open(filename.as_ref())?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)?;

        match Self::from_toml_str(&str_val) {
            Ok(c) => Ok(c),
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Ok(Config::new().normalized())
            }
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<Config>(s).map(Config::normalized)
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.chunk_size == 0 {
            warn!("chunk_size被设置为0，将使用默认值{}。", default_chunk_size());
            self.chunk_size = default_chunk_size();
        }
        for ext in self.gzip_types.iter_mut() {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }
        self
    }
}

// 测试与嵌入场景下使用的构造方法
impl Config {
    pub fn with_assets<P: Into<PathBuf>>(mut self, assets: P) -> Self {
        self.assets = assets.into().to_string_lossy().into_owned();
        self
    }

    pub fn with_welcome(mut self, welcome: &str) -> Self {
        self.welcome = welcome.to_string();
        self
    }

    pub fn with_max_age(mut self, max_age: u64) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }
}

impl Config {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn welcome(&self) -> &str {
        &self.welcome
    }

    pub fn assets(&self) -> &Path {
        Path::new(&self.assets)
    }

    pub fn max_age(&self) -> u64 {
        self.max_age
    }

    pub fn gzip_types(&self) -> &[String] {
        &self.gzip_types
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
