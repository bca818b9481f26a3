// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态资源服务器
//!
//! 基于 Tokio 运行时的多线程静态资源服务器。核心功能包括：
//! - 基于文件元数据的强校验器（ETag / Last-Modified）与条件 GET
//! - 按客户端能力与文件类型进行流式 gzip 压缩
//! - `/a.js,/b.js` 形式的同类型多文件合并
//!
//! 用法：`bundle-server [配置文件路径]`，默认读取 `config/development.toml`。

use std::{process, sync::Arc};

use bundle_server::{server, Config};
use log::{error, info, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};
use tokio::{net::TcpListener, runtime::Builder};

const DEFAULT_CONFIG: &str = "config/development.toml";
const LOG_CONFIG: &str = "config/log4rs.yaml";

/// 初始化日志系统：优先读取 YAML 配置，缺失时退回到控制台输出
fn init_logger() {
    if log4rs::init_file(LOG_CONFIG, Default::default()).is_ok() {
        return;
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}",
        )))
        .build();
    let config = log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match config {
        Ok(c) => {
            if let Err(e) = log4rs::init_config(c) {
                eprintln!("无法初始化日志系统：{}", e);
            }
        }
        Err(e) => eprintln!("无法构建日志配置：{}", e),
    }
    info!("未找到{}，使用默认控制台日志", LOG_CONFIG);
}

fn main() {
    init_logger();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match Config::from_toml(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("无法读取配置文件{}：{}", config_path, e);
            process::exit(1);
        }
    };
    info!("配置文件{}已载入", config_path);
    info!("资源根目录：{}", config.assets().display());

    // 根据配置文件分配工作线程数，各线程之间不共享可变状态
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };

    runtime.block_on(async move {
        let listener = match TcpListener::bind((config.host(), config.port())).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定{}:{}，错误：{}", config.host(), config.port(), e);
                process::exit(1);
            }
        };
        info!(
            "Static server is running at http://{}:{}",
            config.host(),
            config.port()
        );

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("无法监听停机信号：{}", e);
                std::future::pending::<()>().await;
            }
        };
        server::run(listener, Arc::new(config), shutdown).await;
    });
}
