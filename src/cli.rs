use std::path::PathBuf;

use clap::{Parser, Subcommand};

use aria2_orchestrator::common::config::{ConfigError, OrchestratorConfig};

/// aria2 下载任务编排器
#[derive(Parser, Debug)]
#[command(name = "ariactl")]
#[command(version = "0.1")]
#[command(author = "rpeng252@gmail.com")]
#[command(about = "通过 JSON-RPC 管理 aria2 / Motrix 下载任务", long_about = None)]
pub struct Cli {
    /// aria2 JSON-RPC 地址
    #[arg(long, value_name = "URL", global = true)]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub rpc_url: Option<String>,

    /// RPC 密钥 (--rpc-secret)
    #[arg(long, value_name = "SECRET", global = true)]
    pub secret: Option<String>,

    /// JSON 配置文件
    #[arg(long, value_name = "FILE", global = true)]
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// 轮询间隔（毫秒）
    #[arg(long, value_name = "MS", global = true)]
    pub interval_ms: Option<u64>,

    /// 单个 RPC 请求超时（秒）
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout_secs: Option<u64>,

    /// 输出调试日志
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 探测守护进程并显示版本
    Version,

    /// 添加下载任务
    Add {
        #[arg(value_name = "URL")]
        #[arg(value_hint = clap::ValueHint::Url)]
        url: String,

        /// 保存目录
        #[arg(long, value_name = "DIR")]
        #[arg(default_value = ".")]
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        /// 保存文件名
        #[arg(long, value_name = "NAME")]
        out: Option<String>,

        /// 添加后持续显示进度直到完成
        #[arg(long)]
        watch: bool,
    },

    /// 暂停任务
    Pause { gid: String },

    /// 继续任务
    Resume { gid: String },

    /// 删除任务
    Remove { gid: String },

    /// 列出守护进程中的活跃任务
    Active,

    /// 从资源列表文件批量添加任务
    Batch {
        #[arg(value_name = "FILE")]
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// 保存根目录，每个分类一个子目录
        #[arg(long, value_name = "DIR")]
        #[arg(default_value = ".")]
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        #[arg(long, value_name = "并发数", default_value_t = 5)]
        concurrency: usize,
    },

    /// 持续监控任务状态 (Ctrl-C 退出)
    Watch {
        /// 需要跟踪的任务 GID，不指定时跟踪当前所有活跃任务
        gids: Vec<String>,
    },
}

impl Cli {
    /// 合并配置文件与命令行参数，命令行优先
    pub fn load_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => OrchestratorConfig::from_json_file(path)?,
            None => OrchestratorConfig::default(),
        };

        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(secret) = &self.secret {
            config.secret = Some(secret.clone());
        }
        if let Some(ms) = self.interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }
}
