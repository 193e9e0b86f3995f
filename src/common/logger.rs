use colored::*;

use crate::common::format::{format_file_size, format_speed};
use crate::downloader::task::{TaskSnapshot, TaskStatus};

/// 命令行里的彩色输出
pub struct PrettyLogger;

impl PrettyLogger {
    /// 显示成功消息
    pub fn success(message: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), message.as_ref());
    }

    /// 显示信息消息
    pub fn info(message: impl AsRef<str>) {
        println!("{} {}", "ℹ".blue().bold(), message.as_ref());
    }

    /// 显示警告消息
    pub fn warning(message: impl AsRef<str>) {
        println!("{} {}", "⚠".yellow().bold(), message.as_ref());
    }

    /// 显示错误消息
    pub fn error(message: impl AsRef<str>) {
        println!("{} {}", "✗".red().bold(), message.as_ref());
    }

    /// 显示分割线
    pub fn separator() {
        println!("{}", "─".repeat(50).bright_black());
    }

    /// 显示标题
    pub fn title(text: impl AsRef<str>) {
        let text = text.as_ref();
        let width = text.chars().count().min(48);
        let padding = (48 - width) / 2;
        println!(
            "{} {} {}",
            "─".repeat(padding).bright_black(),
            text.bold(),
            "─".repeat(48 - padding - width).bright_black()
        );
    }

    /// 显示连接状态
    pub fn connection(connected: bool, details: impl AsRef<str>) {
        if connected {
            println!("{} {} - {}", "🔗".green().bold(), "已连接".green().bold(), details.as_ref());
        } else {
            println!("{} {} - {}", "⛔".red().bold(), "未连接".red().bold(), details.as_ref());
        }
    }

    /// 显示单个任务的一行摘要
    pub fn task_line(task: &TaskSnapshot) {
        println!("{}", Self::describe_task(task));
    }

    pub fn describe_task(task: &TaskSnapshot) -> String {
        let status = match task.status {
            TaskStatus::Active => task.status.as_str().cyan(),
            TaskStatus::Complete => task.status.as_str().green(),
            TaskStatus::Error => task.status.as_str().red(),
            TaskStatus::Paused => task.status.as_str().yellow(),
            _ => task.status.as_str().bright_black(),
        };
        let mut line = format!(
            "⬇ {} [{}] {:>3}% {}/{} {}",
            task.display_name().bold(),
            status,
            task.progress_percent,
            format_file_size(task.completed_bytes),
            format_file_size(task.total_bytes),
            format_speed(task.transfer_rate).bright_black(),
        );
        if let Some(err) = &task.last_error {
            line.push_str(&format!(" {}", err.red()));
        }
        line
    }
}

/// 便捷宏用于漂亮的日志输出
#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::success(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::warning(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::error(format!($($arg)*))
    };
}
