use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use cpm80::{Args, build_emu_run_blocking};
use tracing::{Level, info};
use tracing_subscriber::{self, EnvFilter};

fn main() -> ExitCode {
    // 初始化日志，客户程序的控制台输出占用标准输出
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false) // 不显示目标模块
        .with_file(true) // 显示文件名
        .with_line_number(true) // 显示行号
        .init();

    // 解析命令行参数
    let args = Args::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "启动8080模拟器");
    info!(program = %args.program.display(), bdos = args.bdos, "加载参数");

    match build_emu_run_blocking(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "模拟器异常终止:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
