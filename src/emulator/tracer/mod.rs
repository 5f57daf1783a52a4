//! 指令追踪
//!
//! 每条指令执行前调用 `trace`，执行后调用 `retire`

mod file_tracer;
mod itracer;

pub use file_tracer::FileTracer;
pub use itracer::ITracer;

use std::io;
use std::path::PathBuf;

use clap::Args;

use super::State;

#[derive(Args, Debug, Clone, Default)]
pub struct TracerArgs {
    /// 把每条指令及其执行后的寄存器写入追踪文件
    #[arg(short = 't', long = "trace", value_name = "FILE")]
    pub trace_file: Option<PathBuf>,
}

pub trait TracerTrace {
    /// 追踪器名称
    fn name(&self) -> &'static str;

    /// 指令执行前，pc 为操作码地址
    fn trace(&mut self, state: &State, pc: u16) -> io::Result<()>;

    /// 指令执行后
    fn retire(&mut self, _state: &State) -> io::Result<()> {
        Ok(())
    }

    /// 已追踪指令的文本记录
    fn get_instructions_log(&mut self) -> String {
        String::new()
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 统一的追踪器入口
#[derive(Default)]
pub struct Tracer {
    tracers: Vec<Box<dyn TracerTrace>>,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tracer: Box<dyn TracerTrace>) {
        tracing::debug!("启用追踪器 {}", tracer.name());
        self.tracers.push(tracer);
    }

    /// 按命令行参数添加追踪器
    pub fn add_tracers(&mut self, args: &TracerArgs) -> io::Result<()> {
        if let Some(path) = &args.trace_file {
            self.add(Box::new(FileTracer::create(path)?));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.tracers.is_empty()
    }

    pub fn trace(&mut self, state: &State, pc: u16) -> io::Result<()> {
        for tracer in &mut self.tracers {
            tracer.trace(state, pc)?;
        }
        Ok(())
    }

    pub fn retire(&mut self, state: &State) -> io::Result<()> {
        for tracer in &mut self.tracers {
            tracer.retire(state)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        for tracer in &mut self.tracers {
            tracer.flush()?;
        }
        Ok(())
    }

    pub fn print_log(&mut self) -> String {
        let mut log = String::new();
        for tracer in &mut self.tracers {
            let body = tracer.get_instructions_log();
            if body.is_empty() {
                continue;
            }
            log += &format!("Tracer: {}\n", tracer.name());
            log += &body;
        }
        log
    }
}
