//! Intel 8080 模拟器库，附带 CP/M BDOS 文件桥接

pub mod const_values;
pub mod emulator;
pub mod system;
pub mod utils;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use console_port::ConsolePort;
use tracing::{info, warn};

use crate::const_values::EmuConfig;
use crate::emulator::tracer::TracerArgs;
use crate::emulator::{Emulator, ExecState};
use crate::utils::loader::ProgramFormat;

/// Intel 8080 模拟器
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// 程序文件 (Intel HEX、原始二进制或 CP/M .COM)
    pub program: PathBuf,

    /// 按原始二进制加载 (装载到 0000h)
    #[arg(short = 'b', long, conflicts_with = "hex")]
    pub binary: bool,

    /// 按 Intel HEX 加载
    #[arg(short = 'x', long)]
    pub hex: bool,

    /// 启用 CP/M BDOS 模拟
    #[arg(long)]
    pub bdos: bool,

    /// 配置文件地址
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 最多执行的指令条数
    #[arg(long)]
    pub max_steps: Option<u64>,

    /// 追踪器参数
    #[command(flatten)]
    pub tracer: TracerArgs,
}

impl Args {
    /// 命令行指定的格式，未指定时返回 None 交给扩展名判断
    pub fn format(&self) -> Option<ProgramFormat> {
        if self.binary {
            Some(ProgramFormat::Binary)
        } else if self.hex {
            Some(ProgramFormat::Hex)
        } else {
            None
        }
    }
}

/// 运行直到停机或达到指令上限，返回是否已停机
pub fn run(emu: &mut Emulator, max_steps: Option<u64>) -> Result<bool> {
    match max_steps {
        Some(limit) => {
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            emu.steps(limit)?;
        }
        None => {
            while emu.get_exec_state() != ExecState::End {
                emu.steps(usize::MAX)?;
            }
        }
    }
    Ok(emu.get_exec_state() == ExecState::End)
}

pub fn build_emu_run_blocking(args: Args) -> Result<()> {
    let config = Rc::new(EmuConfig::load(args.config.as_deref())?);

    // 创建模拟器
    let mut emu = Emulator::new(config);
    if args.bdos {
        emu.set_bdos_enabled(true);
    }
    emu.attach_device(Arc::new(Mutex::new(ConsolePort::stdio("console".to_string()))))?;
    emu.add_tracers(&args.tracer)?;
    emu.load_file(&args.program, args.format())?;

    let halted = run(&mut emu, args.max_steps);
    emu.flush()?;
    if !halted? {
        warn!(max_steps = ?args.max_steps, "达到指令上限，模拟机未停机");
    }

    let state = emu.get_state_ref();
    info!(
        pc = format_args!("{:#06x}", state.pc),
        cycles = state.cycles,
        event = ?emu.get_cur_event(),
        "模拟结束"
    );
    Ok(())
}
