//! 模拟器核心模块

mod device_manager;
mod exception;
pub(crate) mod instructions;
mod memory;
pub mod state;
pub mod tracer;

use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use port_trait::PortDevice;
use tracing::{debug, error, info, warn};

use crate::const_values::{BDOS_ENTRY_ADDR, EmuConfig, TPA_TOP_PTR_ADDR, WARM_BOOT_ADDR};
use crate::system::{BdosCall, BdosOutcome, BdosSession, DiskOp, System};
use crate::utils::disasm::disasm_instruction;
use crate::utils::loader::{ProgramFormat, ProgramImage};
use crate::utils::ringbuf::RingBuffer;

pub use device_manager::{OPEN_BUS, PortBus, PortBusError};
pub use exception::Exception;
use instructions::InstDecoder;
pub use memory::{GuestMemory, Memory, MemoryError};
pub use state::State;
pub use state::{Event, ExecState};
use tracer::{ITracer, Tracer, TracerArgs, TracerTrace};

/// 8080 的 JMP 和 RET 操作码
const OP_JMP: u8 = 0xC3;
const OP_RET: u8 = 0xC9;

/// 模拟器结构体
pub struct Emulator {
    /// CPU状态（包含内存）
    state: State,
    exec_state: ExecState,
    event: Event,
    /// 本条指令产生的异常，指令执行完后统一处理
    exception: Option<Exception>,
    event_list: RingBuffer<Event>,
    decoder: &'static InstDecoder,
    system: System,
    ports: PortBus,
    tracer: Tracer,
    config: Rc<EmuConfig>,
}

impl Emulator {
    /// 创建新的模拟器实例
    pub fn new(config: Rc<EmuConfig>) -> Self {
        let mut tracer = Tracer::new();
        if config.debug.instruction_trace_size > 0 {
            tracer.add(Box::new(ITracer::new(config.debug.instruction_trace_size)));
        }
        let mut state = State::new();
        state.pc = config.memory.start_pc.unwrap_or(0);

        Self {
            state,
            exec_state: ExecState::Idle,
            event: Event::None,
            exception: None,
            event_list: RingBuffer::new(config.debug.event_list_size),
            decoder: InstDecoder::shared(),
            system: System::new(&config),
            ports: PortBus::new(),
            tracer,
            config,
        }
    }

    /// 挂载端口设备
    pub fn attach_device(&mut self, device: Arc<Mutex<dyn PortDevice>>) -> Result<()> {
        self.ports.attach(device).context("无法挂载端口设备")
    }

    /// 替换 BDOS 控制台输出
    pub fn set_console(&mut self, console: Box<dyn Write>) {
        self.system.set_console(console);
    }

    pub fn set_bdos_enabled(&mut self, enabled: bool) {
        if enabled != self.system.bdos_enabled() {
            info!("BDOS 模拟: {}", if enabled { "开启" } else { "关闭" });
        }
        self.system.set_bdos_enabled(enabled);
    }

    pub fn add_tracer(&mut self, tracer: Box<dyn TracerTrace>) {
        self.tracer.add(tracer);
    }

    pub fn add_tracers(&mut self, args: &TracerArgs) -> Result<()> {
        self.tracer
            .add_tracers(args)
            .with_context(|| format!("无法创建追踪文件 {:?}", args.trace_file))
    }

    /// 加载程序文件，未指定格式时按扩展名判断
    pub fn load_file(&mut self, path: &Path, format: Option<ProgramFormat>) -> Result<()> {
        let format = format.unwrap_or_else(|| ProgramFormat::detect(path));
        let image = ProgramImage::from_file(path, format)
            .with_context(|| format!("无法从 '{}' 加载程序", path.display()))?;
        info!(
            path = %path.display(),
            kind = %format,
            size = image.size(),
            start = format_args!("{:#06x}", image.start),
            "加载程序"
        );
        self.load_program(&image)
    }

    /// 把映像装入内存并设置起始 PC
    pub fn load_program(&mut self, image: &ProgramImage) -> Result<()> {
        for (addr, data) in &image.segments {
            self.state
                .memory
                .load(*addr, data)
                .with_context(|| format!("无法在 {:#06x} 处装载 {} 字节", addr, data.len()))?;
        }
        if image.format == ProgramFormat::Com {
            self.prepare_page_zero();
        }
        self.state.pc = self.config.memory.start_pc.unwrap_or(image.start);
        Ok(())
    }

    /// 为 .COM 程序准备零页: 热启动跳转、BDOS 入口和 TPA 顶部，
    /// 栈顶放一个返回 0 的地址，程序 RET 即热启动
    fn prepare_page_zero(&mut self) {
        let tpa_top = self.config.bdos.tpa_top;
        let memory = &mut self.state.memory;
        memory.write_block(WARM_BOOT_ADDR, &[OP_JMP, 0x00, 0x00]);
        memory.write_byte(BDOS_ENTRY_ADDR, OP_RET);
        memory.write_word(TPA_TOP_PTR_ADDR, tpa_top);
        self.state.sp = tpa_top;
        self.state.push(WARM_BOOT_ADDR);
        self.set_bdos_enabled(true);
    }

    /// 复位处理器，内存和打开的文件保持不变
    pub fn reset(&mut self) {
        self.state.reset();
        self.exec_state = ExecState::Idle;
        self.event = Event::None;
        self.exception = None;
    }

    #[inline(always)]
    pub(crate) fn halt(&mut self, event: Event) {
        self.state.halted = true;
        self.event = event;
    }

    /// CALL 0005h: 按 C 寄存器分派 BDOS 功能
    pub(crate) fn bdos_call(&mut self, pc: u16) {
        let call = BdosCall {
            function: self.state.c(),
            de: self.state.de,
            bc: self.state.bc,
            pc,
        };
        self.event = Event::Bdos(call.function);
        match self.system.handle_bdos(&call, &mut self.state.memory) {
            BdosOutcome::Completed(Some(a)) => self.state.a = a,
            BdosOutcome::Completed(None) => {}
            BdosOutcome::Fatal(fault) => self.exception = Some(Exception::Bdos(fault)),
        }
    }

    pub(crate) fn port_read(&mut self, port: u8) -> Result<u8> {
        Ok(self.ports.read(port)?)
    }

    pub(crate) fn port_write(&mut self, port: u8, value: u8) -> Result<()> {
        Ok(self.ports.write(port, value)?)
    }

    pub(crate) fn disk_transfer(&mut self, op: DiskOp) {
        match self.system.handle_disk(op, &mut self.state.memory) {
            Ok(request) => {
                debug!(?op, ?request, "磁盘传输完成");
                self.state.a = 0;
            }
            Err(e) => self.exception = Some(e.into()),
        }
    }

    #[inline(always)]
    fn step_internal(&mut self) -> Result<()> {
        let pc = self.state.pc;
        let opcode = self.state.memory.read_byte(pc);
        let decoder = self.decoder;
        let inst = decoder.decode(opcode);

        if !self.tracer.is_empty() {
            self.tracer
                .trace(&self.state, pc)
                .context("无法写入指令追踪")?;
        }

        self.state.pc = pc.wrapping_add(1);
        (inst.execute)(self, opcode, pc).with_context(|| {
            let (text, _) = disasm_instruction(&self.state.memory, pc);
            format!(
                "无法执行PC {:#06x} 处的指令 {:#04x} ({}), cpu状态:\n{}",
                pc, opcode, text, self.state
            )
        })?;
        self.state.cycles += inst.cycles as u64;

        if !self.tracer.is_empty() {
            self.tracer
                .retire(&self.state)
                .context("无法写入指令追踪")?;
        }

        if let Some(exception) = self.exception.take() {
            self.halt(Event::Halted);
            self.exec_state = ExecState::End;
            error!("{}", exception);
            error!("CPU状态:\n{}", self.state);
            let log = self.tracer.print_log();
            if !log.is_empty() {
                error!("最近执行的指令:\n{}", log);
            }
            if let Err(e) = self.tracer.flush() {
                warn!("无法刷新指令追踪: {e}");
            }
            return Err(anyhow::Error::new(exception)
                .context(format!("模拟机在 PC {:#06x} 处停机", pc)));
        }

        if self.state.halted {
            self.exec_state = ExecState::End;
        }
        Ok(())
    }

    fn record_event(&mut self) {
        if self.event != Event::None {
            self.event_list.push_overwrite(self.event);
        }
    }

    /// 执行单步指令
    #[inline(always)]
    pub fn step(&mut self) -> Result<()> {
        if self.exec_state == ExecState::End {
            return Ok(());
        }
        self.exec_state = ExecState::Running;
        self.event = Event::None;

        let result = self.step_internal();
        self.record_event();
        result?;

        if self.exec_state != ExecState::End {
            self.exec_state = ExecState::Idle;
        }
        Ok(())
    }

    /// 最多执行 n 条指令，停机时提前返回
    pub fn steps(&mut self, n: usize) -> Result<()> {
        if self.exec_state == ExecState::End {
            return Ok(());
        }
        self.exec_state = ExecState::Running;
        for _ in 0..n {
            self.event = Event::None;

            let result = self.step_internal();
            self.record_event();
            result?;

            if self.exec_state == ExecState::End {
                break;
            }
        }
        if self.exec_state != ExecState::End {
            self.exec_state = ExecState::Idle;
        }
        Ok(())
    }

    /// 获取处理器状态引用
    #[inline(always)]
    pub fn get_state_ref(&self) -> &State {
        &self.state
    }

    #[inline(always)]
    pub fn get_state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    #[inline(always)]
    pub fn get_exec_state(&self) -> ExecState {
        self.exec_state
    }

    pub fn get_cur_event(&self) -> Event {
        self.event
    }

    /// 取出并清空事件列表，按发生顺序排列
    pub fn get_events(&mut self) -> Vec<Event> {
        let events = self.event_list.iter().copied().collect();
        self.event_list.clear();
        events
    }

    pub fn bdos(&self) -> &BdosSession {
        self.system.bdos()
    }

    pub fn bdos_enabled(&self) -> bool {
        self.system.bdos_enabled()
    }

    /// 最近执行的指令记录
    pub fn instruction_log(&mut self) -> String {
        self.tracer.print_log()
    }

    /// 刷新追踪文件和磁盘映像
    pub fn flush(&mut self) -> Result<()> {
        self.tracer.flush().context("无法刷新指令追踪")?;
        self.system.flush().context("无法刷新磁盘映像")
    }
}
