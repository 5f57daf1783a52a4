mod common;

use std::fs;

use common::{Asm, SharedBuf, com_emulator, place_fcb, read_mem};
use cpm80::emulator::{Event, ExecState, Exception, GuestMemory};
use cpm80::system::bdos::{EOF_FILL, HANDLE_MAGIC, RESULT_ERROR, RESULT_OK};
use cpm80::system::BdosFault;

const FCB: u16 = 0x0200;
const FCB_COPY: u16 = 0x0240;
const RESULTS: u16 = 0x0400;

const C_WRITE: u8 = 2;
const C_WRITESTR: u8 = 9;
const F_OPEN: u8 = 15;
const F_CLOSE: u8 = 16;
const F_READ: u8 = 20;
const F_WRITE: u8 = 21;
const F_MAKE: u8 = 22;
const F_DMAOFF: u8 = 26;

fn run_to_warm_boot(emu: &mut cpm80::emulator::Emulator) {
    assert!(cpm80::run(emu, Some(10_000)).unwrap());
    assert_eq!(emu.get_cur_event(), Event::WarmBoot(0x0000));
}

#[test]
fn test_print_string_and_console_output() {
    let dir = tempfile::tempdir().unwrap();
    let console = SharedBuf::default();
    let program = Asm::new()
        .mvi_a(0x5A)
        .bdos(C_WRITESTR, 0x0300)
        .bdos(C_WRITE, b'!' as u16)
        .sta(RESULTS)
        .ret();
    let mut emu = com_emulator(dir.path(), &console, program);
    emu.get_state_mut().memory.write_block(0x0300, b"HELLO, CP/M$IGNORED");

    run_to_warm_boot(&mut emu);
    assert_eq!(console.text(), "HELLO, CP/M!");
    // 控制台功能不修改 A
    assert_eq!(read_mem(&emu, RESULTS, 1), vec![0x5A]);
}

#[test]
fn test_write_close_reopen_read() {
    let dir = tempfile::tempdir().unwrap();
    let console = SharedBuf::default();
    let records: Vec<u8> = (0..256u32).map(|i| (i * 7) as u8).collect();

    let writer = Asm::new()
        .bdos(F_MAKE, FCB)
        .sta(RESULTS)
        .bdos(F_DMAOFF, 0x0300)
        .bdos(F_WRITE, FCB)
        .sta(RESULTS + 1)
        .bdos(F_DMAOFF, 0x0380)
        .bdos(F_WRITE, FCB)
        .sta(RESULTS + 2)
        .bdos(F_CLOSE, FCB)
        .sta(RESULTS + 3)
        .ret();
    let mut emu = com_emulator(dir.path(), &console, writer);
    place_fcb(&mut emu, FCB, "DATA", "BIN");
    emu.get_state_mut().memory.write_block(0x0300, &records);
    run_to_warm_boot(&mut emu);

    assert_eq!(read_mem(&emu, RESULTS, 4), vec![RESULT_OK; 4]);
    assert_eq!(fs::read(dir.path().join("DATA.BIN")).unwrap(), records);
    assert_eq!(emu.bdos().open_files(), 0);
    // 关闭后句柄区清零，记录号停在 2
    assert_eq!(read_mem(&emu, FCB + 16, 16), vec![0; 16]);
    assert_eq!(read_mem(&emu, FCB + 32, 1), vec![2]);

    let reader = Asm::new()
        .bdos(F_OPEN, FCB)
        .sta(RESULTS)
        .bdos(F_DMAOFF, 0x0500)
        .bdos(F_READ, FCB)
        .sta(RESULTS + 1)
        .bdos(F_DMAOFF, 0x0580)
        .bdos(F_READ, FCB)
        .sta(RESULTS + 2)
        .bdos(F_READ, FCB)
        .sta(RESULTS + 3)
        .bdos(F_CLOSE, FCB)
        .sta(RESULTS + 4)
        .ret();
    let mut emu = com_emulator(dir.path(), &console, reader);
    place_fcb(&mut emu, FCB, "DATA", "BIN");
    run_to_warm_boot(&mut emu);

    assert_eq!(
        read_mem(&emu, RESULTS, 5),
        vec![RESULT_OK, RESULT_OK, RESULT_OK, RESULT_ERROR, RESULT_OK]
    );
    assert_eq!(read_mem(&emu, 0x0500, 256), records);
}

#[test]
fn test_short_final_record_is_padded() {
    let dir = tempfile::tempdir().unwrap();
    let console = SharedBuf::default();
    let mut content = vec![0x11u8; 128];
    content.extend_from_slice(&[0x22, 0x33]);
    fs::write(dir.path().join("SHORT.TXT"), &content).unwrap();

    let program = Asm::new()
        .bdos(F_OPEN, FCB)
        .sta(RESULTS)
        .bdos(F_READ, FCB)
        .sta(RESULTS + 1)
        .bdos(F_READ, FCB)
        .sta(RESULTS + 2)
        .bdos(F_READ, FCB)
        .sta(RESULTS + 3)
        .ret();
    let mut emu = com_emulator(dir.path(), &console, program);
    place_fcb(&mut emu, FCB, "SHORT", "TXT");
    run_to_warm_boot(&mut emu);

    assert_eq!(
        read_mem(&emu, RESULTS, 4),
        vec![RESULT_OK, RESULT_OK, RESULT_OK, RESULT_ERROR]
    );
    // 默认 DMA 为 0080h，最后一次成功读取的是补齐的短记录
    let mut expected = vec![0x22, 0x33];
    expected.resize(128, EOF_FILL);
    assert_eq!(read_mem(&emu, 0x0080, 128), expected);
    // 文件仍然打开
    assert_eq!(emu.bdos().open_files(), 1);
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let console = SharedBuf::default();
    let program = Asm::new().bdos(F_OPEN, FCB).sta(RESULTS).ret();
    let mut emu = com_emulator(dir.path(), &console, program);
    place_fcb(&mut emu, FCB, "NOPE", "TXT");
    let before = read_mem(&emu, FCB, 36);
    run_to_warm_boot(&mut emu);

    assert_eq!(read_mem(&emu, RESULTS, 1), vec![RESULT_ERROR]);
    assert_eq!(read_mem(&emu, FCB, 36), before);
    assert_eq!(emu.bdos().open_files(), 0);
}

#[test]
fn test_handle_survives_copy_but_not_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let console = SharedBuf::default();
    fs::write(dir.path().join("COPY.DAT"), vec![0x44u8; 256]).unwrap();

    // 客户程序打开文件后停机，测试代码把 FCB 复制一份再继续运行
    let open = Asm::new().bdos(F_OPEN, FCB).sta(RESULTS).hlt();
    let mut emu = com_emulator(dir.path(), &console, open);
    place_fcb(&mut emu, FCB, "COPY", "DAT");
    emu.steps(10_000).unwrap();
    assert_eq!(read_mem(&emu, RESULTS, 1), vec![RESULT_OK]);
    let magic = u32::from_le_bytes(read_mem(&emu, FCB + 16, 4).try_into().unwrap());
    assert_eq!(magic, HANDLE_MAGIC);

    let fcb = read_mem(&emu, FCB, 36);
    emu.get_state_mut().memory.write_block(FCB_COPY, &fcb);

    // 通过副本读取，然后把原 FCB 校验值的一个字节取反再读取
    let [lo, hi] = (FCB + 20).to_le_bytes();
    let code = Asm::new()
        .bdos(F_READ, FCB_COPY)
        .sta(RESULTS + 1)
        .raw(&[0x3A, lo, hi, 0x2F])
        .sta(FCB + 20)
        .bdos(F_READ, FCB)
        .sta(RESULTS + 2)
        .bdos(F_CLOSE, FCB)
        .sta(RESULTS + 3)
        .bdos(F_CLOSE, FCB_COPY)
        .sta(RESULTS + 4)
        .bdos(F_READ, FCB_COPY)
        .sta(RESULTS + 5)
        .hlt();
    emu.get_state_mut().memory.write_block(0x0800, &code.code);
    emu.reset();
    emu.get_state_mut().pc = 0x0800;
    emu.steps(10_000).unwrap();

    assert_eq!(
        read_mem(&emu, RESULTS + 1, 5),
        vec![RESULT_OK, RESULT_ERROR, RESULT_ERROR, RESULT_OK, RESULT_ERROR]
    );
    assert_eq!(read_mem(&emu, 0x0080, 128), vec![0x44; 128]);
    assert_eq!(emu.bdos().open_files(), 0);
}

#[test]
fn test_unknown_function_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let console = SharedBuf::default();
    let program = Asm::new().bdos(0x63, 0x1234).mvi_a(1).sta(RESULTS).ret();
    let mut emu = com_emulator(dir.path(), &console, program);

    let err = cpm80::run(&mut emu, Some(10_000)).unwrap_err();
    let exception = err.downcast_ref::<Exception>().unwrap();
    let Exception::Bdos(BdosFault { function, de, .. }) = exception else {
        panic!("unexpected exception: {exception}");
    };
    assert_eq!((*function, *de), (0x63, 0x1234));
    assert_eq!(emu.get_exec_state(), ExecState::End);
    assert_eq!(emu.get_cur_event(), Event::Halted);

    // 停机后不再执行
    emu.steps(10).unwrap();
    assert_eq!(read_mem(&emu, RESULTS, 1), vec![0]);
}

#[test]
fn test_events_record_bdos_calls() {
    let dir = tempfile::tempdir().unwrap();
    let console = SharedBuf::default();
    let program = Asm::new()
        .bdos(F_DMAOFF, 0x1000)
        .bdos(C_WRITE, b'x' as u16)
        .ret();
    let mut emu = com_emulator(dir.path(), &console, program);
    run_to_warm_boot(&mut emu);

    assert_eq!(emu.bdos().dma(), 0x1000);
    assert_eq!(
        emu.get_events(),
        vec![
            Event::Bdos(F_DMAOFF),
            Event::Bdos(C_WRITE),
            Event::WarmBoot(0x0000)
        ]
    );
    assert_eq!(emu.get_state_ref().memory.read_byte(0x0005), 0xC9);
}
