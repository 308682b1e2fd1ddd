use kinescope_core::core::irq::InputLine;
use kinescope_core::core::machine::Machine;
use kinescope_core::core::save::{SaveState, SaveStateError};
use kinescope_core::core::{Bus, BusMaster};
use kinescope_core::video::Rgb;
use kinescope_core::video::palette::pal5bit;
use kinescope_machines::cabinet::{Board, Cabinet};
use kinescope_machines::config::MachineConfig;
use kinescope_machines::m72::{
    self, HHARRY, INPUT_P1_BUTTON1, INPUT_P1_START, M72, M72Board, M72Descriptor, M72Region, RTYPE2,
};

const MAIN: BusMaster = BusMaster::Cpu(0);
const SOUND: BusMaster = BusMaster::Cpu(1);

fn board(desc: M72Descriptor) -> M72Board {
    M72Board::from_config(desc, &MachineConfig::for_board(desc.name))
}

// =================================================================
// Main CPU interrupts
// =================================================================

#[test]
fn test_raster_irq_uses_second_vector() {
    let mut b = board(M72);
    b.io_write(MAIN, 0x06, 128 + 100);
    b.begin_scanline(99);
    assert!(!b.main_lines().is_active(InputLine::Irq));

    b.begin_scanline(100);
    assert!(b.main_lines().is_active(InputLine::Irq));
    assert_eq!(b.main_lines().vector(), 0x22);
    b.acknowledge_interrupt(MAIN, InputLine::Irq);

    b.begin_scanline(256);
    assert_eq!(b.main_lines().vector(), 0x20);
}

#[test]
fn test_pic_init_moves_vector_base() {
    let mut b = board(M72);
    assert_eq!(b.irq_base(), 0x20);

    // ICW2 without ICW1 is ignored.
    b.io_write(MAIN, 0x42, 0x40);
    assert_eq!(b.irq_base(), 0x20);

    b.io_write(MAIN, 0x40, 0x13);
    b.io_write(MAIN, 0x42, 0x6D);
    assert_eq!(b.irq_base(), 0x68);

    b.begin_scanline(256);
    assert_eq!(b.main_lines().vector(), 0x68);
}

#[test]
fn test_memory_mapped_raster_register() {
    let mut b = board(RTYPE2);
    b.write(MAIN, 0xB0000, 128 + 10);
    b.begin_scanline(10);
    assert_eq!(b.main_lines().vector(), 0x22);
}

// =================================================================
// Sound CPU interrupt arbiter
// =================================================================

#[test]
fn test_sound_command_vectors_through_arbiter() {
    let mut b = board(M72);
    b.io_write(MAIN, 0x00, 0x55);
    assert!(!b.sound_lines().is_active(InputLine::Irq));

    b.synchronize();
    assert!(b.sound_lines().is_active(InputLine::Irq));
    assert_eq!(b.sound_lines().vector(), 0xDF);
    assert_eq!(b.io_read(SOUND, 0x02), 0x55);

    b.io_write(SOUND, 0x06, 0);
    b.synchronize();
    assert!(!b.sound_lines().is_active(InputLine::Irq));
}

#[test]
fn test_ym2151_and_latch_share_vector() {
    let mut b = board(M72);
    b.set_ym2151_irq(true);
    b.io_write(MAIN, 0x00, 0x01);
    b.synchronize();
    assert_eq!(b.arbiter().vector(), 0xCF);

    b.set_ym2151_irq(false);
    b.synchronize();
    assert_eq!(b.sound_lines().vector(), 0xDF);
}

#[test]
fn test_port02_holds_sound_cpu_in_reset() {
    let mut b = board(M72);
    b.io_write(MAIN, 0x00, 0x01);
    b.synchronize();

    b.io_write(MAIN, 0x02, 0x00);
    assert!(b.sound_lines().is_suspended());

    b.io_write(MAIN, 0x02, 0x10);
    assert!(!b.sound_lines().is_suspended());
    assert!(b.take_reset_release(1));
    assert!(b.sound_lines().is_active(InputLine::Irq));
    assert_eq!(b.sound_lines().vector(), 0xDF);
}

#[test]
fn test_sound_reset_keeps_held_ym2151_irq() {
    let mut b = board(M72);
    b.set_ym2151_irq(true);
    b.synchronize();
    assert_eq!(b.sound_lines().vector(), 0xEF);

    b.io_write(MAIN, 0x02, 0x00);
    b.io_write(MAIN, 0x02, 0x10);
    b.synchronize();
    assert!(b.sound_lines().is_active(InputLine::Irq));
    assert_eq!(b.arbiter().vector(), 0xEF);
    assert_eq!(b.sound_lines().vector(), 0xEF);
}

#[test]
fn test_port02_reset_bit_ignored_without_sound_rom_window() {
    let mut b = board(RTYPE2);
    b.io_write(MAIN, 0x02, 0x00);
    assert!(!b.sound_lines().is_suspended());
}

// =================================================================
// Memory
// =================================================================

#[test]
fn test_main_cpu_window_onto_sound_ram() {
    let mut b = board(M72);
    b.write(MAIN, 0xE0010, 0xBEEF);
    assert_eq!(b.read(SOUND, 0x10), 0xEF);
    assert_eq!(b.read(SOUND, 0x11), 0xBE);
    b.write(SOUND, 0x12, 0x34);
    assert_eq!(b.read(MAIN, 0xE0012) & 0xFF, 0x34);
}

#[test]
fn test_planar_palette_banks() {
    let mut b = board(M72);
    b.write(MAIN, 0xC8000 + 2 * 5, 0x1F);
    b.write(MAIN, 0xC8000 + 0x400 + 2 * 5, 0x10);
    assert_eq!(b.video().palette().get(5), Rgb { r: 0xFF, g: pal5bit(0x10), b: 0 });

    // Second bank feeds pens 256 and up.
    b.write(MAIN, 0xCC000 + 0x800, 0x1F);
    assert_eq!(b.video().palette().get(256), Rgb { r: 0, g: 0, b: 0xFF });

    // Word bit 8 is not decoded; unused bits read back high.
    assert_eq!(b.read(MAIN, 0xC8000 + 2 * 0x105), 0xFFFF);
}

#[test]
fn test_sprite_ram_reads_back() {
    let mut b = board(M72);
    b.write(MAIN, 0xC0010, 0x1234);
    assert_eq!(b.read(MAIN, 0xC0010), 0x1234);
    b.io_write(MAIN, 0x04, 0);
    assert_eq!(b.read(MAIN, 0xC0010), 0x1234);
}

#[test]
fn test_rom_reset_vector_mirror() {
    let mut b = board(M72);
    let mut rom = vec![0u8; 0x40000];
    rom[0x3FFF0] = 0xEA;
    rom[0x3FFF1] = 0x00;
    b.load_region(M72Region::MainCpu, &rom);
    assert_eq!(b.read(MAIN, 0xFFFF0), 0x00EA);
}

// =================================================================
// Samples
// =================================================================

#[test]
fn test_sample_port_streams_to_dac() {
    let mut b = board(RTYPE2);
    let mut samples = vec![0u8; 0x100];
    samples[0x20] = 0x77;
    samples[0x21] = 0x66;
    b.load_region(M72Region::Samples, &samples);

    b.io_write(SOUND, 0x80, 0x01);
    b.io_write(SOUND, 0x81, 0x00);
    assert_eq!(b.io_read(SOUND, 0x84), 0x77);
    b.io_write(SOUND, 0x82, 0x77);
    assert_eq!(b.dac().value(), 0x77);
    assert_eq!(b.io_read(SOUND, 0x84), 0x66);
}

#[test]
fn test_direct_sample_addressing() {
    let mut b = board(HHARRY);
    let mut samples = vec![0u8; 0x400];
    samples[0x0302] = 0x5A;
    b.load_region(M72Region::Samples, &samples);
    b.io_write(SOUND, 0x80, 0x02);
    b.io_write(SOUND, 0x81, 0x03);
    assert_eq!(b.io_read(SOUND, 0x84), 0x5A);
}

#[test]
fn test_sample_timer_pulses_sound_nmi() {
    let mut b = board(RTYPE2);
    b.advance_time(100);
    assert!(!b.sound_lines().is_active(InputLine::Nmi));
    b.advance_time(1100);
    assert!(b.sound_lines().is_active(InputLine::Nmi));
}

#[test]
fn test_no_sample_timer_without_dac() {
    let mut b = board(M72);
    b.advance_time(100_000);
    assert!(!b.sound_lines().is_active(InputLine::Nmi));
}

// =================================================================
// Inputs, config, save state
// =================================================================

#[test]
fn test_inputs_are_active_low() {
    let mut b = board(M72);
    assert_eq!(b.io_read(MAIN, 0x00), 0xFFFF);
    b.set_input(INPUT_P1_BUTTON1, true);
    assert_eq!(b.io_read(MAIN, 0x00), 0xFF7F);
    b.set_input(INPUT_P1_START, true);
    assert_eq!(b.io_read(MAIN, 0x02), 0xFFFE);
    b.set_input(INPUT_P1_BUTTON1, false);
    assert_eq!(b.io_read(MAIN, 0x00), 0xFFFF);
}

#[test]
fn test_flip_dip_inverts_flip_bit() {
    let mut config = MachineConfig::for_board("m72");
    config.flip_screen_dip = true;
    let mut b = M72Board::from_config(M72, &config);
    b.io_write(MAIN, 0x02, 0x10);
    assert!(b.video().flip());
    b.io_write(MAIN, 0x02, 0x14);
    assert!(!b.video().flip());
    assert_eq!(b.io_read(MAIN, 0x04) >> 8 & 0x01, 0);
}

#[test]
fn test_video_off_bit() {
    let mut b = board(M72);
    b.io_write(MAIN, 0x02, 0x18);
    assert!(b.video().video_off());
}

#[test]
fn test_save_state_restores_registers() {
    let mut b = board(M72);
    b.io_write(MAIN, 0x40, 0x13);
    b.io_write(MAIN, 0x42, 0x40);
    b.write(MAIN, 0x40100, 0xCAFE);
    let saved = b.save_state().unwrap();

    b.reset();
    b.write(MAIN, 0x40100, 0);
    assert_eq!(b.irq_base(), 0x20);

    b.load_state(&saved).unwrap();
    assert_eq!(b.irq_base(), 0x40);
    assert_eq!(b.read(MAIN, 0x40100), 0xCAFE);
}

/// Drop the contents of the first buffer in a snapshot body, leaving a
/// well-formed header and an empty `Vec` in its place.
fn empty_first_buffer(saved: &[u8], board: &str, elem_size: usize) -> Vec<u8> {
    let at = 8 + board.len() + 4;
    let len = u64::from_le_bytes(saved[at..at + 8].try_into().unwrap()) as usize;
    let mut forged = saved[..at].to_vec();
    forged.extend_from_slice(&0u64.to_le_bytes());
    forged.extend_from_slice(&saved[at + 8 + len * elem_size..]);
    forged
}

#[test]
fn test_snapshot_with_short_ram_is_refused() {
    let mut b = board(M72);
    let forged = empty_first_buffer(&b.save_state().unwrap(), "m72", 2);

    b.write(MAIN, 0x40000, 0x1234);
    let err = b.load_state(&forged).unwrap_err();
    assert!(matches!(err, SaveStateError::SizeMismatch { field: "ram", found: 0, .. }));
    assert_eq!(b.read(MAIN, 0x40000), 0x1234);
}

#[test]
fn test_frame_runs_with_idle_cores() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut cab = Cabinet::with_idle_cores(board(m72::MAJTITLE), 2);
    cab.run_frame();
    assert_eq!(cab.frames(), 1);
    let (w, h) = cab.display_size();
    assert_eq!((w, h), (384, 256));
    let mut rgb = vec![0u8; (w * h * 3) as usize];
    cab.render_frame(&mut rgb);
}
