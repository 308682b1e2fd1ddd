use kinescope_core::core::irq::InputLine;
use kinescope_core::core::machine::Machine;
use kinescope_core::core::save::{SaveState, SaveStateError};
use kinescope_core::core::{Bus, BusMaster};
use kinescope_core::video::Rgb;
use kinescope_machines::cabinet::{Board, Cabinet};
use kinescope_machines::config::MachineConfig;
use kinescope_machines::renegade::{INPUT_P1_BUTTON3, INPUT_P1_START, RenegadeBoard, RenegadeRegion};

const MAIN: BusMaster = BusMaster::Cpu(0);
const SOUND: BusMaster = BusMaster::Cpu(1);

fn board() -> RenegadeBoard {
    RenegadeBoard::from_config(&MachineConfig::for_board("renegade"))
}

// =================================================================
// Interrupts and status
// =================================================================

#[test]
fn test_mid_frame_irq_and_vblank_nmi() {
    let mut b = board();
    let mut irq_lines = Vec::new();
    let mut nmi_lines = Vec::new();
    for line in 0..b.total_lines() {
        b.begin_scanline(line);
        if b.lines(0).is_active(InputLine::Irq) {
            irq_lines.push(line);
            b.acknowledge_interrupt(MAIN, InputLine::Irq);
        }
        if b.lines(0).is_active(InputLine::Nmi) {
            nmi_lines.push(line);
            b.acknowledge_interrupt(MAIN, InputLine::Nmi);
        }
    }
    assert_eq!(irq_lines, vec![112]);
    assert_eq!(nmi_lines, vec![240]);
}

#[test]
fn test_status_port_bits() {
    let mut config = MachineConfig::for_board("renegade");
    config.dip.dsw1 = 0x00;
    let mut b = RenegadeBoard::from_config(&config);

    b.begin_scanline(10);
    assert_eq!(b.read(MAIN, 0x3802), 0x03);

    b.set_input(INPUT_P1_BUTTON3, true);
    b.begin_scanline(245);
    assert_eq!(b.read(MAIN, 0x3802), 0x42);

    b.mcu_mut().mcu_write(0x5A);
    assert_eq!(b.read(MAIN, 0x3802) & 0x80, 0x80);
    assert_eq!(b.read(MAIN, 0x3804), 0x5A);
    assert_eq!(b.read(MAIN, 0x3802) & 0x80, 0);
}

#[test]
fn test_status_port_passes_dsw1_middle_bits() {
    let mut b = board();
    b.begin_scanline(0);
    assert_eq!(b.read(MAIN, 0x3802) & 0x3C, 0x3C);
}

#[test]
fn test_player_ports_are_active_low() {
    let mut b = board();
    b.set_input(INPUT_P1_START, true);
    assert_eq!(b.read(MAIN, 0x3800), 0x7F);
    b.set_input(INPUT_P1_START, false);
    assert_eq!(b.read(MAIN, 0x3800), 0xFF);
}

#[test]
fn test_mcu_mailbox_from_main_side() {
    let mut b = board();
    b.write(MAIN, 0x3804, 0x21);
    assert!(b.mcu_mut().main_sent());
    assert_eq!(b.mcu_mut().mcu_read(), 0x21);

    b.mcu_mut().mcu_write(0x01);
    b.read(MAIN, 0x3805);
    assert!(!b.mcu_mut().mcu_sent());
}

// =================================================================
// Main CPU registers
// =================================================================

#[test]
fn test_scroll_register_pair() {
    let mut b = board();
    b.write(MAIN, 0x3800, 0x34);
    b.write(MAIN, 0x3801, 0x01);
    assert_eq!(b.scroll_x(), 0x0134);
}

#[test]
fn test_flip_is_active_low() {
    let mut b = board();
    b.write(MAIN, 0x3803, 0x00);
    assert!(b.video().flip());
    b.write(MAIN, 0x3803, 0x01);
    assert!(!b.video().flip());
}

#[test]
fn test_banked_rom_window() {
    let mut b = board();
    let mut rom = vec![0u8; 0x18000];
    rom[0x10000] = 0x11;
    rom[0x14000] = 0x22;
    rom[0x8000] = 0x33;
    b.load_region(RenegadeRegion::MainCpu, &rom);
    assert_eq!(b.read(MAIN, 0x4000), 0x11);
    b.write(MAIN, 0x3805, 0x01);
    assert_eq!(b.read(MAIN, 0x4000), 0x22);
    assert_eq!(b.read(MAIN, 0x8000), 0x33);
}

#[test]
fn test_split_palette_windows() {
    let mut b = board();
    b.write(MAIN, 0x3005, 0x2F);
    b.write(MAIN, 0x3105, 0x07);
    assert_eq!(b.video().palette().get(5), Rgb { r: 0xFF, g: 0x22, b: 0x77 });
    assert_eq!(b.read(MAIN, 0x3105), 0x07);
}

// =================================================================
// Sound
// =================================================================

#[test]
fn test_sound_command_is_deferred() {
    let mut b = board();
    b.write(MAIN, 0x3802, 0x81);
    assert!(!b.lines(1).is_active(InputLine::Irq));

    b.synchronize();
    assert!(b.lines(1).is_active(InputLine::Irq));
    assert_eq!(b.sound_latch().peek(), 0x81);
    assert_eq!(b.read(SOUND, 0x1000), 0x81);
    assert!(!b.lines(1).is_active(InputLine::Irq));
}

#[test]
fn test_ym3526_irq_drives_firq() {
    let mut b = board();
    b.set_ym3526_irq(true);
    assert!(b.lines(1).is_active(InputLine::Firq));
    b.set_ym3526_irq(false);
    assert!(!b.lines(1).is_active(InputLine::Firq));
}

#[test]
fn test_adpcm_address_selects_rom_and_slot() {
    let mut b = board();
    let mut rom = vec![0u8; 0x18000];
    rom[0x2000] = 0x4B;
    rom[0x08000 + 0x6000] = 0xC3;
    b.load_region(RenegadeRegion::Adpcm, &rom);

    b.write(SOUND, 0x2000, 0x19);
    assert_eq!(b.adpcm().position(), 0x2000);
    assert_eq!(b.adpcm().end(), 0x4000);

    b.write(SOUND, 0x1800, 0);
    b.advance_time(2 * 1536);
    assert_eq!(b.decoder_mut().take_nibbles(), vec![0x04, 0x0B]);

    b.write(SOUND, 0x3000, 0);
    assert!(b.adpcm().is_idle());

    b.write(SOUND, 0x2000, 0x17);
    assert_eq!(b.adpcm().position(), 0x0E000);
}

#[test]
fn test_unknown_adpcm_rom_select_is_ignored() {
    let mut b = board();
    b.write(SOUND, 0x2000, 0x0D);
    b.write(SOUND, 0x2000, 0x00);
    assert_eq!(b.adpcm().position(), 0x12000);
}

#[test]
fn test_ym3526_ports_are_mapped() {
    let mut b = board();
    b.write(SOUND, 0x2800, 0x01);
    b.write(SOUND, 0x2801, 0x20);
    assert!(b.ym3526_mut().take_writes().contains(&(0x01, 0x20)));
}

// =================================================================
// Save state and cabinet
// =================================================================

#[test]
fn test_save_state_round_trip() {
    let mut b = board();
    b.write(MAIN, 0x0200, 0x99);
    b.write(MAIN, 0x3800, 0x40);
    b.write(MAIN, 0x3805, 0x01);
    let saved = b.save_state().unwrap();

    b.reset();
    b.write(MAIN, 0x0200, 0);
    b.load_state(&saved).unwrap();
    assert_eq!(b.read(MAIN, 0x0200), 0x99);
    assert_eq!(b.scroll_x(), 0x40);
}

#[test]
fn test_truncated_snapshot_leaves_board_untouched() {
    let mut b = board();
    b.write(MAIN, 0x0010, 0x5A);
    let saved = b.save_state().unwrap();

    // Header (name + version), then the RAM length prefix.
    let at = 8 + "renegade".len() + 4;
    let len = u64::from_le_bytes(saved[at..at + 8].try_into().unwrap()) as usize;
    let mut forged = saved[..at].to_vec();
    forged.extend_from_slice(&((len / 2) as u64).to_le_bytes());
    forged.extend_from_slice(&saved[at + 8..at + 8 + len / 2]);
    forged.extend_from_slice(&saved[at + 8 + len..]);

    b.write(MAIN, 0x0010, 0xA5);
    let err = b.load_state(&forged).unwrap_err();
    assert!(matches!(err, SaveStateError::SizeMismatch { field: "ram", .. }));
    assert_eq!(b.read(MAIN, 0x0010), 0xA5);

    // A body cut short is a decode error.
    let err = b.load_state(&saved[..saved.len() / 2]).unwrap_err();
    assert!(matches!(err, SaveStateError::Decode(_)));
}

#[test]
fn test_frame_runs_with_idle_cores() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut cab = Cabinet::with_idle_cores(board(), 4);
    cab.run_frame();
    assert_eq!(cab.frames(), 1);
    assert_eq!(cab.display_size(), (256, 240));
}
