use kinescope_core::core::irq::InputLine;
use kinescope_core::core::machine::Machine;
use kinescope_core::core::save::{SaveState, SaveStateError};
use kinescope_core::core::{Bus, BusMaster};
use kinescope_machines::cabinet::{Board, Cabinet};
use kinescope_machines::config::MachineConfig;
use kinescope_machines::ddragon::{self, DARKTOWR, DDRAGON, DDRAGON2, DdBoard, DdDescriptor, DdRegion};

const MAIN: BusMaster = BusMaster::Cpu(0);
const SUB: BusMaster = BusMaster::Cpu(1);
const SOUND: BusMaster = BusMaster::Cpu(2);

/// Bank register value with the sub CPU running and the screen unflipped.
const SUB_RUNNING: u8 = 0x0C;

fn board(desc: DdDescriptor) -> DdBoard {
    DdBoard::from_config(desc, &MachineConfig::for_board(desc.name))
}

// =================================================================
// Shared RAM gate
// =================================================================

#[test]
fn test_comram_open_while_sub_in_reset() {
    let mut b = board(DDRAGON);
    assert!(b.lines(1).is_suspended());
    b.write(MAIN, 0x2010, 0x55);
    assert_eq!(b.read(MAIN, 0x2010), 0x55);
    assert_eq!(b.read(SUB, 0x8010), 0x55);
}

#[test]
fn test_comram_floats_while_sub_runs() {
    let mut b = board(DDRAGON);
    b.write(MAIN, 0x2010, 0x55);
    b.write(MAIN, 0x3808, SUB_RUNNING);
    assert!(!b.lines(1).is_suspended());

    assert_eq!(b.read(MAIN, 0x2010), 0xFF);
    b.write(MAIN, 0x2010, 0x66);
    assert_eq!(b.comram().read_local(0x10), 0x55);

    // Halting the sub CPU hands the bus back.
    b.write(MAIN, 0x3808, SUB_RUNNING | 0x10);
    assert_eq!(b.read(MAIN, 0x2010), 0x55);
}

#[test]
fn test_jump_index_clamp() {
    let mut b = board(DDRAGON);
    b.write(MAIN, 0x2049, 0x1F);
    assert_eq!(b.read(MAIN, 0x2049), 0x01);
    assert_eq!(b.comram().read_local(0x49), 0x1F);

    b.write(MAIN, 0x2049, 0x1E);
    assert_eq!(b.read(MAIN, 0x2049), 0x1E);
    b.write(MAIN, 0x2048, 0x1F);
    assert_eq!(b.read(MAIN, 0x2048), 0x1F);
}

// =================================================================
// Bank register
// =================================================================

#[test]
fn test_bank_register_fields() {
    let mut b = board(DDRAGON);
    b.write(MAIN, 0x3808, 0xA0 | SUB_RUNNING | 0x01);
    assert_eq!(b.rom_bank(), 5);
    assert!(!b.video().flip());

    b.write(MAIN, 0x3808, 0x08);
    assert!(b.video().flip());
    assert!(!b.lines(1).is_suspended());
}

#[test]
fn test_banked_rom_window() {
    let mut b = board(DDRAGON);
    let mut rom = vec![0u8; 0x30000];
    rom[0x8000] = 0x11;
    rom[0x10000 + 2 * 0x4000 + 0x10] = 0x22;
    b.load_region(DdRegion::MainCpu, &rom);
    b.write(MAIN, 0x3808, 0x40);
    assert_eq!(b.read(MAIN, 0x4010), 0x22);
    assert_eq!(b.read(MAIN, 0x8000), 0x11);
}

#[test]
fn test_dark_tower_flip_is_not_in_bank_register() {
    let mut b = board(DARKTOWR);
    b.write(MAIN, 0x3808, 0x08);
    assert!(!b.video().flip());
}

#[test]
fn test_dark_tower_mcu_bank() {
    let mut b = board(DARKTOWR);
    b.write(MAIN, 0x3808, 0x80 | SUB_RUNNING);
    b.write(MAIN, 0x4000, 0x01);
    assert_eq!(b.mcu_mut().mcu_read(), 0x80);

    b.mcu_mut().mcu_write(0x33);
    assert_eq!(b.read(MAIN, 0x4001), 0x33);
    assert!(!b.mcu_mut().mcu_sent());
}

// =================================================================
// Interrupts
// =================================================================

#[test]
fn test_vblank_nmi_and_timer_firq() {
    let mut b = board(DDRAGON);
    let mut nmi_lines = Vec::new();
    let mut firq_count = 0;
    for line in 0..b.total_lines() {
        b.begin_scanline(line);
        if b.lines(0).is_active(InputLine::Nmi) {
            nmi_lines.push(line);
            b.write(MAIN, 0x380B, 0);
        }
        if b.lines(0).is_active(InputLine::Firq) {
            firq_count += 1;
            b.write(MAIN, 0x380C, 0);
        }
    }
    assert_eq!(nmi_lines, vec![240]);
    assert_eq!(firq_count, 16);
}

#[test]
fn test_vblank_bit_in_extra_port() {
    let mut b = board(DDRAGON);
    b.begin_scanline(100);
    assert_eq!(b.read(MAIN, 0x3802) & 0x08, 0);
    b.begin_scanline(250);
    assert_eq!(b.read(MAIN, 0x3802) & 0x08, 0x08);
}

#[test]
fn test_sound_command_lands_at_sync_point() {
    let mut b = board(DDRAGON);
    b.write(MAIN, 0x380E, 0x42);
    assert!(!b.lines(2).is_active(InputLine::Irq));

    b.synchronize();
    assert!(b.lines(2).is_active(InputLine::Irq));
    assert_eq!(b.read(SOUND, 0x1000), 0x42);
    assert!(!b.lines(2).is_active(InputLine::Irq));
}

#[test]
fn test_ddragon2_sound_command_is_an_nmi() {
    let mut b = board(DDRAGON2);
    b.write(MAIN, 0x380E, 0x07);
    b.synchronize();
    assert!(b.lines(2).is_active(InputLine::Nmi));
    assert_eq!(b.read(SOUND, 0xA000), 0x07);
}

#[test]
fn test_sub_cpu_port6_handshake() {
    let mut b = board(DDRAGON);
    b.write(MAIN, 0x3808, SUB_RUNNING);

    b.write(MAIN, 0x380F, 0);
    b.synchronize();
    assert!(b.lines(1).is_active(InputLine::Nmi));
    b.write(SUB, 0x0017, 0x01);
    assert!(!b.lines(1).is_active(InputLine::Nmi));

    // Rising edge of bit 1 only.
    b.write(SUB, 0x0017, 0x02);
    b.synchronize();
    assert!(b.lines(0).is_active(InputLine::Irq));
    b.write(MAIN, 0x380D, 0);
    b.write(SUB, 0x0017, 0x02);
    b.synchronize();
    assert!(!b.lines(0).is_active(InputLine::Irq));
}

#[test]
fn test_ddragon2_sub_registers() {
    let mut b = board(DDRAGON2);
    b.write(MAIN, 0x3808, SUB_RUNNING);
    b.write(MAIN, 0x380F, 0);
    b.synchronize();
    assert!(b.lines(1).is_active(InputLine::Nmi));
    b.write(SUB, 0xD000, 0);
    assert!(!b.lines(1).is_active(InputLine::Nmi));

    b.write(SUB, 0xE000, 0);
    b.synchronize();
    assert!(b.lines(0).is_active(InputLine::Irq));
}

// =================================================================
// ADPCM
// =================================================================

#[test]
fn test_adpcm_plays_from_sample_timer() {
    let mut b = board(DDRAGON);
    let mut rom = vec![0u8; 0x20000];
    rom[0x0200] = 0x9A;
    b.load_region(DdRegion::Adpcm, &rom);

    b.write(SOUND, 0x3804, 0x01); // start 0x200
    b.write(SOUND, 0x3802, 0x02); // end 0x400
    b.write(SOUND, 0x3800, 0x00);
    assert_eq!(b.read(SOUND, 0x1800) & 0x01, 0);

    // Two sample periods.
    b.advance_time(2 * 1536);
    assert_eq!(b.decoders_mut()[0].nibbles(), &[0x09, 0x0A]);
    assert!(b.decoders_mut()[1].nibbles().is_empty());

    b.write(SOUND, 0x3806, 0x00);
    assert_eq!(b.read(SOUND, 0x1800) & 0x01, 0x01);
}

// =================================================================
// Save state and cabinet
// =================================================================

#[test]
fn test_save_state_round_trip() {
    let mut b = board(DDRAGON);
    b.write(MAIN, 0x0100, 0xAB);
    b.write(MAIN, 0x3809, 0x40);
    let saved = b.save_state().unwrap();

    b.write(MAIN, 0x0100, 0x00);
    b.load_state(&saved).unwrap();
    assert_eq!(b.read(MAIN, 0x0100), 0xAB);
}

#[test]
fn test_save_state_from_other_board_is_rejected() {
    let saved = board(DDRAGON2).save_state().unwrap();
    let mut b = board(DDRAGON);
    b.write(MAIN, 0x0100, 0x5A);
    let err = b.load_state(&saved).unwrap_err();
    assert!(matches!(err, SaveStateError::BoardMismatch { .. }));
    assert_eq!(b.read(MAIN, 0x0100), 0x5A);
}

#[test]
fn test_frame_runs_with_idle_cores() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut cab = Cabinet::with_idle_cores(board(DDRAGON), 4);
    cab.run_frame();
    cab.run_frame();
    assert_eq!(cab.frames(), 2);
    let (w, h) = cab.display_size();
    assert_eq!((w, h), (256, 240));
    let mut rgb = vec![0u8; (w * h * 3) as usize];
    cab.render_frame(&mut rgb);
}

#[test]
fn test_descriptors_share_one_board_type() {
    assert_eq!(ddragon::DARKTOWR.main_ram_end, ddragon::DDRAGON.main_ram_end);
    assert_ne!(DDRAGON2.palette_base, DDRAGON.palette_base);
    assert_eq!(board(DDRAGON2).descriptor().name, "ddragon2");
}
