use kinescope_core::core::irq::InputLine;
use kinescope_core::core::machine::Machine;
use kinescope_core::core::save::{SaveState, SaveStateError};
use kinescope_core::core::{Bus, BusMaster};
use kinescope_core::video::{DrawStep, Rgb};
use kinescope_machines::cabinet::{Board, Cabinet};
use kinescope_machines::config::MachineConfig;
use kinescope_machines::wwfwfest::{
    INPUT_SERVICE, INPUT_START, PRIORITY, WWFWFEST, WWFWFSTB, WwfBoard, WwfDescriptor, WwfRegion, player_input,
};

const MAIN: BusMaster = BusMaster::Cpu(0);
const SOUND: BusMaster = BusMaster::Cpu(1);

fn board(desc: WwfDescriptor) -> WwfBoard {
    WwfBoard::from_config(desc, &MachineConfig::for_board(desc.name))
}

fn set_scroll(b: &mut WwfBoard, values: [u16; 4]) {
    for (i, v) in values.into_iter().enumerate() {
        b.write(MAIN, 0x100000 + 2 * i as u32, v);
    }
}

// =================================================================
// Priority register
// =================================================================

#[test]
fn test_priority_table_orders() {
    assert_eq!(PRIORITY.plan(0x78).0.len(), 4);
    assert_eq!(PRIORITY.plan(0x7B).0[2], DrawStep::Sprites { list: 0 });
    // Sprites go under bg1 only in 0x7C.
    assert_eq!(PRIORITY.plan(0x7C).0[1], DrawStep::Sprites { list: 0 });
    assert!(PRIORITY.plan(0x00).0.is_empty());
    assert!(PRIORITY.plan(0x7D).0.is_empty());
}

#[test]
fn test_scroll_routing_follows_priority() {
    let mut b = board(WWFWFEST);
    set_scroll(&mut b, [10, 20, 30, 40]);
    assert_eq!(b.layer_scroll(), [(10, 20), (30, 40)]);

    b.write(MAIN, 0x100008, 0x7B);
    assert_eq!(b.priority(), 0x7B);
    assert_eq!(b.layer_scroll(), [(30, 40), (10, 20)]);

    b.write(MAIN, 0x100008, 0x7C);
    assert_eq!(b.layer_scroll(), [(30, 40), (10, 20)]);
}

#[test]
fn test_bootleg_scroll_offsets() {
    let mut b = board(WWFWFSTB);
    set_scroll(&mut b, [10, 20, 30, 40]);
    assert_eq!(b.layer_scroll(), [(6, 20), (26, 40)]);

    b.write(MAIN, 0x100008, 0x7B);
    assert_eq!(b.layer_scroll(), [(26, 40), (8, 20)]);
}

#[test]
fn test_unknown_priority_keeps_previous_frame() {
    let mut b = board(WWFWFEST);
    b.load_region(WwfRegion::Chars, &[0xFF; 32]);
    b.end_frame();
    assert_eq!(b.video().bitmap().pixel(10, 100), 15);

    b.write(MAIN, 0x100008, 0x00);
    b.load_region(WwfRegion::Chars, &[0x11; 32]);
    b.end_frame();
    assert_eq!(b.video().bitmap().pixel(10, 100), 15);

    b.write(MAIN, 0x100008, 0x78);
    b.end_frame();
    assert_eq!(b.video().bitmap().pixel(10, 100), 1);
}

// =================================================================
// Memory
// =================================================================

#[test]
fn test_text_ram_keeps_low_byte_only() {
    let mut b = board(WWFWFEST);
    b.write(MAIN, 0x0C0010, 0xABCD);
    assert_eq!(b.read(MAIN, 0x0C0010), 0x00CD);
}

#[test]
fn test_palette_decodes_sixteen_of_sixty_four_words() {
    let mut b = board(WWFWFEST);
    b.write(MAIN, 0x180080, 0x0F00);
    assert_eq!(b.video().palette().get(0x10), Rgb { r: 0, g: 0, b: 0xFF });

    // Words 0x10-0x3F alias the first sixteen.
    b.write(MAIN, 0x180020, 0x000F);
    assert_eq!(b.video().palette().get(0), Rgb { r: 0xFF, g: 0, b: 0 });
    assert_eq!(b.read(MAIN, 0x180000), 0x000F);
}

#[test]
fn test_player_and_system_ports() {
    let mut b = board(WWFWFEST);
    b.set_input(player_input(2, INPUT_START), true);
    assert_eq!(b.read(MAIN, 0x140024), 0xFFBF);
    assert_eq!(b.read(MAIN, 0x140020), 0xFFFF);

    b.set_input(INPUT_SERVICE, true);
    b.begin_scanline(100);
    assert_eq!(b.read(MAIN, 0x140028), 0xFFF6);
    b.begin_scanline(250);
    assert_eq!(b.read(MAIN, 0x140028) & 0x08, 0x08);
}

#[test]
fn test_dip_switches_from_config() {
    let mut config = MachineConfig::for_board("wwfwfest");
    config.dip.dsw0 = 0x12;
    config.dip.dsw1 = 0x34;
    let mut b = WwfBoard::from_config(WWFWFEST, &config);
    assert_eq!(b.read(MAIN, 0x14002A), 0x3412);
}

// =================================================================
// Interrupts and sound
// =================================================================

#[test]
fn test_timer_and_vblank_levels() {
    let mut b = board(WWFWFEST);
    b.begin_scanline(16);
    assert!(b.irq_levels().is_pending(2));
    b.write(MAIN, 0x140002, 0);
    assert!(!b.irq_levels().is_pending(2));

    b.begin_scanline(248);
    assert_eq!(b.lines(0).vector(), 3);
    b.write(MAIN, 0x140000, 0);
    assert!(!b.lines(0).is_active(InputLine::Irq));
}

#[test]
fn test_sound_command_pulses_nmi_at_sync() {
    let mut b = board(WWFWFEST);
    b.write(MAIN, 0x140010, 0x2A);
    assert!(!b.lines(1).is_active(InputLine::Nmi));
    b.synchronize();
    assert!(b.lines(1).is_active(InputLine::Nmi));
    assert_eq!(b.read(SOUND, 0xE800), 0x2A);
    assert!(!b.sound_latch().is_pending());
}

#[test]
fn test_oki_bank_register() {
    let mut b = board(WWFWFEST);
    b.write(SOUND, 0xE000, 0x01);
    assert_eq!(b.oki_bank(), 1);
}

// =================================================================
// Save state and cabinet
// =================================================================

#[test]
fn test_save_state_round_trip() {
    let mut b = board(WWFWFEST);
    b.write(MAIN, 0x100008, 0x7C);
    b.write(MAIN, 0x14000C, 0x01);
    b.write(MAIN, 0x1C0100, 0x4242);
    let saved = b.save_state().unwrap();

    b.reset();
    assert_eq!(b.priority(), 0x78);
    b.load_state(&saved).unwrap();
    assert_eq!(b.priority(), 0x7C);
    assert!(b.video().flip());
    assert_eq!(b.read(MAIN, 0x1C0100), 0x4242);
}

#[test]
fn test_bootleg_rejects_original_state() {
    let saved = board(WWFWFEST).save_state().unwrap();
    let err = board(WWFWFSTB).load_state(&saved).unwrap_err();
    assert!(matches!(err, SaveStateError::BoardMismatch { .. }));
}

#[test]
fn test_frame_runs_with_idle_cores() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut cab = Cabinet::with_idle_cores(board(WWFWFSTB), 2);
    cab.run_frame();
    assert_eq!(cab.display_size(), (320, 240));
    assert_eq!(cab.input_map().len(), 33);
}
