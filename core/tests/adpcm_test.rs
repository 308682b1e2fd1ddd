use kinescope_core::device::{
    AdpcmChannel, AdpcmDecoder, AddressMode, Dac8, DualAdpcm, Msm5205Port, SampleStreamer, adpcm::DUAL_ADPCM_BANK,
};

/// Decoder that counts ROM-driven nibbles and reset edges.
#[derive(Default)]
struct CountingDecoder {
    nibbles: Vec<u8>,
    resets: Vec<bool>,
}

impl AdpcmDecoder for CountingDecoder {
    fn data_w(&mut self, nibble: u8) {
        self.nibbles.push(nibble);
    }

    fn reset_w(&mut self, asserted: bool) {
        self.resets.push(asserted);
    }
}

// =================================================================
// Single channel
// =================================================================

#[test]
fn test_nibbles_come_out_high_first() {
    let rom = [0xAB, 0xCD, 0xEF];
    let mut channel = AdpcmChannel::new(0, 0x10000);
    let mut port = Msm5205Port::new();
    channel.set_start(0);
    channel.set_end(3);
    channel.arm(&mut port);
    assert!(!port.in_reset());

    for _ in 0..4 {
        channel.tick(&rom, &mut port);
    }
    assert_eq!(port.nibbles(), &[0x0A, 0x0B, 0x0C, 0x0D]);
}

#[test]
fn test_channel_checks_end_before_last_low_nibble() {
    let rom = [0xAB, 0xCD, 0xEF];
    let mut channel = AdpcmChannel::new(0, 0x10000);
    let mut decoder = CountingDecoder::default();
    channel.set_end(2);
    channel.arm(&mut decoder);

    for _ in 0..4 {
        channel.tick(&rom, &mut decoder);
    }
    assert_eq!(decoder.nibbles, vec![0x0A, 0x0B, 0x0C]);
    assert!(!channel.is_idle());
    assert!(channel.has_pending_nibble());

    channel.tick(&rom, &mut decoder);
    assert!(channel.is_idle());
    assert_eq!(channel.position(), 2);
    assert_eq!(decoder.resets, vec![false, true]);

    // Idle: no more ROM reads.
    channel.tick(&rom, &mut decoder);
    assert_eq!(decoder.nibbles.len(), 3);
}

#[test]
fn test_single_byte_range_sends_only_high_nibble() {
    let rom = [0xAB];
    let mut channel = AdpcmChannel::new(0, 0x10000);
    let mut port = Msm5205Port::new();
    channel.set_start(0);
    channel.set_end(1);
    channel.arm(&mut port);

    channel.tick(&rom, &mut port);
    channel.tick(&rom, &mut port);
    assert_eq!(port.nibbles(), &[0x0A]);
    assert!(channel.is_idle());
}

#[test]
fn test_pending_nibble_survives_rearm() {
    let rom = [0xAB, 0x34];
    let mut channel = AdpcmChannel::new(0, 0x10000);
    let mut port = Msm5205Port::new();
    channel.set_end(1);
    channel.arm(&mut port);
    channel.tick(&rom, &mut port);
    channel.tick(&rom, &mut port);
    assert!(channel.is_idle());

    // The stale low nibble goes out before the new range is fetched.
    channel.set_start(1);
    channel.set_end(2);
    channel.arm(&mut port);
    channel.tick(&rom, &mut port);
    channel.tick(&rom, &mut port);
    assert_eq!(port.take_nibbles(), vec![0x0A, 0x0B, 0x03]);
}

#[test]
fn test_channel_stops_at_window_edge() {
    let rom = vec![0x11; 0x20];
    let mut channel = AdpcmChannel::new(0x10, 0x04);
    let mut port = Msm5205Port::new();
    channel.set_end(0x100);
    channel.arm(&mut port);
    for _ in 0..20 {
        channel.tick(&rom, &mut port);
    }
    assert!(channel.is_idle());
    assert_eq!(port.nibbles().len(), 7);
    assert!(port.in_reset());
}

#[test]
fn test_channel_never_reads_past_rom() {
    let rom = [0x12];
    let mut channel = AdpcmChannel::new(0, 0x10000);
    let mut port = Msm5205Port::new();
    channel.set_end(0x8000);
    channel.arm(&mut port);
    for _ in 0..10 {
        channel.tick(&rom, &mut port);
    }
    assert_eq!(port.take_nibbles(), vec![0x01]);
    assert!(channel.is_idle());
}

#[test]
fn test_empty_range_stops_immediately() {
    let rom = [0xFF; 4];
    let mut channel = AdpcmChannel::new(0, 0x10000);
    let mut port = Msm5205Port::new();
    channel.set_start(2);
    channel.set_end(2);
    channel.arm(&mut port);
    channel.tick(&rom, &mut port);
    assert!(channel.is_idle());
    assert!(port.nibbles().is_empty());
}

// =================================================================
// Double Dragon register window
// =================================================================

#[test]
fn test_dual_registers_select_chip_and_function() {
    let mut rom = vec![0u8; 2 * DUAL_ADPCM_BANK];
    rom[0x200] = 0x12;
    rom[DUAL_ADPCM_BANK + 0x400] = 0x34;
    let mut ports = [Msm5205Port::new(), Msm5205Port::new()];
    let mut adpcm = DualAdpcm::new();
    assert_eq!(adpcm.status(), 0x03);

    adpcm.write(4, 0x01, &mut ports); // chip 0 start 0x200
    adpcm.write(2, 0x02, &mut ports); // chip 0 end 0x400
    adpcm.write(5, 0x02, &mut ports); // chip 1 start 0x400
    adpcm.write(3, 0x03, &mut ports); // chip 1 end 0x600
    adpcm.write(0, 0x00, &mut ports);
    assert_eq!(adpcm.status(), 0x02);
    adpcm.write(1, 0x00, &mut ports);
    assert_eq!(adpcm.status(), 0x00);

    adpcm.tick(0, &rom, &mut ports);
    adpcm.tick(1, &rom, &mut ports);
    assert_eq!(ports[0].nibbles(), &[0x01]);
    assert_eq!(ports[1].nibbles(), &[0x03]);

    adpcm.write(6, 0x00, &mut ports);
    assert_eq!(adpcm.status(), 0x01);
    assert!(ports[0].in_reset());
}

#[test]
fn test_dual_address_uses_seven_bits() {
    let mut ports = [Msm5205Port::new(), Msm5205Port::new()];
    let mut adpcm = DualAdpcm::new();
    adpcm.write(4, 0xFF, &mut ports);
    assert_eq!(adpcm.channel(0).position(), 0x7F * 0x200);
    adpcm.write(2, 0x80, &mut ports);
    assert_eq!(adpcm.channel(0).end(), 0);
}

#[test]
fn test_dual_ignores_offsets_past_window() {
    let mut ports = [Msm5205Port::new(), Msm5205Port::new()];
    let mut adpcm = DualAdpcm::new();
    adpcm.write(8, 0x10, &mut ports);
    adpcm.write(0x0C, 0x10, &mut ports);
    assert_eq!(adpcm.status(), 0x03);
    assert_eq!(adpcm.channel(0).position(), 0);
    assert_eq!(adpcm.channel(0).end(), 0);
}

// =================================================================
// DAC sample streamer
// =================================================================

#[test]
fn test_streamer_scales_address_per_mode() {
    let mut s = SampleStreamer::new(AddressMode::Shift5);
    s.set_address_byte(0, 0x34);
    s.set_address_byte(1, 0x12);
    assert_eq!(s.address(), 0x1234 << 5);

    let mut s = SampleStreamer::new(AddressMode::Direct);
    s.set_address_byte(1, 0xAB);
    s.set_address_byte(0, 0xCD);
    assert_eq!(s.address(), 0xABCD);
}

#[test]
fn test_streamer_end_offsets_are_ignored() {
    let mut s = SampleStreamer::new(AddressMode::Shift4WithEnd);
    s.set_address_byte(0, 0x10);
    s.set_address_byte(2, 0xFF);
    s.set_address_byte(3, 0xFF);
    assert_eq!(s.address(), 0x100);
}

#[test]
fn test_streamer_advances_and_wraps() {
    let rom = [0x80, 0x90, 0xA0, 0xB0];
    let mut dac = Dac8::new();
    let mut s = SampleStreamer::new(AddressMode::Direct);
    s.set_start(3);
    let sample = s.read(&rom);
    s.write_dac(sample, &mut dac, rom.len());
    assert_eq!(dac.value(), 0xB0);
    assert_eq!(s.address(), 0);
    assert_eq!(s.read(&rom), 0x80);
}
