use std::io::Write;

use kinescope_machines::config::{ConfigError, MachineConfig};

#[test]
fn test_load_full_document_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "board = \"wwfwfest\"\ninterleave = 8\nflip_screen_dip = true\n\n[dip]\ndsw0 = 0x7f\n"
    )
    .unwrap();

    let config = MachineConfig::load(file.path()).unwrap();
    assert_eq!(config.board, "wwfwfest");
    assert_eq!(config.interleave, 8);
    assert!(config.flip_screen_dip);
    assert_eq!(config.dip.dsw0, 0x7F);
    assert_eq!(config.dip.dsw1, 0xFF);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = MachineConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_malformed_document_is_a_parse_error() {
    let err = MachineConfig::from_toml_str("board = ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));

    let err = MachineConfig::from_toml_str("interleave = 2").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_interleave_upper_bound() {
    let err = MachineConfig::from_toml_str("board = \"m72\"\ninterleave = 65").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidInterleave(65)));
    assert!(MachineConfig::from_toml_str("board = \"m72\"\ninterleave = 64").is_ok());
}
