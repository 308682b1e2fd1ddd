//! Board registry for host discovery.
//!
//! Each board self-registers via [`inventory::submit!`] with a
//! [`BoardEntry`] holding its config name and a factory. Hosts find the
//! available boards at runtime without any central list.

use kinescope_core::core::machine::Machine;

use crate::config::{ConfigError, MachineConfig};

pub struct BoardEntry {
    /// Name used in `MachineConfig::board` (e.g. "rtype2").
    pub name: &'static str,
    pub description: &'static str,
    /// Factory: construct a machine from a validated config.
    pub create: fn(&MachineConfig) -> Box<dyn Machine>,
}

impl BoardEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        create: fn(&MachineConfig) -> Box<dyn Machine>,
    ) -> Self {
        Self {
            name,
            description,
            create,
        }
    }
}

inventory::collect!(BoardEntry);

/// All registered boards, sorted by name.
pub fn all() -> Vec<&'static BoardEntry> {
    let mut entries: Vec<_> = inventory::iter::<BoardEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

pub fn find(name: &str) -> Option<&'static BoardEntry> {
    inventory::iter::<BoardEntry>
        .into_iter()
        .find(|e| e.name == name)
}

/// Validate `config` and build its machine.
pub fn create(config: &MachineConfig) -> Result<Box<dyn Machine>, ConfigError> {
    config.validate()?;
    let entry = find(&config.board).ok_or_else(|| ConfigError::UnknownBoard(config.board.clone()))?;
    log::info!("creating board `{}` ({})", entry.name, entry.description);
    Ok((entry.create)(config))
}
