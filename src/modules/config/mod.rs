pub mod commands;
pub mod settings;

use crate::modules::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "config",
            name: "Configuration",
            description: "Staff roles, channels, webhook, blacklist and automod settings.",
        },
        commands: commands::commands(),
        event_handlers: vec![],
    }
}
