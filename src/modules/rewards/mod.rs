pub mod commands;
pub mod workflow;

use crate::modules::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "rewards",
            name: "Rewards",
            description: "Pays members out for their invites.",
        },
        commands: commands::commands(),
        event_handlers: vec![],
    }
}
