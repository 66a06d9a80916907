pub mod commands;
pub mod events;
pub mod model;
pub mod scheduler;
pub mod selection;

use crate::modules::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "giveaways",
            name: "Giveaways",
            description: "Timed giveaways with optional invite requirements.",
        },
        commands: commands::commands(),
        event_handlers: vec![],
    }
}
