pub mod commands;
pub mod descriptor;
pub mod events;
pub mod machine;

use crate::modules::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "tickets",
            name: "Tickets",
            description: "Private support, order, sale and reward channels.",
        },
        commands: commands::commands(),
        event_handlers: vec![],
    }
}
