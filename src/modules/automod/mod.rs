pub mod events;
pub mod filter;

use crate::modules::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "automod",
            name: "Automod",
            description: "Removes invite links posted by regular members.",
        },
        commands: vec![],
        event_handlers: vec![events::handler],
    }
}
