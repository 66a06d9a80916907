pub mod commands;
pub mod events;
pub mod stats;
pub mod tracking;

use crate::modules::{Module, ModuleDefinition};

pub const DEFINITION: ModuleDefinition = ModuleDefinition {
    id: "invite_tracking",
    name: "Invite Tracking",
    description: "Credits members for the people they invite.",
};

pub fn module() -> Module {
    Module {
        definition: DEFINITION,
        commands: commands::commands(),
        event_handlers: vec![events::handler],
    }
}
