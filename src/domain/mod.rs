// Domain layer: entities and ports (interfaces) shared by core and adapters.

pub mod model;
pub mod ports;
