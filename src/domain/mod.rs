// Domain layer: core models shared by every pipeline stage.

pub mod model;
