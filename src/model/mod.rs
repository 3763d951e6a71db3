pub mod geometry;
pub mod pet;
pub mod state;
