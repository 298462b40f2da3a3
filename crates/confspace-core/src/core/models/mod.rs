pub mod atom;
pub mod ids;
pub mod lock;
pub mod molecule;
