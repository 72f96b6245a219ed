pub mod health;
pub mod private;
pub mod public;
