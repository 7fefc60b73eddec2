pub mod pid;

pub use pid::{Direction, Mode, PidController, ProportionalOn};
