pub mod onsite;
pub mod roster;
pub mod time_in;
