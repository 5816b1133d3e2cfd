pub mod collector;
pub mod cpu;
pub mod fs;
pub mod helper;
pub mod history;
pub mod memory;
pub mod mounts;
pub mod process;
pub mod resources;
pub mod snapshot;
pub mod users;
