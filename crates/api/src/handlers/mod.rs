pub mod info;
pub mod runs;
pub mod scripts;
