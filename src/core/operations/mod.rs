mod layout;

pub use layout::{dataset_dir_structure, ensure_dir};
