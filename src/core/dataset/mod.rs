mod artifacts;
mod discovery;
mod split;

pub use artifacts::{save_obj, ArtifactNaming, ArtifactPaths, IndexArtifacts};
pub use discovery::collect_images;
pub use split::{split_indices, DatasetSplit};

#[cfg(test)]
pub use artifacts::load_obj;
