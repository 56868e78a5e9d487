pub mod image_clip;
pub mod snap_format;
