pub mod extract;
pub mod locator;
pub mod models;
pub mod normalize;
pub mod plan;
pub mod render;
pub mod writer;
