pub mod page_loader;
pub mod toml_loader;

pub use page_loader::load_page_images;
pub use toml_loader::{load_generation_request, save_exam_toml, GenerationRequest};
