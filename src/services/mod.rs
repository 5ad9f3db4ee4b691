pub mod export_service;
pub mod extract_service;
pub mod generation_service;
pub mod llm_service;
pub mod ocr_service;
pub mod warn_writer;

pub use export_service::ExportService;
pub use extract_service::{ExamExtractor, ExtractService, FAILED_PAGE_MARKER, PAGE_SEPARATOR};
pub use generation_service::{GenerationService, QuestionGenerator};
pub use llm_service::LlmService;
pub use ocr_service::{OcrService, PageRecognizer};
pub use warn_writer::WarnWriter;
