pub mod document;
pub mod exam;
pub mod job;
pub mod loaders;
pub mod progress;
pub mod unit;

pub use document::{Document, DocumentPatch};
pub use exam::{
    Exam, ExamElement, ExamMetadata, GeneratedElement, GeneratedExam, GeneratedQuestion,
    MultipleChoiceAnswer, MultipleChoiceData, OriginalQuestion, QuestionKind, ShortAnswerAnswer,
    TrueFalseAnswer, TrueFalseData,
};
pub use job::{CounterState, DocumentId, Job, JobId, JobKind, Status};
pub use loaders::{load_generation_request, load_page_images, save_exam_toml, GenerationRequest};
pub use progress::JobProgress;
pub use unit::{GenerationUnit, PageInput, UnitInput, UnitPatch, UnitRecord, UnitResult};
