pub mod loaders;
pub mod provider;
pub mod question;
pub mod request;
pub mod result;

pub use loaders::{load_all_job_files, load_job_file, load_prompt_store, GenerationJob};
pub use provider::ProviderId;
pub use question::{AnswerLetter, CanonicalQuestion};
pub use request::{Difficulty, GenerationRequest};
pub use result::{
    CallParams, Capabilities, ClientHealthRecord, ClientStatus, GenerationResult, Metadata,
    RawGenerationResult,
};
