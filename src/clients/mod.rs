pub mod openai;
pub mod traits;

pub use openai::ChatCompletionsClient;
pub use traits::{GenerativeModel, ModelError};
