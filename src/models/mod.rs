pub mod cache;
pub mod invoker;
pub mod labels;

#[cfg(test)]
pub(crate) mod test_model;

pub use cache::{ModelCache, ModelSource};
pub use invoker::{InferenceInvoker, InferenceOutput};
pub use labels::LabelVocabulary;
