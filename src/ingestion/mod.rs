pub mod normalizer;
pub mod pipeline;
