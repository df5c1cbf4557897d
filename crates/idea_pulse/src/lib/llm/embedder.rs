use std::{
    fmt::{Debug, Display},
    future::Future,
};

use crate::pipeline::Classify;

pub trait Embedder {
    const EMBEDDING_MODEL: &'static str;

    type Error: Classify + Debug + Display + Send;

    /// Returns one vector per input text, in input order
    fn embed(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, Self::Error>> + Send;
}
