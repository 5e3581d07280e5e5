use crate::Result;

/// The forward/backward computation of a model over its data.
///
/// Implementations own their dataset and decide which samples make up each batch; the
/// solver only hands them the current parameters and a gradient buffer to fill.
pub trait Objective: Send {
    /// Returns the amount of parameters this objective expects.
    fn len(&self) -> usize;

    /// Computes the gradient of the loss with respect to `params` over the next batch.
    ///
    /// # Arguments
    /// * `params` - The model's flat parameters.
    /// * `grad` - Where to write the gradient, overwriting its previous content.
    ///
    /// # Returns
    /// The batch loss, or a `SizeMismatch` error if the buffers don't match `len`.
    fn gradient(&mut self, params: &[f32], grad: &mut [f32]) -> Result<f32>;
}
