use device::Runtime;

use crate::{Blob, Result, SolverErr, Storage};

/// The ordered set of learnable parameters of a model.
///
/// The order of the blobs defines the flat layout used everywhere else: the i-th blob
/// starts right where the (i-1)-th one ends.
#[derive(Debug, Clone, Default)]
pub struct Net {
    blobs: Vec<Blob>,
}

impl Net {
    /// Creates a new `Net`.
    ///
    /// # Arguments
    /// * `blobs` - The parameter tensors in layout order.
    ///
    /// # Returns
    /// A new `Net` instance.
    pub fn new(blobs: Vec<Blob>) -> Self {
        Self { blobs }
    }

    pub fn params(&self) -> &[Blob] {
        &self.blobs
    }

    pub fn params_mut(&mut self) -> &mut [Blob] {
        &mut self.blobs
    }

    /// Returns the amount of elements across every parameter tensor.
    pub fn total_size(&self) -> usize {
        self.blobs.iter().map(Blob::count).sum()
    }

    /// Copies the values of every tensor into a flat buffer.
    pub fn gather_data(&self, runtime: &dyn Runtime, out: &mut [f32]) -> Result<()> {
        self.gather(runtime, out, Blob::data)
    }

    /// Copies the gradient of every tensor into a flat buffer.
    pub fn gather_diff(&self, runtime: &dyn Runtime, out: &mut [f32]) -> Result<()> {
        self.gather(runtime, out, Blob::diff)
    }

    /// Overwrites the values of every tensor from a flat buffer.
    pub fn scatter_data(&mut self, runtime: &dyn Runtime, src: &[f32]) -> Result<()> {
        self.scatter(runtime, src, Blob::data_mut)
    }

    /// Overwrites the gradient of every tensor from a flat buffer.
    pub fn scatter_diff(&mut self, runtime: &dyn Runtime, src: &[f32]) -> Result<()> {
        self.scatter(runtime, src, Blob::diff_mut)
    }

    /// Zeroes out the gradient of every tensor.
    pub fn zero_diff(&mut self, runtime: &dyn Runtime) -> Result<()> {
        self.blobs
            .iter_mut()
            .try_for_each(|blob| blob.diff_mut().fill(runtime, 0.))
    }

    fn gather<F>(&self, runtime: &dyn Runtime, out: &mut [f32], storage: F) -> Result<()>
    where
        F: Fn(&Blob) -> &Storage,
    {
        self.check_len(out.len())?;

        let mut offset = 0;
        for blob in &self.blobs {
            let end = offset + blob.count();
            storage(blob).read(runtime, &mut out[offset..end])?;
            offset = end;
        }

        Ok(())
    }

    fn scatter<F>(&mut self, runtime: &dyn Runtime, src: &[f32], mut storage: F) -> Result<()>
    where
        F: FnMut(&mut Blob) -> &mut Storage,
    {
        self.check_len(src.len())?;

        let mut offset = 0;
        for blob in &mut self.blobs {
            let end = offset + blob.count();
            storage(blob).write(runtime, &src[offset..end])?;
            offset = end;
        }

        Ok(())
    }

    fn check_len(&self, got: usize) -> Result<()> {
        let expected = self.total_size();

        if got != expected {
            return Err(SolverErr::SizeMismatch {
                what: "flat parameter buffer",
                got,
                expected,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use device::{HostRuntime, HostTopology};

    use super::*;

    fn net() -> Net {
        Net::new(vec![
            Blob::new("a", vec![1., 2.]),
            Blob::new("b", vec![3.]),
            Blob::new("c", vec![4., 5., 6.]),
        ])
    }

    #[test]
    fn flat_layout_follows_blob_order() {
        let rt = HostRuntime::new(&HostTopology::new(1)).unwrap();
        let net = net();
        assert_eq!(net.total_size(), 6);

        let mut out = [0.; 6];
        net.gather_data(&rt, &mut out).unwrap();
        assert_eq!(out, [1., 2., 3., 4., 5., 6.]);
    }

    #[test]
    fn scatter_and_zero_diff() {
        let rt = HostRuntime::new(&HostTopology::new(1)).unwrap();
        let mut net = net();

        net.scatter_diff(&rt, &[1.; 6]).unwrap();
        let mut out = [0.; 6];
        net.gather_diff(&rt, &mut out).unwrap();
        assert_eq!(out, [1.; 6]);

        net.zero_diff(&rt).unwrap();
        net.gather_diff(&rt, &mut out).unwrap();
        assert_eq!(out, [0.; 6]);
    }

    #[test]
    fn wrong_flat_length() {
        let rt = HostRuntime::new(&HostTopology::new(1)).unwrap();
        let mut out = [0.; 5];

        assert!(net().gather_data(&rt, &mut out).is_err());
    }
}
