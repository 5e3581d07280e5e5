use crate::{Result, SyncErr};

/// Splits a global mini-batch evenly across the solvers of a run.
///
/// # Arguments
/// * `total` - The batch size of a single solver training on its own.
/// * `solver_count` - The amount of solvers sharing each step.
///
/// # Returns
/// The per solver batch size or an `IndivisibleBatch` error if `total` can't be split evenly.
pub fn divide_batch_size(total: usize, solver_count: usize) -> Result<usize> {
    if solver_count == 0 || total % solver_count != 0 {
        return Err(SyncErr::IndivisibleBatch {
            total,
            solvers: solver_count,
        });
    }

    Ok(total / solver_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        assert_eq!(divide_batch_size(256, 4).unwrap(), 64);
        assert_eq!(divide_batch_size(7, 1).unwrap(), 7);
    }

    #[test]
    fn uneven_split() {
        assert!(matches!(
            divide_batch_size(10, 4),
            Err(SyncErr::IndivisibleBatch {
                total: 10,
                solvers: 4
            })
        ));
        assert!(divide_batch_size(10, 0).is_err());
    }
}
