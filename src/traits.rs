/// A post-processing step over an owned value. Implementations may reuse the
/// allocation of `target` for their output.
pub trait Transform<T> {
    fn apply(&self, target: T) -> T;

    fn apply_iter(&self, targets: impl Iterator<Item = T>) -> impl Iterator<Item = T> {
        targets.map(move |t| self.apply(t))
    }
}
