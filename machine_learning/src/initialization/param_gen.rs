/// A `ParamGen` generates values for the initial state of a model's parameters.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// `None` once the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Samples exactly `n` parameters, padding with zeros if the generator runs dry.
    fn fill(&mut self, n: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(n);

        while out.len() < n {
            match self.sample(n - out.len()) {
                Some(chunk) if !chunk.is_empty() => out.extend(chunk),
                _ => break,
            }
        }

        out.resize(n, 0.);
        out
    }
}

impl<G: ParamGen + ?Sized> ParamGen for Box<G> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        (**self).sample(n)
    }
}
