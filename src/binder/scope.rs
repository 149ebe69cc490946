//! Resolution scope for `@name` references.

/// Stack of fragment names currently being resolved.
///
/// A name may appear at most once; pushing a name that is already on the
/// stack means the references form a cycle.
#[derive(Debug, Clone, Default)]
pub struct ResolutionStack {
    names: Vec<String>,
}

impl ResolutionStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the name is being resolved.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Pushes a name, or returns the cycle it would close.
    ///
    /// The returned chain starts at the first occurrence of `name` and ends
    /// with `name` again, e.g. `["a", "b", "a"]`.
    pub fn push(&mut self, name: &str) -> std::result::Result<(), Vec<String>> {
        if let Some(start) = self.names.iter().position(|n| n == name) {
            let mut chain = self.names[start..].to_vec();
            chain.push(name.to_string());
            return Err(chain);
        }
        self.names.push(name.to_string());
        Ok(())
    }

    /// Pops the innermost name.
    pub fn pop(&mut self) -> Option<String> {
        self.names.pop()
    }

    /// Returns the current depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.names.len()
    }
}
