//! Inlining of `@name` cross-references.

use std::collections::HashMap;

use crate::binder::scope::ResolutionStack;
use crate::error::{FieldcError, Result};
use crate::parser::Expr;

/// Source of named fragment definitions for `@name` resolution.
pub trait FragmentRegistry: Send + Sync {
    /// Returns the (unresolved) expression of the named fragment.
    ///
    /// # Errors
    ///
    /// Returns `UnknownReference` if the name is not registered, or the
    /// error raised while parsing the fragment's own text.
    fn lookup(&self, name: &str) -> Result<Expr>;

    /// Returns a stamp for the current set of definitions.
    ///
    /// Two registries may report the same stamp only if they resolve every
    /// name identically. `None` keeps expressions containing `@name` out of
    /// the compilation cache.
    fn version(&self) -> Option<u64> {
        None
    }
}

/// Registry with no fragments; every lookup fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRegistry;

impl FragmentRegistry for EmptyRegistry {
    fn lookup(&self, name: &str) -> Result<Expr> {
        Err(unknown_reference(name))
    }

    fn version(&self) -> Option<u64> {
        Some(0)
    }
}

/// Fixed map of fragment expressions, mostly useful in tests.
impl FragmentRegistry for HashMap<String, Expr> {
    fn lookup(&self, name: &str) -> Result<Expr> {
        self.get(name).cloned().ok_or_else(|| unknown_reference(name))
    }
}

fn unknown_reference(name: &str) -> FieldcError {
    FieldcError::UnknownReference {
        expression: String::new(),
        name: name.to_string(),
    }
}

/// Replaces every `CrossRef` with a deep copy of the referenced fragment.
pub struct ReferenceResolver<'r> {
    registry: &'r dyn FragmentRegistry,
    stack: ResolutionStack,
}

impl<'r> ReferenceResolver<'r> {
    /// Creates a resolver over the given registry.
    #[must_use]
    pub fn new(registry: &'r dyn FragmentRegistry) -> Self {
        ReferenceResolver {
            registry,
            stack: ResolutionStack::new(),
        }
    }

    /// Resolves all references in `expr`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownReference` for unregistered names and
    /// `CyclicReference` with the offending chain when a fragment refers
    /// back to itself.
    pub fn resolve(&mut self, expr: Expr) -> Result<Expr> {
        match expr {
            Expr::CrossRef { fragment_name } => {
                self.stack.push(&fragment_name).map_err(|chain| {
                    FieldcError::CyclicReference {
                        expression: String::new(),
                        chain,
                    }
                })?;
                let inlined = self
                    .registry
                    .lookup(&fragment_name)
                    .and_then(|definition| self.resolve(definition));
                self.stack.pop();
                inlined
            }
            other => other.try_map_children(|child| self.resolve(child)),
        }
    }
}

/// Resolves all references in `expr` against `registry`.
///
/// # Errors
///
/// See [`ReferenceResolver::resolve`].
pub fn resolve_references(expr: Expr, registry: &dyn FragmentRegistry) -> Result<Expr> {
    if expr.cross_references().is_empty() {
        return Ok(expr);
    }
    ReferenceResolver::new(registry).resolve(expr)
}
