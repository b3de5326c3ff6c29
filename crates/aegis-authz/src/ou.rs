//! OU (Organization Unit) hierarchy resolution.
//!
//! The resolver is injected rather than owned by the authorization service:
//! an organization's OU tree is external state (likely a table somewhere)
//! and the core only needs to ask two questions of it. Any failure to
//! resolve the hierarchy must fail deny-safe: callers treat an `Err` the
//! same as "not an ancestor".

use aegis_core::CoreResult;

pub trait OuHierarchyResolver: Send + Sync {
    /// Is `candidate` the same OU as `of`, or one of its ancestors?
    fn is_ancestor_or_self(&self, candidate: &str, of: &str) -> CoreResult<bool>;

    /// All ancestor OU ids of `of`, including `of` itself, nearest-first.
    fn get_ancestor_ou_ids(&self, of: &str) -> CoreResult<Vec<String>>;
}
