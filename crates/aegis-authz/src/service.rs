//! The access decision point: bypass flags, subject checks, permission
//! matching, resource ownership, and policy evaluation behind one entry
//! point, plus the list-query pre-filter built on the same steps.

use std::sync::{Arc, OnceLock};

use aegis_core::{AccessibleResources, ActionContext, CoreResult, ResourceType, SecurityContext};
use tracing::{debug, warn};

use crate::ou::OuHierarchyResolver;
use crate::permission::{any_permission_sufficient, has_system_permission, resolve_action_permission};
use crate::policy::{
    get_accessible_resources_by_policy, is_action_allowed_by_policy, select_policy, OuMembershipPolicy,
};

/// The System Authorization Core's single entry point for access decisions.
///
/// Constructed membership-only; `set_ou_hierarchy_resolver` promotes it to
/// membership+inheritance exactly once. The two-phase initialization avoids
/// an import cycle between this service and whoever owns the OU tree. A
/// `None` argument, or any call after the first, is a no-op: the resolver
/// is immutable for the service's lifetime once set, and reassignment would
/// be unsound for concurrent request handling.
pub struct SystemAuthorizationService {
    membership: OuMembershipPolicy,
    ou_resolver: OnceLock<Arc<dyn OuHierarchyResolver>>,
}

impl Default for SystemAuthorizationService {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAuthorizationService {
    pub fn new() -> Self {
        Self {
            membership: OuMembershipPolicy,
            ou_resolver: OnceLock::new(),
        }
    }

    pub fn set_ou_hierarchy_resolver(&self, resolver: Option<Arc<dyn OuHierarchyResolver>>) {
        let Some(resolver) = resolver else {
            return;
        };
        if self.ou_resolver.set(resolver).is_err() {
            debug!("ou hierarchy resolver already set; ignoring later call");
        }
    }

    /// Decides whether `ctx` may perform `action`, short-circuiting at the
    /// first terminal answer: bypass flags, subject presence, the `system`
    /// grant, resource ownership, the action's required permission, and
    /// finally the selected OU policy.
    pub fn is_action_allowed(
        &self,
        ctx: &SecurityContext,
        action: &str,
        action_ctx: Option<&ActionContext>,
    ) -> CoreResult<bool> {
        if ctx.skip_security {
            return Ok(true);
        }
        if ctx.runtime {
            return Ok(true);
        }
        if ctx.subject.is_empty() {
            return Ok(false);
        }
        if has_system_permission(&ctx.permissions) {
            return Ok(true);
        }
        if let Some(action_ctx) = action_ctx {
            if let (Some(resource_id), ResourceType::User) = (&action_ctx.resource_id, &action_ctx.resource_type) {
                if !resource_id.is_empty() && ctx.subject == *resource_id {
                    return Ok(true);
                }
            }
        }
        let required = resolve_action_permission(action);
        if !any_permission_sufficient(&ctx.permissions, required) {
            return Ok(false);
        }

        let resolver = self.ou_resolver.get().map(|r| r.as_ref());
        let policy = select_policy(action, resolver, &self.membership);
        let allowed = is_action_allowed_by_policy(policy.as_ref(), ctx, action_ctx)?;
        debug!(subject = %ctx.subject, action, allowed, "policy evaluation complete");
        Ok(allowed)
    }

    /// Pre-filters a list query: runs the same screening as
    /// `is_action_allowed` minus the resource-owner shortcut (a list query
    /// has no single resource), then asks the selected policy which ids the
    /// caller may see.
    pub fn get_accessible_resources(
        &self,
        ctx: &SecurityContext,
        action: &str,
        resource_type: &ResourceType,
    ) -> CoreResult<AccessibleResources> {
        if ctx.skip_security || ctx.runtime {
            return Ok(AccessibleResources::all());
        }
        if ctx.subject.is_empty() {
            return Ok(AccessibleResources::none());
        }
        if has_system_permission(&ctx.permissions) {
            return Ok(AccessibleResources::all());
        }
        let required = resolve_action_permission(action);
        if !any_permission_sufficient(&ctx.permissions, required) {
            return Ok(AccessibleResources::none());
        }

        let resolver = self.ou_resolver.get().map(|r| r.as_ref());
        if resolver.is_none() && crate::permission::is_inheritance_eligible(action) {
            warn!(action, "inheritance-eligible list query without a resolver wired in yet");
        }
        let policy = select_policy(action, resolver, &self.membership);
        get_accessible_resources_by_policy(policy.as_ref(), ctx, resource_type)
    }
}
