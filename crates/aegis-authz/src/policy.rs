//! Policy engine: the two built-in policies, chain selection, and the
//! two aggregate operations the System Authorization Service calls.
//!
//! Each policy is a pair of pure functions behind a small trait rather than
//! a broader plugin system: `selectPolicies` picks exactly one per call via
//! an eligibility table, so future policies are added by adding a table row
//! and a pair of functions, never by changing the service's step machine.

use aegis_core::{AccessibleResources, ActionContext, CoreResult, ResourceType, SecurityContext};

use crate::ou::OuHierarchyResolver;
use crate::permission::is_inheritance_eligible;

/// Outcome of a single policy's `isActionAllowed`. `NotApplicable` means the
/// policy has nothing to say about this request; the permission check that
/// already passed stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    NotApplicable,
    Allowed,
    Denied,
}

pub trait Policy: Send + Sync {
    fn is_action_allowed(
        &self,
        ctx: &SecurityContext,
        action_ctx: Option<&ActionContext>,
    ) -> CoreResult<PolicyDecision>;

    /// Returns `(applicable, resources)`.
    fn get_accessible_resources(
        &self,
        ctx: &SecurityContext,
        resource_type: &ResourceType,
    ) -> CoreResult<(bool, AccessibleResources)>;
}

/// Strict same-OU policy. Always installed.
pub struct OuMembershipPolicy;

impl Policy for OuMembershipPolicy {
    fn is_action_allowed(
        &self,
        ctx: &SecurityContext,
        action_ctx: Option<&ActionContext>,
    ) -> CoreResult<PolicyDecision> {
        let Some(action_ctx) = action_ctx else {
            return Ok(PolicyDecision::NotApplicable);
        };
        // An absent and an empty target OU mean the same thing: the action
        // is not scoped to any OU, so this policy has nothing to say.
        let Some(target_ou) = action_ctx.ou_id.as_deref().filter(|ou| !ou.is_empty()) else {
            return Ok(PolicyDecision::NotApplicable);
        };
        Ok(match ctx.ou_id.as_deref() {
            Some(caller_ou) if caller_ou == target_ou => PolicyDecision::Allowed,
            _ => PolicyDecision::Denied,
        })
    }

    fn get_accessible_resources(
        &self,
        ctx: &SecurityContext,
        resource_type: &ResourceType,
    ) -> CoreResult<(bool, AccessibleResources)> {
        if *resource_type != ResourceType::Ou {
            return Ok((false, AccessibleResources::none()));
        }
        let resources = match &ctx.ou_id {
            Some(ou_id) => AccessibleResources::ids([ou_id.clone()]),
            None => AccessibleResources::none(),
        };
        Ok((true, resources))
    }
}

/// Parent-chain read visibility policy. Installed only once an OU hierarchy
/// resolver is wired in (see `SystemAuthorizationService`).
pub struct OuInheritancePolicy<'a> {
    pub resolver: &'a dyn OuHierarchyResolver,
}

impl Policy for OuInheritancePolicy<'_> {
    fn is_action_allowed(
        &self,
        ctx: &SecurityContext,
        action_ctx: Option<&ActionContext>,
    ) -> CoreResult<PolicyDecision> {
        let Some(action_ctx) = action_ctx else {
            return Ok(PolicyDecision::NotApplicable);
        };
        let Some(target_ou) = action_ctx.ou_id.as_deref().filter(|ou| !ou.is_empty()) else {
            return Ok(PolicyDecision::NotApplicable);
        };
        let Some(caller_ou) = ctx.ou_id.as_deref() else {
            return Ok(PolicyDecision::Denied);
        };
        // IsAncestorOrSelf(action_ctx.ou_id, caller.ou_id): is the target OU
        // an ancestor of (or the same as) the caller's OU?
        if self.resolver.is_ancestor_or_self(target_ou, caller_ou)? {
            Ok(PolicyDecision::Allowed)
        } else {
            Ok(PolicyDecision::Denied)
        }
    }

    fn get_accessible_resources(
        &self,
        ctx: &SecurityContext,
        resource_type: &ResourceType,
    ) -> CoreResult<(bool, AccessibleResources)> {
        if *resource_type != ResourceType::UserSchema {
            return Ok((false, AccessibleResources::none()));
        }
        let resources = match &ctx.ou_id {
            Some(ou_id) => AccessibleResources::ids(self.resolver.get_ancestor_ou_ids(ou_id)?),
            None => AccessibleResources::none(),
        };
        Ok((true, resources))
    }
}

/// `isActionAllowedByPolicies`: `NotApplicable` maps to allowed (the
/// permission check already passed); `Allowed`/`Denied` pass through; any
/// error short-circuits.
pub fn is_action_allowed_by_policy(
    policy: &dyn Policy,
    ctx: &SecurityContext,
    action_ctx: Option<&ActionContext>,
) -> CoreResult<bool> {
    match policy.is_action_allowed(ctx, action_ctx)? {
        PolicyDecision::NotApplicable | PolicyDecision::Allowed => Ok(true),
        PolicyDecision::Denied => Ok(false),
    }
}

/// `getAccessibleResourcesByPolicies`: not-applicable means `{all_allowed:
/// true}`; otherwise the policy's own result stands.
pub fn get_accessible_resources_by_policy(
    policy: &dyn Policy,
    ctx: &SecurityContext,
    resource_type: &ResourceType,
) -> CoreResult<AccessibleResources> {
    let (applicable, resources) = policy.get_accessible_resources(ctx, resource_type)?;
    if applicable {
        Ok(resources)
    } else {
        Ok(AccessibleResources::all())
    }
}

/// `selectPolicies`: picks the inheritance policy when it is installed and
/// the action is inheritance-eligible; otherwise the membership policy.
/// Exactly one policy runs per call; policies are never ORed.
pub fn select_policy<'a>(
    action: &str,
    inheritance_resolver: Option<&'a dyn OuHierarchyResolver>,
    membership: &'a OuMembershipPolicy,
) -> Box<dyn Policy + 'a> {
    if let Some(resolver) = inheritance_resolver {
        if is_inheritance_eligible(action) {
            return Box::new(OuInheritancePolicy { resolver });
        }
    }
    Box::new(MembershipRef(membership))
}

/// Thin `Policy` forwarder so `select_policy` can return a trait object that
/// borrows the always-present membership policy without cloning it.
struct MembershipRef<'a>(&'a OuMembershipPolicy);

impl Policy for MembershipRef<'_> {
    fn is_action_allowed(
        &self,
        ctx: &SecurityContext,
        action_ctx: Option<&ActionContext>,
    ) -> CoreResult<PolicyDecision> {
        self.0.is_action_allowed(ctx, action_ctx)
    }

    fn get_accessible_resources(
        &self,
        ctx: &SecurityContext,
        resource_type: &ResourceType,
    ) -> CoreResult<(bool, AccessibleResources)> {
        self.0.get_accessible_resources(ctx, resource_type)
    }
}
