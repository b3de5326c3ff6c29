pub mod ou;
pub mod permission;
pub mod policy;
pub mod service;

pub use ou::OuHierarchyResolver;
pub use permission::{
    any_permission_sufficient, has_sufficient_permission, has_system_permission,
    is_inheritance_eligible, resolve_action_permission, INHERITANCE_ELIGIBLE_ACTIONS,
    SYSTEM_ROOT_SCOPE,
};
pub use policy::{
    get_accessible_resources_by_policy, is_action_allowed_by_policy, select_policy, Policy,
    PolicyDecision, OuInheritancePolicy, OuMembershipPolicy,
};
pub use service::SystemAuthorizationService;
