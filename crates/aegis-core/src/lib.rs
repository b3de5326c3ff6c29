pub mod error;
pub mod model;

pub use error::{ClientErrorKind, CoreError, CoreResult, ServerErrorKind};
pub use model::{
    AccessibleResources, ActionContext, AssertionClaims, AuthRequestContext, AuthorizationCode,
    ClaimSpec, ClaimsRequest, CodeState, OAuthParameters, ResourceType, SecurityContext,
    RESERVED_ASSERTION_CLAIMS,
};
