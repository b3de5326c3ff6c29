//! OAuth2/OIDC authorization-code core: the request validator, claims
//! handling, assertion decoding, and the authorize state machine that ties
//! them together with the request and code stores.

pub mod assertion;
pub mod claims;
pub mod flow;
pub mod registry;
pub mod service;
pub mod sqlite_store;
pub mod store;
pub mod validator;

pub use assertion::{decode_assertion, AssertionVerifier, JwtAssertionVerifier};
pub use claims::{compute_required_attributes, enforce_sub_constraint, parse_claims_request};
pub use flow::{FlowExecutor, FlowInitRequest, FlowType};
pub use registry::{standard_scope_claims, AppRegistry, RegisteredApp};
pub use service::{
    build_redirect_url, AuthorizeService, InitialAuthorizationRequest, Leg1Outcome, Leg2Outcome,
    LoginRedirect, OIDC_STANDARD_SCOPES,
};
pub use sqlite_store::SqliteCodeStore;
pub use store::{
    AuthorizationCodeStore, AuthorizationRequestStore, InMemoryCodeStore, InMemoryRequestStore,
    DEFAULT_REQUEST_TTL,
};
pub use validator::{AuthorizationValidator, RawAuthorizeRequest, ValidationOutcome};
