pub mod org;
pub mod org_local_user;

pub use org::OrgResource;
pub use org_local_user::OrgLocalUserResource;
