pub mod org;
pub mod org_local_user;
pub mod region;
pub mod role;
pub mod version;

pub use org::OrgDataSource;
pub use org_local_user::OrgLocalUserDataSource;
pub use region::RegionDataSource;
pub use role::RoleDataSource;
pub use version::VersionDataSource;
