pub mod camera;
pub mod gateway;
pub mod library;
pub mod permissions;

pub use camera::Camera;
pub use gateway::DeviceGateway;
pub use library::MediaLibrary;
pub use permissions::{PermissionProvider, PolicyPermissions};
