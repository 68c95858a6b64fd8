pub mod admin;
pub mod role_permission;
