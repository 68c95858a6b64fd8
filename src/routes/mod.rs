pub mod admins;
pub mod health;
pub mod role_permissions;
pub mod session;
