pub mod content;
pub mod plan;
pub mod subscription;
pub mod user;
