//! API Routes

pub mod analyze;
pub mod health;
pub mod logs;
pub mod remediate;
