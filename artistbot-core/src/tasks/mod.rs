pub mod health_check;

pub use health_check::spawn_health_check_task;
