mod assistants;
mod files;
mod health;
mod system_prompt;
mod threads;

pub use assistants::assistant_routes;
pub use files::file_routes;
pub use health::health_routes;
pub use system_prompt::system_prompt_routes;
pub use threads::thread_routes;
