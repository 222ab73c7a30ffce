mod health;
mod pages;

pub use health::health_check;
pub use pages::{admin_stats, blog_index, blog_post, echo, teapot};
