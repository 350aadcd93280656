pub mod output;
pub mod parallel;
pub mod template;
