mod dry_run;
mod http;

pub use dry_run::LogMailer;
pub use http::HttpMailer;
