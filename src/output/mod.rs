mod markdown;

pub use markdown::{render_checkpoint, render_credentials, render_history, render_plan};
