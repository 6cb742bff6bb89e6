pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::{draw_header, extract_domain};
pub use utils::{format_timestamp, priority_color, project_status_color, task_status_color, truncate};
