mod command_input;
mod filter_tabs;
mod input;
mod key_result;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use filter_tabs::{FilterSpec, FilterTab, FilterTabs};
pub use key_result::KeyResult;
pub use search_input::{SearchEvent, SearchInput};
